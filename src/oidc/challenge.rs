//! `WWW-Authenticate` challenge parsing (RFC 9110 section 11.6.1)

use http::header::WWW_AUTHENTICATE;
use http::HeaderMap;
use std::collections::BTreeMap;

/// One authentication challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Lowercased auth scheme, e.g. `bearer`
    pub scheme: String,
    /// Auth-params keyed by lowercased name
    pub parameters: BTreeMap<String, String>,
    pub token68: Option<String>,
}

impl Challenge {
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Collect the challenges of every `WWW-Authenticate` header
///
/// Returns `None` when the response carries no such header.
pub fn parse_www_authenticate_challenges(headers: &HeaderMap) -> Option<Vec<Challenge>> {
    let mut values = headers.get_all(WWW_AUTHENTICATE).iter().peekable();
    values.peek()?;

    Some(
        values
            .filter_map(|v| v.to_str().ok())
            .flat_map(parse_challenges)
            .collect(),
    )
}

/// Parse a single header value into its challenges
pub fn parse_challenges(value: &str) -> Vec<Challenge> {
    let mut cursor = Cursor::new(value);
    let mut challenges = Vec::new();

    loop {
        cursor.skip_separators();
        let Some(scheme) = cursor.token() else { break };

        let mut challenge = Challenge {
            scheme: scheme.to_ascii_lowercase(),
            parameters: BTreeMap::new(),
            token68: None,
        };

        cursor.skip_whitespace();
        if let Some(token68) = cursor.token68() {
            challenge.token68 = Some(token68);
        } else {
            while let Some((name, value)) = cursor.auth_param() {
                challenge.parameters.insert(name.to_ascii_lowercase(), value);
            }
        }

        challenges.push(challenge);
    }

    challenges
}

struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn slice(&self, start: usize, end: usize) -> String {
        String::from_utf8_lossy(&self.input[start..end]).into_owned()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b',')) {
            self.pos += 1;
        }
    }

    fn token(&mut self) -> Option<String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_tchar(c)) {
            self.pos += 1;
        }
        (self.pos > start).then(|| self.slice(start, self.pos))
    }

    /// A token68 must be the whole credential, so it ends at a comma or the end
    fn token68(&mut self) -> Option<String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || b"-._~+/".contains(&c)) {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        while self.peek() == Some(b'=') {
            self.pos += 1;
        }

        let end = self.pos;
        self.skip_whitespace();
        if self.at_end() || self.peek() == Some(b',') {
            Some(self.slice(start, end))
        } else {
            self.pos = start;
            None
        }
    }

    /// `name = (token / quoted-string)`; rewinds when the next item is a new challenge
    fn auth_param(&mut self) -> Option<(String, String)> {
        let save = self.pos;
        self.skip_separators();

        let Some(name) = self.token() else {
            self.pos = save;
            return None;
        };
        self.skip_whitespace();
        if self.peek() != Some(b'=') {
            self.pos = save;
            return None;
        }
        self.pos += 1;
        self.skip_whitespace();

        let value = if self.peek() == Some(b'"') {
            self.quoted_string()
        } else {
            self.token().unwrap_or_default()
        };
        Some((name, value))
    }

    fn quoted_string(&mut self) -> String {
        let mut out = Vec::new();
        self.pos += 1;
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                b'"' => break,
                b'\\' => {
                    if let Some(escaped) = self.peek() {
                        out.push(escaped);
                        self.pos += 1;
                    }
                }
                _ => out.push(c),
            }
        }
        String::from_utf8_lossy(&out).into_owned()
    }
}

fn is_tchar(c: u8) -> bool {
    c.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_no_header() {
        assert!(parse_www_authenticate_challenges(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_bearer_with_params() {
        let challenges = parse_challenges(
            r#"Bearer realm="example", error="invalid_token", error_description="The access token \"expired\"""#,
        );

        assert_eq!(challenges.len(), 1);
        let bearer = &challenges[0];
        assert_eq!(bearer.scheme, "bearer");
        assert_eq!(bearer.parameter("realm"), Some("example"));
        assert_eq!(bearer.parameter("ERROR"), Some("invalid_token"));
        assert_eq!(
            bearer.parameter("error_description"),
            Some(r#"The access token "expired""#)
        );
    }

    #[test]
    fn test_multiple_challenges_in_one_value() {
        let challenges = parse_challenges(r#"Basic realm="idp", DPoP algs="ES256 PS256", Bearer"#);

        let schemes: Vec<&str> = challenges.iter().map(|c| c.scheme.as_str()).collect();
        assert_eq!(schemes, vec!["basic", "dpop", "bearer"]);
        assert_eq!(challenges[1].parameter("algs"), Some("ES256 PS256"));
        assert!(challenges[2].parameters.is_empty());
    }

    #[test]
    fn test_token68() {
        let challenges = parse_challenges("Negotiate YII+a/b==, Bearer error=invalid_client");

        assert_eq!(challenges[0].scheme, "negotiate");
        assert_eq!(challenges[0].token68.as_deref(), Some("YII+a/b=="));
        assert_eq!(challenges[1].parameter("error"), Some("invalid_client"));
    }

    #[test]
    fn test_header_map_collects_all_values() {
        let mut headers = HeaderMap::new();
        headers.append(WWW_AUTHENTICATE, HeaderValue::from_static("Basic realm=\"a\""));
        headers.append(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));

        let challenges = parse_www_authenticate_challenges(&headers).unwrap();
        assert_eq!(challenges.len(), 2);
    }
}
