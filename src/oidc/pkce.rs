//! PKCE (Proof Key for Code Exchange) implementation
//!
//! Implements RFC 7636 for the public-client authorization code flow.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

/// The only challenge method this client sends
pub const CODE_CHALLENGE_METHOD: &str = "S256";

const VERIFIER_LEN: usize = 64;
const STATE_LEN: usize = 32;

/// PKCE parameters for one login attempt
#[derive(Debug, Clone)]
pub struct PkceParams {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl PkceParams {
    /// Generate a fresh verifier and its S256 challenge
    pub fn generate() -> Self {
        let code_verifier = generate_verifier();
        let code_challenge = derive_challenge(&code_verifier);

        PkceParams {
            code_verifier,
            code_challenge,
        }
    }
}

/// Generate a code verifier
///
/// 64 characters drawn from `[A-Za-z0-9]`, a subset of the RFC 7636 unreserved
/// set, well within the 43-128 length window.
pub fn generate_verifier() -> String {
    random_alphanumeric(VERIFIER_LEN)
}

/// Compute `BASE64URL(SHA256(verifier))` without padding
pub fn derive_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Generate a random state parameter for CSRF protection
pub fn generate_state() -> String {
    random_alphanumeric(STATE_LEN)
}

fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
