//! Ephemeral per-attempt secret storage
//!
//! The login attempt keeps its code verifier and state in a tab-scoped
//! key-value store. Slot keys are base64-obscured; that only hides them from
//! casual inspection.

use base64::{engine::general_purpose::STANDARD, Engine};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const CODE_VERIFIER_SLOT: &str = "code_verifier";
const STATE_SLOT: &str = "pkce_session_id";

/// Session-lifetime key-value storage
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn unset(&self, key: &str);
}

impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) {
        (**self).set(key, value)
    }

    fn unset(&self, key: &str) {
        (**self).unset(key)
    }
}

/// In-memory store that lives as long as the process
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        // A poisoned lock still holds consistent single-key data
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
    }

    fn unset(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }
}

/// Secrets read back at callback time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredSecrets {
    pub code_verifier: Option<String>,
    pub state: Option<String>,
}

/// The two named slots of one login attempt
pub struct PkceSecrets<S> {
    store: S,
    verifier_key: String,
    state_key: String,
}

impl<S: SessionStore> PkceSecrets<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            verifier_key: obscure(CODE_VERIFIER_SLOT),
            state_key: obscure(STATE_SLOT),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn code_verifier(&self) -> Option<String> {
        self.store.get(&self.verifier_key)
    }

    pub fn set_code_verifier(&self, code_verifier: &str) {
        self.store.set(&self.verifier_key, code_verifier);
    }

    pub fn unset_code_verifier(&self) {
        self.store.unset(&self.verifier_key);
    }

    pub fn state(&self) -> Option<String> {
        self.store.get(&self.state_key)
    }

    pub fn set_state(&self, state: &str) {
        self.store.set(&self.state_key, state);
    }

    pub fn unset_state(&self) {
        self.store.unset(&self.state_key);
    }

    /// Read both slots and clear them
    pub fn take(&self) -> StoredSecrets {
        let secrets = StoredSecrets {
            code_verifier: self.code_verifier(),
            state: self.state(),
        };
        self.unset_code_verifier();
        self.unset_state();
        secrets
    }
}

/// Storage key for a slot name
pub fn obscure(slot: &str) -> String {
    STANDARD.encode(slot)
}
