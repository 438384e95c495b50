//! Shared bearer credential for outbound API calls.
//!
//! The session machine is the only writer; the API client reads it on every
//! request. Clones share the same slot.

use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, Default)]
pub struct Credential {
    token: Arc<RwLock<Option<String>>>,
}

impl Credential {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&self, token: &str) {
        let mut slot = self.token.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(token.to_string());
    }

    pub(crate) fn clear(&self) {
        let mut slot = self.token.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_set(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Value for the `Authorization` header, if a session exists.
    pub fn authorization(&self) -> Option<String> {
        self.token().map(|token| format!("Bearer {}", token))
    }
}
