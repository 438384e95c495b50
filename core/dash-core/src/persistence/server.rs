//! Backend used while rendering a page on the server.

use chrono::{DateTime, Utc};

use super::{ExecutionContext, PersistedSession, SessionBackend};
use crate::error::PersistError;
use crate::token::UserClaims;

/// Request-scoped backend with no client storage.
///
/// The token arrives through the request's `cookie` header (see
/// [`read_token_from_cookie`](super::read_token_from_cookie)); there is nothing
/// to write to, so writes succeed without side effects.
#[derive(Debug, Default, Clone, Copy)]
pub struct ServerBackend;

impl ServerBackend {
    pub fn new() -> Self {
        Self
    }
}

impl SessionBackend for ServerBackend {
    fn context(&self) -> ExecutionContext {
        ExecutionContext::Server
    }

    fn write_client_session(
        &mut self,
        _token: &str,
        _user: Option<&UserClaims>,
    ) -> Result<(), PersistError> {
        Ok(())
    }

    fn clear_client_session(&mut self) -> Result<(), PersistError> {
        Ok(())
    }

    fn read_session_from_client_storage(&self) -> Option<PersistedSession> {
        None
    }

    fn last_write(&self) -> Option<DateTime<Utc>> {
        None
    }
}
