//! Session persistence across execution contexts.
//!
//! A session survives page loads in two places:
//!
//! ```text
//! login ──► ClientBackend ──► client storage: token, user   (read after hydration)
//!                        └──► cookie jar:     jwt           (read by the server render)
//! logout ─► ClientBackend ──► removes the above, writes `logout` (cross-tab signal)
//!
//! server render ─► read_token_from_cookie(request headers)
//! ```
//!
//! Both contexts sit behind the same [`SessionBackend`] trait, so the session
//! machine never checks where it is running. [`ServerBackend`] has no client
//! storage: its writes are no-ops and its reads come back empty.
//!
//! # Module Structure
//!
//! - [`client`]: client storage + cookie jar backend
//! - [`kv`]: key/value stores the client backend writes through
//! - [`server`]: the request-scoped backend used while rendering

mod client;
mod kv;
mod server;

use chrono::{DateTime, Utc};
use cookie::Cookie;
use reqwest::header::{HeaderMap, COOKIE};

use crate::error::PersistError;
use crate::token::UserClaims;

pub use client::ClientBackend;
pub use kv::{Change, FileStore, KeyValueStore, MemoryStore};
pub use server::ServerBackend;

/// Cookie the server render reads the token from.
pub const COOKIE_NAME: &str = "jwt";
/// Client storage key for the raw token.
pub const TOKEN_KEY: &str = "token";
/// Client storage key for the decoded claims (JSON text).
pub const USER_KEY: &str = "user";
/// Client storage key written on logout. Only the write matters; the value is
/// a millisecond timestamp so every logout is a distinct write.
pub const LOGOUT_KEY: &str = "logout";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// Rendering a page for an incoming request; only the cookie is visible.
    Server,
    /// Running in the client after hydration; client storage is available.
    Client,
}

/// What client storage holds for a session. Not decoded on read.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedSession {
    pub token: String,
    pub user: Option<UserClaims>,
}

/// Storage for the session token, selected by execution context.
///
/// Writes are idempotent. Reads never fail: missing or unreadable data reads
/// as absent.
pub trait SessionBackend {
    fn context(&self) -> ExecutionContext;

    /// Persists the token (and claims, when given) for future page loads.
    fn write_client_session(
        &mut self,
        token: &str,
        user: Option<&UserClaims>,
    ) -> Result<(), PersistError>;

    /// Removes every persisted session key and broadcasts the logout marker.
    fn clear_client_session(&mut self) -> Result<(), PersistError>;

    fn read_session_from_client_storage(&self) -> Option<PersistedSession>;

    /// When this backend last wrote or cleared anything.
    fn last_write(&self) -> Option<DateTime<Utc>>;
}

/// Extracts the session token from a request's `cookie` headers.
///
/// The name match is case-sensitive and the first `jwt` cookie wins. An empty
/// value counts as absent.
pub fn read_token_from_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| Cookie::split_parse(raw))
        .filter_map(|cookie| cookie.ok())
        .find(|cookie| cookie.name() == COOKIE_NAME)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}
