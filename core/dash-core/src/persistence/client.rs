//! Backend used after hydration: client storage plus the `jwt` cookie.

use chrono::{DateTime, Utc};
use cookie::{Cookie, CookieJar, SameSite};
use tracing::{debug, warn};

use super::kv::KeyValueStore;
use super::{
    ExecutionContext, PersistedSession, SessionBackend, COOKIE_NAME, LOGOUT_KEY, TOKEN_KEY,
    USER_KEY,
};
use crate::error::PersistError;
use crate::token::UserClaims;

/// Client-side session persistence.
///
/// The token is written twice: to client storage, where the next client start
/// picks it up, and to the `jwt` cookie, which rides along on requests to the
/// rendering server. The jar starts out holding whatever token storage already
/// has, the way a browser keeps its cookies between page loads.
#[derive(Debug)]
pub struct ClientBackend<S> {
    storage: S,
    cookies: CookieJar,
    last_write: Option<DateTime<Utc>>,
}

impl<S: KeyValueStore> ClientBackend<S> {
    pub fn new(storage: S) -> Self {
        let mut cookies = CookieJar::new();
        if let Some(token) = storage.get(TOKEN_KEY).filter(|token| !token.is_empty()) {
            cookies.add_original(session_cookie(&token));
        }
        Self {
            storage,
            cookies,
            last_write: None,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// `Cookie` request header for the next server-rendered page load.
    pub fn cookie_header(&self) -> Option<String> {
        self.cookies
            .get(COOKIE_NAME)
            .map(|cookie| format!("{}={}", cookie.name(), cookie.value()))
    }

    /// `Set-Cookie` values for every cookie change since construction.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.cookies.delta().map(|cookie| cookie.to_string()).collect()
    }
}

fn session_cookie(token: &str) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token.to_string()))
        .path("/")
        .same_site(SameSite::Lax)
        .build()
}

impl<S: KeyValueStore> SessionBackend for ClientBackend<S> {
    fn context(&self) -> ExecutionContext {
        ExecutionContext::Client
    }

    fn write_client_session(
        &mut self,
        token: &str,
        user: Option<&UserClaims>,
    ) -> Result<(), PersistError> {
        let serialized = user
            .map(|user| {
                serde_json::to_string(user).map_err(|source| PersistError::Json {
                    context: "serialize user claims".to_string(),
                    source,
                })
            })
            .transpose()?;

        self.cookies.add(session_cookie(token));
        self.last_write = Some(Utc::now());
        self.storage
            .apply(&[(TOKEN_KEY, Some(token)), (USER_KEY, serialized.as_deref())])?;
        debug!("Client session persisted");
        Ok(())
    }

    /// Drops the cookie first, then clears storage and writes the logout
    /// marker. A storage failure is returned only after every step has run.
    fn clear_client_session(&mut self) -> Result<(), PersistError> {
        self.cookies.remove(Cookie::build(COOKIE_NAME).path("/"));

        let now = Utc::now();
        let marker = now.timestamp_millis().to_string();
        self.last_write = Some(now);
        self.storage.apply(&[
            (TOKEN_KEY, None),
            (USER_KEY, None),
            (LOGOUT_KEY, Some(marker.as_str())),
        ])?;
        debug!("Client session cleared, logout broadcast written");
        Ok(())
    }

    fn read_session_from_client_storage(&self) -> Option<PersistedSession> {
        let token = self.storage.get(TOKEN_KEY).filter(|token| !token.is_empty())?;
        let user = self
            .storage
            .get(USER_KEY)
            .and_then(|raw| match serde_json::from_str::<UserClaims>(&raw) {
                Ok(user) => Some(user),
                Err(err) => {
                    warn!(error = %err, "Ignoring unreadable persisted user claims");
                    None
                }
            });
        Some(PersistedSession { token, user })
    }

    fn last_write(&self) -> Option<DateTime<Utc>> {
        self.last_write
    }
}
