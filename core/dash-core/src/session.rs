//! Session state machine.
//!
//! Owns the canonical in-memory session and is the only writer of persisted
//! session data and of the request credential.
//!
//! ## State Machine
//!
//! ```text
//! Anonymous ──login(token)──► Authenticated     (decode ok: commit, credential, persist)
//! any       ──login(bad)────► unchanged         (logged, DecodeError returned)
//! any       ──logout()──────► Anonymous         (credential cleared, storage cleared,
//!                                                logout marker broadcast)
//! ```
//!
//! ## Entry Points
//!
//! - [`SessionMachine::bootstrap_from_request`]: once per server render, from the
//!   `jwt` cookie. Never touches client storage.
//! - [`SessionMachine::bootstrap_from_client_storage`]: on hydration, when the
//!   server did not already establish a session.
//! - [`SessionMachine::refresh_from`]: periodic re-login with a fresh token from
//!   the identity provider (see [`REFRESH_INTERVAL`]).

use std::future::Future;
use std::time::Duration;

use reqwest::header::HeaderMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::credential::Credential;
use crate::error::{DecodeError, RefreshError};
use crate::persistence::{
    read_token_from_cookie, ClientBackend, ExecutionContext, KeyValueStore, ServerBackend,
    SessionBackend,
};
use crate::token::{self, UserClaims};

/// Identity provider tokens are re-fetched this often.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Anonymous,
    Authenticated,
}

/// The current session. Claims exist exactly when a decoded token does.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated { user: UserClaims, token: String },
}

impl Session {
    pub fn state(&self) -> SessionState {
        match self {
            Session::Anonymous => SessionState::Anonymous,
            Session::Authenticated { .. } => SessionState::Authenticated,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated { .. })
    }

    pub fn user(&self) -> Option<&UserClaims> {
        match self {
            Session::Authenticated { user, .. } => Some(user),
            Session::Anonymous => None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Session::Authenticated { token, .. } => Some(token),
            Session::Anonymous => None,
        }
    }
}

/// Where fresh tokens come from (the identity provider's client library).
pub trait TokenSource {
    fn fetch_token(
        &self,
    ) -> impl Future<Output = Result<String, Box<dyn std::error::Error + Send + Sync>>> + Send;
}

/// Session context handed to everything that needs authentication state.
pub struct SessionMachine<B> {
    session: Session,
    backend: B,
    credential: Credential,
}

impl SessionMachine<ServerBackend> {
    /// Machine for a single server render.
    pub fn for_server(credential: Credential) -> Self {
        Self::new(ServerBackend::new(), credential)
    }
}

impl<S: KeyValueStore> SessionMachine<ClientBackend<S>> {
    /// Machine for a hydrated client backed by `storage`.
    pub fn for_client(storage: S, credential: Credential) -> Self {
        Self::new(ClientBackend::new(storage), credential)
    }
}

impl<B: SessionBackend> SessionMachine<B> {
    pub fn new(backend: B, credential: Credential) -> Self {
        Self {
            session: Session::Anonymous,
            backend,
            credential,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn user(&self) -> Option<&UserClaims> {
        self.session.user()
    }

    pub fn token(&self) -> Option<&str> {
        self.session.token()
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Authenticates with `token`.
    ///
    /// A token that does not decode leaves the session untouched; the failure
    /// is logged and returned. Persistence failures are logged only: the
    /// in-memory session is still established.
    pub fn login(&mut self, token: &str) -> Result<(), DecodeError> {
        self.authenticate(token, true)
    }

    fn authenticate(&mut self, token: &str, persist: bool) -> Result<(), DecodeError> {
        let user = match token::decode(token) {
            Ok(user) => user,
            Err(err) => {
                warn!(error = %err, "Login aborted: token could not be decoded");
                return Err(err);
            }
        };

        self.credential.set(token);
        if persist {
            if let Err(err) = self.backend.write_client_session(token, Some(&user)) {
                warn!(error = %err, "Failed to persist session; continuing in memory");
            }
        }

        debug!(
            subject = ?user.subject(),
            context = ?self.backend.context(),
            "Session authenticated"
        );
        self.session = Session::Authenticated {
            user,
            token: token.to_string(),
        };
        Ok(())
    }

    /// Ends the session from any state.
    pub fn logout(&mut self) {
        self.credential.clear();
        self.session = Session::Anonymous;
        if let Err(err) = self.backend.clear_client_session() {
            warn!(error = %err, "Failed to clear persisted session");
        }
        debug!(context = ?self.backend.context(), "Session ended");
    }

    /// Server-render entry point: logs in from the request's `jwt` cookie.
    ///
    /// No cookie leaves the state as it was. Running it twice for the same
    /// request is harmless.
    pub fn bootstrap_from_request(&mut self, headers: &HeaderMap) -> SessionState {
        match read_token_from_cookie(headers) {
            None => debug!("No session cookie on request"),
            Some(token) if self.token() == Some(token.as_str()) => {
                debug!("Session already established from this cookie");
            }
            Some(token) => {
                let _ = self.authenticate(&token, false);
            }
        }
        self.state()
    }

    /// Hydration entry point: logs in from client storage unless a session
    /// already exists. Does nothing in the server context.
    pub fn bootstrap_from_client_storage(&mut self) -> SessionState {
        if self.backend.context() == ExecutionContext::Server {
            debug!("Client storage unavailable while rendering on the server");
            return self.state();
        }
        if self.is_authenticated() {
            debug!("Session already established, skipping client storage");
            return self.state();
        }

        match self.backend.read_session_from_client_storage() {
            Some(persisted) => {
                let _ = self.login(&persisted.token);
            }
            None => debug!("No persisted session in client storage"),
        }
        self.state()
    }

    /// Re-runs login with a fresh token from `source`.
    ///
    /// If the source fails or hands back an undecodable token, the current
    /// session stays as it is.
    pub async fn refresh_from<T: TokenSource>(&mut self, source: &T) -> Result<(), RefreshError> {
        let token = match source.fetch_token().await {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "Token refresh failed; keeping current session");
                return Err(RefreshError::Source(err));
            }
        };
        self.login(&token)?;
        Ok(())
    }
}
