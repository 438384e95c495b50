//! # dash-core
//!
//! Core library for the Trailblazer dashboard client: who is logged in, where
//! that login is persisted, and the analysis data shown once it is.
//!
//! ## Design Principles
//!
//! - **Explicit context**: [`SessionMachine`] is passed around, never global. The
//!   store only sees the [`Credential`] through its API client.
//! - **Graceful degradation**: Bad tokens, storage failures and remote errors
//!   leave state untouched. They are logged and returned as values.
//! - **One trait per seam**: [`SessionBackend`] for where a session lives,
//!   [`KeyValueStore`] for client storage, [`ApiClient`] for the backend API.
//! - **Latest request wins**: Slot-replacing fetches are generation stamped, so a
//!   slow stale response never overwrites a newer one.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dash_core::{Credential, DomainStore, FileStore, HttpApi, SessionMachine, StorageConfig};
//!
//! let storage = StorageConfig::default();
//! let credential = Credential::new();
//! let mut session =
//!     SessionMachine::for_client(FileStore::new(storage.client_storage_file()), credential.clone());
//! session.bootstrap_from_client_storage();
//!
//! let store = DomainStore::new(HttpApi::new(base_url, credential));
//! store.fetch_analyses(None, Some(true)).await?;
//! let failed = store.failed_analyses();
//! ```

pub mod api;
pub mod config;
pub mod credential;
pub mod error;
pub mod format;
pub mod persistence;
pub mod session;
pub mod storage;
pub mod store;
pub mod token;

#[cfg(test)]
mod test_support;

pub use api::{ApiClient, HttpApi};
pub use config::{load_config, ApiConfig, DashConfig};
pub use credential::Credential;
pub use error::{
    ApiError, ConfigError, DashError, DecodeError, PersistError, RefreshError, Result, StoreError,
};
pub use format::{analysis_run_duration, format_date, run_duration};
pub use persistence::{
    read_token_from_cookie, ClientBackend, ExecutionContext, FileStore, KeyValueStore,
    MemoryStore, PersistedSession, ServerBackend, SessionBackend,
};
pub use session::{Session, SessionMachine, SessionState, TokenSource, REFRESH_INTERVAL};
pub use storage::StorageConfig;
pub use store::{DomainStore, Slot, StoreSnapshot};
pub use token::{decode, UserClaims};

pub use trailblazer_dash_protocol as protocol;
