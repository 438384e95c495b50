//! Error types for dash-core operations.
//!
//! Every failure inside the core degrades to "no observable state change" and is
//! also handed back as one of these values, so callers can render it.

use std::path::PathBuf;

use crate::store::Slot;

// ═══════════════════════════════════════════════════════════════════════════════
// Token & Session Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// A bearer token that could not be turned into claims.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Token is empty")]
    Empty,

    #[error("Token must have 3 dot-separated segments, found {found}")]
    SegmentCount { found: usize },

    #[error("Token payload is not valid base64url: {source}")]
    Base64 {
        #[source]
        source: base64::DecodeError,
    },

    #[error("Token payload is not valid JSON: {source}")]
    Json {
        #[source]
        source: serde_json::Error,
    },

    #[error("Token payload is not a JSON object")]
    NotAnObject,
}

/// Failure to obtain a fresh token and log in with it.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("Token source failed: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

// ═══════════════════════════════════════════════════════════════════════════════
// Persistence Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Storage I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage serialization error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// Remote Call Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Any failure talking to the analysis API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request to {path} failed with status {status}")]
    Status { status: u16, path: String },

    #[error("Invalid API URL for {path}: {source}")]
    InvalidUrl {
        path: String,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Remote call failed: {0}")]
    Remote(#[from] ApiError),

    #[error("Response for {slot} discarded: a newer request was issued")]
    Superseded { slot: Slot },
}

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration read failed: {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file malformed: {path}: {details}")]
    Malformed { path: PathBuf, details: String },

    #[error("Invalid API base URL {value}: {source}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

// ═══════════════════════════════════════════════════════════════════════════════
// Crate-level Error
// ═══════════════════════════════════════════════════════════════════════════════

/// Umbrella error for clients that drive several components at once.
#[derive(Debug, thiserror::Error)]
pub enum DashError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Refresh(#[from] RefreshError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("JSON output error: {0}")]
    Output(#[from] serde_json::Error),

    #[error("Not logged in")]
    NotAuthenticated,
}

/// Convenience type alias for Results using DashError.
pub type Result<T> = std::result::Result<T, DashError>;
