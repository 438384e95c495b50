//! Storage configuration and path management for the dashboard client.
//!
//! Every on-disk location the client uses is decided here, so tests can point
//! the whole client at a temp directory with [`StorageConfig::with_root`].

use std::path::{Path, PathBuf};

/// Central configuration for all client storage paths.
///
/// Production code uses `StorageConfig::default()` which points to `~/.trailblazer/`.
/// Tests use `StorageConfig::with_root(temp_dir)` for isolation.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            root: home.join(".trailblazer"),
        }
    }
}

impl StorageConfig {
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Files
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to client-storage.json (persisted session keys).
    pub fn client_storage_file(&self) -> PathBuf {
        self.root.join("client-storage.json")
    }

    /// Path to config.toml (API endpoint settings).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }
}
