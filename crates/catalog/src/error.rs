//! Error types for catalog operations.

use std::path::PathBuf;

use steamshelf_steam::SteamError;

/// Errors produced by the catalog and its change-notification plumbing.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("steam error: {0}")]
    Steam(#[from] SteamError),

    #[error("steam installation not found")]
    NotInstalled,

    #[error("not an app manifest: {}", .0.display())]
    NotAManifest(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("watch error: {0}")]
    Watch(String),
}
