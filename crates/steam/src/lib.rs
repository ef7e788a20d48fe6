//! Steam integration: text VDF parsing, app manifests, library folders and
//! install-path discovery.

pub mod library;
pub mod manifest;
pub mod paths;
#[cfg(target_os = "linux")]
mod paths_linux;
#[cfg(target_os = "windows")]
mod paths_windows;
pub mod vdf;

use std::path::PathBuf;

// Re-export primary types.
pub use library::{LIBRARY_INDEX_FILE, library_roots, load_scan_roots, scan_roots};
pub use manifest::{GameRecord, ManifestError, StatusFlags, manifest_id};
pub use paths::{Paths, STEAMAPPS_DIR, resolve_install_path};
pub use vdf::{FormatError, Position, Table, Value};

/// Errors for Steam operations.
#[derive(Debug, thiserror::Error)]
pub enum SteamError {
    #[error("steam installation not found")]
    NotFound,

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("VDF parse error: {0}")]
    Format(#[from] FormatError),

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
}
