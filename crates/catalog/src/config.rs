//! Catalog configuration.
//!
//! Stored as JSON; every field is optional and falls back to the values
//! Steam itself uses.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use steamshelf_steam::{LIBRARY_INDEX_FILE, Paths, STEAMAPPS_DIR};

use crate::error::CatalogError;

/// Default capacity of the change and notification channels.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Settings for a [`Catalog`](crate::Catalog).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogConfig {
    /// Steam install directory; skips install-path resolution when set.
    pub install_path: Option<PathBuf>,

    /// Name of the manifest folder inside each library.
    pub steamapps_dir: String,

    /// File name of the library index inside the main manifest folder.
    pub library_index_file: String,

    /// Capacity of the inbound change queue and the outbound notification
    /// channel.
    pub event_capacity: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            install_path: None,
            steamapps_dir: STEAMAPPS_DIR.to_owned(),
            library_index_file: LIBRARY_INDEX_FILE.to_owned(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl CatalogConfig {
    /// Loads a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the Steam directory layout rooted at `install_root`.
    pub fn paths(&self, install_root: &Path) -> Paths {
        Paths::with_base(install_root).with_steamapps_dir(self.steamapps_dir.as_str())
    }

    /// Channel capacity, never zero.
    pub fn channel_capacity(&self) -> usize {
        self.event_capacity.max(1)
    }
}
