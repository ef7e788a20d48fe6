use std::path::{Path, PathBuf};

use crate::SteamError;
use crate::library::LIBRARY_INDEX_FILE;
use crate::manifest::{COMMON_DIR, manifest_file_name};

/// Name of the folder inside each library that holds app manifests.
#[cfg(target_os = "windows")]
pub const STEAMAPPS_DIR: &str = "SteamApps";

/// Name of the folder inside each library that holds app manifests.
#[cfg(not(target_os = "windows"))]
pub const STEAMAPPS_DIR: &str = "steamapps";

/// Provides access to Steam directory paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    base_dir: PathBuf,
    steamapps: String,
}

impl Paths {
    /// Creates a new `Paths` instance with auto-detected Steam directory.
    pub fn new() -> Result<Self, SteamError> {
        let base_dir = get_base_dir()?;
        Ok(Self::with_base(base_dir))
    }

    /// Creates a new `Paths` instance with a custom base directory.
    pub fn with_base(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            steamapps: STEAMAPPS_DIR.to_owned(),
        }
    }

    /// Overrides the name of the steamapps folder.
    pub fn with_steamapps_dir(mut self, name: impl Into<String>) -> Self {
        self.steamapps = name.into();
        self
    }

    /// Returns the Steam base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the main library's steamapps directory.
    pub fn steamapps_dir(&self) -> PathBuf {
        self.base_dir.join(&self.steamapps)
    }

    /// Returns the path to the library index file.
    pub fn library_index_path(&self) -> PathBuf {
        self.steamapps_dir().join(LIBRARY_INDEX_FILE)
    }

    /// Returns the manifest path for an app in the main library.
    pub fn manifest_path(&self, app_id: &str) -> PathBuf {
        self.steamapps_dir().join(manifest_file_name(app_id))
    }

    /// Returns the directory holding game installs in the main library.
    pub fn common_dir(&self) -> PathBuf {
        self.steamapps_dir().join(COMMON_DIR)
    }
}

/// Returns the Steam install directory, or `None` if Steam is not installed.
pub fn resolve_install_path() -> Option<PathBuf> {
    match get_base_dir() {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "resolved steam install path");
            Some(path)
        }
        Err(e) => {
            tracing::debug!(error = %e, "steam install path not resolved");
            None
        }
    }
}

// Platform-specific base directory detection.
#[cfg(target_os = "linux")]
fn get_base_dir() -> Result<PathBuf, SteamError> {
    crate::paths_linux::get_base_dir()
}

#[cfg(target_os = "windows")]
fn get_base_dir() -> Result<PathBuf, SteamError> {
    crate::paths_windows::get_base_dir()
}

#[cfg(target_os = "macos")]
fn get_base_dir() -> Result<PathBuf, SteamError> {
    let home = std::env::var_os("HOME").ok_or(SteamError::NotFound)?;
    let steam_dir = PathBuf::from(home)
        .join("Library")
        .join("Application Support")
        .join("Steam");
    if steam_dir.is_dir() {
        Ok(steam_dir)
    } else {
        Err(SteamError::NotFound)
    }
}

#[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
fn get_base_dir() -> Result<PathBuf, SteamError> {
    Err(SteamError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_with_base() {
        let paths = Paths::with_base("/tmp/steam");
        assert_eq!(paths.base_dir(), Path::new("/tmp/steam"));
        assert_eq!(
            paths.steamapps_dir(),
            PathBuf::from("/tmp/steam").join(STEAMAPPS_DIR)
        );
    }

    #[test]
    fn steamapps_structure() {
        let paths = Paths::with_base("/steam").with_steamapps_dir("steamapps");
        assert_eq!(
            paths.library_index_path(),
            PathBuf::from("/steam/steamapps/libraryfolders.vdf")
        );
        assert_eq!(
            paths.manifest_path("440"),
            PathBuf::from("/steam/steamapps/appmanifest_440.acf")
        );
        assert_eq!(paths.common_dir(), PathBuf::from("/steam/steamapps/common"));
    }

    #[test]
    fn custom_steamapps_name() {
        let paths = Paths::with_base("/steam").with_steamapps_dir("SteamApps");
        assert_eq!(paths.steamapps_dir(), PathBuf::from("/steam/SteamApps"));
    }
}
