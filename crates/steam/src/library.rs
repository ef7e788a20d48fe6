//! Library folder index (`libraryfolders.vdf`).
//!
//! Two layouts are understood. The legacy one maps each index straight to
//! a path:
//!
//! ```text
//! "LibraryFolders" { "1" "D:\\SteamLibrary" }
//! ```
//!
//! Current clients store a table per library with a `path` attribute, and
//! list the main install itself as `"0"`:
//!
//! ```text
//! "libraryfolders" { "0" { "path" "C:\\Steam" } "1" { "path" "D:\\SteamLibrary" } }
//! ```

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::SteamError;
use crate::vdf::{self, Table, Value};

/// Root table of a library index.
pub const LIBRARY_FOLDERS_KEY: &str = "libraryfolders";

/// File name of the library index inside the main steamapps folder.
pub const LIBRARY_INDEX_FILE: &str = "libraryfolders.vdf";

/// Returns the additional library roots listed in a library index.
///
/// Entries are read as `"1"`, `"2"`, ... and the scan stops at the first
/// index that is missing or has no usable path.
pub fn library_roots(doc: &Table) -> Vec<PathBuf> {
    let Some(folders) = doc.table(LIBRARY_FOLDERS_KEY) else {
        debug!("library index has no libraryfolders table");
        return Vec::new();
    };

    let mut roots = Vec::new();
    for index in 1usize.. {
        let path = match folders.get(&index.to_string()) {
            Some(Value::Attribute(path)) => path.as_str(),
            Some(Value::Table(entry)) => match entry.attribute("path") {
                Some(path) => path,
                None => break,
            },
            None => break,
        };
        roots.push(PathBuf::from(path));
    }
    roots
}

/// Returns each library root joined with the steamapps directory name.
pub fn scan_roots(doc: &Table, steamapps_dir: &str) -> Vec<PathBuf> {
    library_roots(doc)
        .into_iter()
        .map(|root| root.join(steamapps_dir))
        .collect()
}

/// Reads a library index file and returns its scan roots.
pub fn load_scan_roots(path: &Path, steamapps_dir: &str) -> Result<Vec<PathBuf>, SteamError> {
    let doc = vdf::load_file(path)?;
    Ok(scan_roots(&doc, steamapps_dir))
}
