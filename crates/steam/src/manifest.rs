//! App manifest (`appmanifest_<id>.acf`) decoding.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::SteamError;
use crate::vdf::{self, Table};

/// Root table of an app manifest.
pub const APPSTATE_KEY: &str = "appstate";

/// File name prefix shared by all app manifests.
pub const MANIFEST_PREFIX: &str = "appmanifest_";

/// Directory under a library's steamapps folder that holds game installs.
pub const COMMON_DIR: &str = "common";

bitflags::bitflags! {
    /// Install-state bits from a manifest's `StateFlags`.
    ///
    /// Several bits are routinely set together (e.g. `FULLY_INSTALLED` and
    /// `UPDATE_REQUIRED`). Bits not listed here are kept as-is.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct StatusFlags: u32 {
        const UNINSTALLED = 1;
        const UPDATE_REQUIRED = 2;
        const FULLY_INSTALLED = 4;
        const ENCRYPTED = 8;
        const LOCKED = 16;
        const FILES_MISSING = 32;
        const APP_RUNNING = 64;
        const FILES_CORRUPT = 128;
        const UPDATE_RUNNING = 256;
        const UPDATE_PAUSED = 512;
        const UPDATE_STARTED = 1024;
        const UNINSTALLING = 2048;
        const BACKUP_RUNNING = 4096;
        const RECONFIGURING = 65536;
        const VALIDATING = 131072;
        const ADDING_FILES = 262144;
        const PREALLOCATING = 524288;
        const DOWNLOADING = 1048576;
        const STAGING = 2097152;
        const COMMITTING = 4194304;
        const UPDATE_STOPPING = 8388608;
    }
}

impl StatusFlags {
    /// No bits set: the state is unknown.
    pub fn is_invalid(&self) -> bool {
        self.is_empty()
    }
}

impl Serialize for StatusFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StatusFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u32::deserialize(deserializer).map(StatusFlags::from_bits_retain)
    }
}

/// Errors for documents that parse but are not usable manifests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    #[error("not a game manifest (no appstate table)")]
    NotAGameManifest,

    #[error("manifest has no appid")]
    MissingAppId,
}

/// A Steam game as described by its app manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub id: String,
    pub title: String,
    pub install_dir: PathBuf,
    pub size_on_disk: u64,
    pub status: StatusFlags,
    pub manifest_path: PathBuf,
}

impl GameRecord {
    /// Creates an empty record for `id` backed by `manifest_path`.
    pub fn new(id: impl Into<String>, manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            install_dir: PathBuf::new(),
            size_on_disk: 0,
            status: StatusFlags::empty(),
            manifest_path: manifest_path.into(),
        }
    }
}

/// Decodes a parsed manifest into a new record.
pub fn decode(doc: &Table, manifest_path: &Path) -> Result<GameRecord, ManifestError> {
    let appstate = doc
        .table(APPSTATE_KEY)
        .ok_or(ManifestError::NotAGameManifest)?;
    let id = appstate
        .attribute("appid")
        .ok_or(ManifestError::MissingAppId)?;

    let mut record = GameRecord::new(id, manifest_path);
    apply_appstate(appstate, manifest_path, &mut record);
    Ok(record)
}

/// Refreshes `record` in place from a parsed manifest.
///
/// The record's id is left alone; fields missing from the manifest keep
/// their current values.
pub fn apply(doc: &Table, manifest_path: &Path, record: &mut GameRecord) -> Result<(), ManifestError> {
    let appstate = doc
        .table(APPSTATE_KEY)
        .ok_or(ManifestError::NotAGameManifest)?;
    apply_appstate(appstate, manifest_path, record);
    Ok(())
}

fn apply_appstate(appstate: &Table, manifest_path: &Path, record: &mut GameRecord) {
    if let Some(name) = appstate.attribute("name") {
        record.title = name.to_owned();
    }

    if let Some(dir) = appstate.attribute("installdir") {
        record.install_dir = install_dir_for(manifest_path, dir);
    }

    if let Some(size) = appstate.attribute("sizeondisk") {
        match size.trim().parse::<u64>() {
            Ok(size) => record.size_on_disk = size,
            Err(e) => debug!(id = %record.id, value = size, error = %e, "ignoring unparsable sizeondisk"),
        }
    }

    if let Some(flags) = appstate.attribute("stateflags") {
        match flags.trim().parse::<u32>() {
            Ok(bits) => record.status = StatusFlags::from_bits_retain(bits),
            Err(e) => debug!(id = %record.id, value = flags, error = %e, "ignoring unparsable stateflags"),
        }
    }

    record.manifest_path = manifest_path.to_path_buf();
}

/// Returns `<manifest dir>/common/<installdir>`.
pub fn install_dir_for(manifest_path: &Path, install_dir: &str) -> PathBuf {
    manifest_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(COMMON_DIR)
        .join(install_dir)
}

/// Reads, parses and decodes a manifest file.
pub fn load(manifest_path: &Path) -> Result<GameRecord, SteamError> {
    let doc = vdf::load_file(manifest_path)?;
    Ok(decode(&doc, manifest_path)?)
}

/// Reads a manifest file and refreshes `record` from it.
pub fn reload_into(manifest_path: &Path, record: &mut GameRecord) -> Result<(), SteamError> {
    let doc = vdf::load_file(manifest_path)?;
    Ok(apply(&doc, manifest_path, record)?)
}

/// Returns the `<id>` part of an `appmanifest_<id>.<ext>` file name.
pub fn manifest_id(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    let (stem, ext) = name.strip_prefix(MANIFEST_PREFIX)?.rsplit_once('.')?;
    (!stem.is_empty() && !stem.contains('.') && !ext.is_empty()).then_some(stem)
}

/// Returns the file name Steam uses for the manifest of `id`.
pub fn manifest_file_name(id: &str) -> String {
    format!("{MANIFEST_PREFIX}{id}.acf")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TF2: &str = r#"
"appstate"
{
    "appid"        "440"
    "name"         "Team Fortress 2"
    "installdir"   "Team Fortress 2"
    "sizeondisk"   "15034619593"
    "stateflags"   "4"
}
"#;

    #[test]
    fn decode_full_manifest() {
        let doc = vdf::parse_str(TF2).unwrap();
        let path = Path::new("/games/steamapps/appmanifest_440.acf");
        let game = decode(&doc, path).unwrap();

        assert_eq!(game.id, "440");
        assert_eq!(game.title, "Team Fortress 2");
        assert_eq!(game.size_on_disk, 15_034_619_593);
        assert_eq!(game.status, StatusFlags::FULLY_INSTALLED);
        assert_eq!(
            game.install_dir,
            PathBuf::from("/games/steamapps/common/Team Fortress 2")
        );
        assert_eq!(game.manifest_path, path);
    }

    #[test]
    fn decode_mixed_case_keys() {
        let doc = vdf::parse_str(
            r#""AppState" { "AppID" "730" "Name" "Counter-Strike 2" "StateFlags" "6" }"#,
        )
        .unwrap();
        let game = decode(&doc, Path::new("/s/appmanifest_730.acf")).unwrap();
        assert_eq!(game.id, "730");
        assert_eq!(game.title, "Counter-Strike 2");
        assert_eq!(
            game.status,
            StatusFlags::FULLY_INSTALLED | StatusFlags::UPDATE_REQUIRED
        );
    }

    #[test]
    fn missing_appstate() {
        let doc = vdf::parse_str(r#""libraryfolders" { "1" "/mnt/a" }"#).unwrap();
        assert_eq!(
            decode(&doc, Path::new("/x/appmanifest_1.acf")),
            Err(ManifestError::NotAGameManifest)
        );
    }

    #[test]
    fn missing_appid() {
        let doc = vdf::parse_str(r#""appstate" { "name" "Nameless" }"#).unwrap();
        assert_eq!(
            decode(&doc, Path::new("/x/appmanifest_1.acf")),
            Err(ManifestError::MissingAppId)
        );
    }

    #[test]
    fn non_numeric_id_is_kept() {
        let doc = vdf::parse_str(r#""appstate" { "appid" "beta-01" }"#).unwrap();
        let game = decode(&doc, Path::new("/x/appmanifest_beta-01.acf")).unwrap();
        assert_eq!(game.id, "beta-01");
    }

    #[test]
    fn bad_numbers_leave_defaults() {
        let doc = vdf::parse_str(
            r#""appstate" { "appid" "1" "sizeondisk" "huge" "stateflags" "-" }"#,
        )
        .unwrap();
        let game = decode(&doc, Path::new("/x/appmanifest_1.acf")).unwrap();
        assert_eq!(game.size_on_disk, 0);
        assert!(game.status.is_invalid());
    }

    #[test]
    fn apply_keeps_previous_values_for_missing_fields() {
        let doc = vdf::parse_str(TF2).unwrap();
        let path = Path::new("/a/steamapps/appmanifest_440.acf");
        let mut game = decode(&doc, path).unwrap();

        let update = vdf::parse_str(
            r#""appstate" { "appid" "440" "name" "TF2" "sizeondisk" "oops" "stateflags" "1026" }"#,
        )
        .unwrap();
        apply(&update, path, &mut game).unwrap();

        assert_eq!(game.title, "TF2");
        assert_eq!(game.size_on_disk, 15_034_619_593);
        assert_eq!(
            game.status,
            StatusFlags::UPDATE_REQUIRED | StatusFlags::UPDATE_STARTED
        );
        assert_eq!(
            game.install_dir,
            PathBuf::from("/a/steamapps/common/Team Fortress 2")
        );
    }

    #[test]
    fn unknown_status_bits_are_retained() {
        let doc = vdf::parse_str(r#""appstate" { "appid" "1" "stateflags" "8196" }"#).unwrap();
        let game = decode(&doc, Path::new("/x/appmanifest_1.acf")).unwrap();
        assert_eq!(game.status.bits(), 8196);
        assert!(game.status.contains(StatusFlags::FULLY_INSTALLED));
    }

    #[test]
    fn load_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("appmanifest_440.acf");
        std::fs::write(&path, TF2).unwrap();

        let game = load(&path).unwrap();
        assert_eq!(game.id, "440");
        assert_eq!(game.install_dir, tmp.path().join("common").join("Team Fortress 2"));
    }

    #[test]
    fn manifest_id_from_file_name() {
        assert_eq!(manifest_id(Path::new("/s/appmanifest_440.acf")), Some("440"));
        assert_eq!(manifest_id(Path::new("appmanifest_730.tmp")), Some("730"));
        assert_eq!(manifest_id(Path::new("/s/appmanifest_.acf")), None);
        assert_eq!(manifest_id(Path::new("/s/appmanifest_440")), None);
        assert_eq!(manifest_id(Path::new("/s/appmanifest_440.acf.tmp")), None);
        assert_eq!(manifest_id(Path::new("/s/libraryfolders.vdf")), None);
    }

    #[test]
    fn manifest_file_name_format() {
        assert_eq!(manifest_file_name("440"), "appmanifest_440.acf");
    }

    #[test]
    fn record_json_field_names() {
        let mut game = GameRecord::new("440", "/s/appmanifest_440.acf");
        game.status = StatusFlags::FULLY_INSTALLED;
        let json = serde_json::to_value(&game).unwrap();
        assert_eq!(json["sizeOnDisk"], 0);
        assert_eq!(json["status"], 4);
        assert!(json.get("installDir").is_some());
        assert!(json.get("manifestPath").is_some());
    }
}
