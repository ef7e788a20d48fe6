use std::path::PathBuf;

use crate::SteamError;

const STEAM_KEYS: [&str; 2] = [
    r"SOFTWARE\Valve\Steam",
    r"SOFTWARE\Wow6432Node\Valve\Steam",
];

/// Returns the Steam base directory on Windows using the registry.
///
/// A registry entry only counts if `Steam.exe` is present in the directory
/// it names; stale keys survive uninstalls.
pub(crate) fn get_base_dir() -> Result<PathBuf, SteamError> {
    STEAM_KEYS
        .iter()
        .filter_map(|subkey| read_install_path(subkey))
        .find(|path| path.join("Steam.exe").is_file())
        .ok_or(SteamError::NotFound)
}

fn read_install_path(subkey: &str) -> Option<PathBuf> {
    use winreg::RegKey;
    use winreg::enums::HKEY_LOCAL_MACHINE;

    let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
    let key = hklm.open_subkey(subkey).ok()?;
    let install_path: String = key.get_value("InstallPath").ok()?;
    if install_path.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(install_path))
}
