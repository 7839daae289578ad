//! Locations of per-user state on disk.

use crate::constants::{
    APP_DIR_NAME, CREDENTIAL_FILE_NAME, CREDENTIAL_KEY_FILE_NAME, SETTINGS_FILE_NAME,
};
use std::path::PathBuf;

/// Environment override for the data directory (tests, portable installs)
pub const DATA_DIR_ENV: &str = "DIRPROBE_DATA_DIR";

/// Get the DirProbe directory under the user's local application data
///
/// Returns `%LOCALAPPDATA%\DirProbe` on Windows and `~/.local/share/DirProbe`
/// (or the platform equivalent) elsewhere. The directory is not created here.
pub fn app_data_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return Some(PathBuf::from(dir));
        }
    }

    dirs::data_local_dir().map(|base| base.join(APP_DIR_NAME))
}

pub fn credential_file() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(CREDENTIAL_FILE_NAME))
}

pub fn credential_key_file() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(CREDENTIAL_KEY_FILE_NAME))
}

pub fn settings_file() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(SETTINGS_FILE_NAME))
}

pub fn logs_dir() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join("logs"))
}
