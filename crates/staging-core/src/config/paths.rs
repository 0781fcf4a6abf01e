//! Default path resolution helpers.

use std::path::{Path, PathBuf};

/// File name of the settings file.
pub const SETTINGS_FILE: &str = "staging.toml";

/// Settings file inside a configuration directory.
pub fn settings_path(config_dir: &Path) -> PathBuf {
    config_dir.join("staging").join(SETTINGS_FILE)
}

/// Settings file in the user's configuration directory.
pub fn default_settings_path() -> anyhow::Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(settings_path(&config_dir))
}

pub fn default_staging_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("C:\\ProgramData\\staging")
    } else {
        PathBuf::from("/opt/staging")
    }
}

pub fn default_exec_path() -> String {
    if cfg!(windows) {
        "C:\\Windows\\System32;C:\\Windows\\System32\\WindowsPowerShell\\v1.0".to_string()
    } else {
        "/usr/local/bin:/usr/bin:/bin".to_string()
    }
}
