//! Default on-disk locations.
//!
//! Config: `~/.config/lapsecam/config.json` (Linux)
//! Captures: `~/.local/share/lapsecam/captures/`

use directories::ProjectDirs;
use std::path::PathBuf;

pub const CONFIG_FILE: &str = "config.json";
pub const CAPTURES_DIR: &str = "captures";

pub fn get_project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "lapsecam", "lapsecam")
}

/// Settings file used when `--config` is not given.
pub fn default_config_path() -> PathBuf {
    get_project_dirs()
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
}

/// Capture directory used when `--captures` is not given.
pub fn default_captures_dir() -> PathBuf {
    get_project_dirs()
        .map(|dirs| dirs.data_dir().join(CAPTURES_DIR))
        .unwrap_or_else(|| PathBuf::from(CAPTURES_DIR))
}
