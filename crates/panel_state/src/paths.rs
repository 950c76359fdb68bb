use std::path::{Path, PathBuf};

pub const PANEL_STATE_DIR: &str = ".taskpilot";
pub const PANEL_STATE_FILE: &str = "panel.json";

#[must_use]
pub fn state_dir(home: &Path) -> PathBuf {
    home.join(PANEL_STATE_DIR)
}

#[must_use]
pub fn default_state_path(home: &Path) -> PathBuf {
    state_dir(home).join(PANEL_STATE_FILE)
}
