//! Config file location.

use std::path::PathBuf;

/// Directory name under the config home.
pub const APP_DIR: &str = "aitk";

/// File name of the credential file.
pub const CONFIG_FILE: &str = "config";

/// Resolve `$XDG_CONFIG_HOME/aitk/config`, falling back to
/// `~/.config/aitk/config` when the variable is unset or empty.
///
/// `~/.config` is used on every platform (not the platform-native config
/// directory) so the path printed by the docs is the path used.
pub fn config_file_path(xdg_config_home: Option<&str>) -> PathBuf {
    config_home(xdg_config_home).join(APP_DIR).join(CONFIG_FILE)
}

fn config_home(xdg_config_home: Option<&str>) -> PathBuf {
    if let Some(dir) = xdg_config_home
        && !dir.trim().is_empty()
    {
        return expand_tilde(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".config"))
        .unwrap_or_else(|| PathBuf::from(".config"))
}

/// Expand tilde (~) prefix to the user's home directory.
/// Handles both "~" alone and "~/path/to/something" patterns.
pub(crate) fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}
