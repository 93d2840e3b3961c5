//! Path utilities

use std::path::{Path, PathBuf};

/// Sandpit data directory (~/.sandpit)
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".sandpit"))
        .unwrap_or_else(|| PathBuf::from(".sandpit"))
}

/// Configuration file location
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Expand a leading `~` and anchor relative paths at `base`.
pub fn expand_path(path: &str, base: &Path) -> PathBuf {
    let expanded = if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(path))
    } else if let Some(rest) = path.strip_prefix("~/") {
        match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        }
    } else {
        PathBuf::from(path)
    };

    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}
