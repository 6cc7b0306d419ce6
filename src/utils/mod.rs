pub mod download;
pub mod extract;
pub mod progress;

use chrono::Local;
use directories::BaseDirs;
use std::path::PathBuf;

/// Expands a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let path = path.trim();
    let rest = if path == "~" {
        Some("")
    } else {
        path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\"))
    };
    match (rest, BaseDirs::new()) {
        (Some(rest), Some(base)) if rest.is_empty() => base.home_dir().to_path_buf(),
        (Some(rest), Some(base)) => base.home_dir().join(rest),
        _ => PathBuf::from(path),
    }
}

/// Local time stamp used in temp and backup file names.
pub fn timestamp() -> String {
    Local::now().format("%Y%m%d%H%M%S%3f").to_string()
}
