// src/infra/paths.rs — XDG-compliant path management
//
// All paths respect the SHADERLOOP_HOME environment variable for isolation.
// When SHADERLOOP_HOME is set, config and data live under that directory.
// When unset, config uses ~/.shaderloop/ and data uses XDG_DATA_HOME/shaderloop.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Returns the SHADERLOOP_HOME override, if set.
fn shaderloop_home() -> Option<PathBuf> {
    std::env::var_os("SHADERLOOP_HOME").map(PathBuf::from)
}

/// Home directory, or the current directory when none can be determined.
pub fn dirs_home() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration directory: $SHADERLOOP_HOME/ or ~/.shaderloop/
pub fn config_dir() -> PathBuf {
    if let Some(home) = shaderloop_home() {
        return home;
    }
    dirs_home().join(".shaderloop")
}

/// Data directory: $SHADERLOOP_HOME/data/ or ~/.local/share/shaderloop/
pub fn data_dir() -> PathBuf {
    if let Some(home) = shaderloop_home() {
        return home.join("data");
    }
    match ProjectDirs::from("", "", "shaderloop") {
        Some(dirs) => dirs.data_local_dir().to_path_buf(),
        None => config_dir().join("data"),
    }
}

pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Append-only iteration history (one JSON record per line).
pub fn history_path() -> PathBuf {
    data_dir().join("history.jsonl")
}

/// Persisted screenshots referenced by `Evidence::storage_ref`.
pub fn evidence_dir() -> PathBuf {
    data_dir().join("evidence")
}

/// Reference images, one `<scene>.png` per named scene.
pub fn references_dir() -> PathBuf {
    config_dir().join("references")
}
