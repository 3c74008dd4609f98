//! XDG directory helpers for config/data/runtime locations.

use std::path::PathBuf;

/// Base directory for configuration files.
///
/// Uses `SKEIN_CONFIG_DIR` if set, otherwise `$XDG_CONFIG_HOME/skein` or
/// `~/.config/skein`.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SKEIN_CONFIG_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }

    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".config")
        })
        .join("skein")
}

/// Base directory for persistent data (workspace registry, caches).
///
/// Uses `SKEIN_DATA_DIR` if set, otherwise `$XDG_DATA_HOME/skein` or
/// `~/.local/share/skein`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SKEIN_DATA_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }

    std::env::var("XDG_DATA_HOME")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".local")
                .join("share")
        })
        .join("skein")
}

/// Directory for the session socket.
///
/// `$XDG_RUNTIME_DIR/skein`, falling back to `~/.skein`.
pub fn runtime_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir).join("skein");
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".skein")
}

/// The workspace daemon's UI session socket.
pub fn socket_path() -> PathBuf {
    runtime_dir().join("ui.sock")
}

/// The workspace registry file discovery watches.
pub fn workspace_registry_path() -> PathBuf {
    data_dir().join("workspaces.json")
}

/// Preference store path.
pub fn prefs_path() -> PathBuf {
    config_dir().join("prefs.json")
}
