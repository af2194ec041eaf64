//! Platform-specific paths for export configurations.
//!
//! # Directory Structure
//!
//! - **User config**: `~/.config/cadenza/` (Linux), `~/Library/Application Support/cadenza/` (macOS), `%APPDATA%\cadenza\` (Windows)
//! - **Saved exports**: the `exports/` subdirectory of the user config directory

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Application name used for directory paths.
const APP_NAME: &str = "cadenza";

/// Subdirectory name for saved export configurations.
const CONFIGS_SUBDIR: &str = "exports";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path if the platform config directory cannot be
/// determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the directory holding saved export configurations.
pub fn user_configs_dir() -> PathBuf {
    user_config_dir().join(CONFIGS_SUBDIR)
}

/// Create the saved-exports directory if needed and return it.
pub fn ensure_user_configs_dir() -> Result<PathBuf, ConfigError> {
    let dir = user_configs_dir();
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| ConfigError::create_dir(&dir, e))?;
    }
    Ok(dir)
}

/// Find an export configuration by path or by saved name.
///
/// `name` is tried as a path first, then as a file in
/// [`user_configs_dir`] with or without the `.toml` extension.
pub fn find_config(name: &str) -> Option<PathBuf> {
    let direct = PathBuf::from(name);
    if direct.is_file() {
        return Some(direct);
    }
    find_config_in(&user_configs_dir(), name)
}

fn find_config_in(dir: &Path, name: &str) -> Option<PathBuf> {
    let file_name = if Path::new(name).extension().is_some_and(|ext| ext == "toml") {
        name.to_owned()
    } else {
        format!("{name}.toml")
    };
    let candidate = dir.join(file_name);
    candidate.is_file().then_some(candidate)
}

/// List saved export configurations, sorted by path.
pub fn list_user_configs() -> Vec<PathBuf> {
    list_configs_in_dir(&user_configs_dir())
}

/// List `.toml` files in `dir`. A missing directory yields an empty list.
pub fn list_configs_in_dir(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut configs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    configs.sort();
    configs
}

/// Configuration name from a file path (the file stem).
///
/// ```rust
/// use cadenza_config::paths::config_name_from_path;
/// use std::path::Path;
///
/// let name = config_name_from_path(Path::new("/path/to/podcast_intro.toml"));
/// assert_eq!(name.as_deref(), Some("podcast_intro"));
/// ```
pub fn config_name_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_owned)
}
