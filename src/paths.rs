//! Centralized path resolution for setsync
//!
//! # Environment Variables
//!
//! - `SETSYNC_CONFIG_DIR` - Override config directory
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `SETSYNC_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/setsync` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\setsync`
//!    - macOS/Linux: `~/.config/setsync`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "SETSYNC_CONFIG_DIR";

/// Directory name under the config home
const APP_DIR: &str = "setsync";

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Get the setsync config directory path
pub fn config_dir() -> Result<PathBuf> {
    let dir = resolve_config_dir(
        std::env::var(ENV_CONFIG_DIR).ok().as_deref(),
        std::env::var("XDG_CONFIG_HOME").ok().as_deref(),
        platform_config_home(),
    )
    .context("Could not determine home directory")?;
    log::debug!("Using config dir: {}", dir.display());
    Ok(dir)
}

/// Pick the config directory from an explicit override, an XDG base, or a
/// platform config home, in that order. Empty values count as unset.
fn resolve_config_dir(
    override_dir: Option<&str>,
    xdg_config_home: Option<&str>,
    platform_home: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(dir) = override_dir.filter(|d| !d.is_empty()) {
        return Some(expand(dir));
    }
    if let Some(xdg) = xdg_config_home.filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(xdg).join(APP_DIR));
    }
    platform_home.map(|home| home.join(APP_DIR))
}

#[cfg(windows)]
fn platform_config_home() -> Option<PathBuf> {
    dirs::config_dir()
}

#[cfg(not(windows))]
fn platform_config_home() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config"))
}

/// Default config file path
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
