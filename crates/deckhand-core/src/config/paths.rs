//! Path utilities for Deckhand configuration files

use std::path::PathBuf;

/// Get the default configuration directory
///
/// Returns: `<platform config dir>/deckhand`, e.g. `~/.config/deckhand`
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("deckhand")
}

/// Get the default config file path
///
/// Returns: `<config dir>/deckhand/config.yaml`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}
