//! Generic configuration I/O utilities
//!
//! Provides YAML configuration loading and saving for any serializable
//! configuration type.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load configuration from a YAML file, falling back to defaults
///
/// A missing file is not an error. A file that can't be read or parsed is
/// logged and ignored.
///
/// ```ignore
/// let config: DeckhandConfig = load_config(Path::new("config.yaml"));
/// ```
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    match read_config(path) {
        Ok(Some(config)) => {
            log::info!("Loaded config from {:?}", path);
            config
        }
        Ok(None) => {
            log::info!("No config at {:?}, using defaults", path);
            T::default()
        }
        Err(e) => {
            log::warn!("{:#}, using defaults", e);
            T::default()
        }
    }
}

/// Read and parse a YAML config, `None` if the file doesn't exist
pub fn read_config<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    serde_yaml::from_str(&contents)
        .map(Some)
        .with_context(|| format!("Failed to parse config file {:?}", path))
}

/// Save configuration to a YAML file
///
/// Creates parent directories if they don't exist.
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file {:?}", path))?;

    log::info!("Saved config to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeckhandConfig;

    #[test]
    fn test_load_nonexistent_returns_default() {
        let config: DeckhandConfig = load_config(Path::new("/nonexistent/path/config.yaml"));
        assert_eq!(config, DeckhandConfig::default());
    }

    #[test]
    fn test_invalid_yaml_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "deck_count: [1, 2").unwrap();

        let config: DeckhandConfig = load_config(&path);
        assert_eq!(config, DeckhandConfig::default());
    }

    #[test]
    fn test_read_config_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "deck_count: many\n").unwrap();

        let err = read_config::<DeckhandConfig>(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
        assert!(read_config::<DeckhandConfig>(&dir.path().join("absent.yaml"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_roundtrip_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let config = DeckhandConfig {
            deck_count: 2,
            beat_window_ms: 30.0,
            ..Default::default()
        };

        save_config(&config, &path).unwrap();
        let loaded: DeckhandConfig = load_config(&path);

        assert_eq!(loaded, config);
    }
}
