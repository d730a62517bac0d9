//! User settings, resolved once at startup and passed to whoever needs them.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const APP_DIR: &str = "eternax";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Pre-filled save location of the "Add to Queue" form
    pub downloads_dir: PathBuf,

    /// yt-dlp executable, looked up on PATH unless absolute
    pub ytdlp_path: PathBuf,

    /// List of finished downloads; reserved, nothing reads it yet
    pub cache_path: PathBuf,

    /// Undelivered progress events allowed before workers wait
    pub event_buffer: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let downloads_dir = dirs::download_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
            .unwrap_or_else(|| PathBuf::from("./downloads"));
        let cache_path = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("downloaded.json");
        let ytdlp_path = if cfg!(target_os = "windows") { "yt-dlp.exe" } else { "yt-dlp" };

        Self {
            downloads_dir,
            ytdlp_path: PathBuf::from(ytdlp_path),
            cache_path,
            event_buffer: 256,
        }
    }
}

/// Get the configuration directory path
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Get the configuration file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Load the settings file, writing the defaults first if there is none.
pub fn load_or_create_default() -> Result<Settings, ConfigError> {
    let path = config_path();
    if path.exists() {
        load_from(&path)
    } else {
        let settings = Settings::default();
        save_to(&settings, &path)?;
        Ok(settings)
    }
}

pub fn load_from(path: &Path) -> Result<Settings, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

pub fn save_to(settings: &Settings, path: &Path) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let content = toml::to_string_pretty(settings)?;
    fs::write(path, content).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let settings = Settings {
            downloads_dir: PathBuf::from("/srv/media"),
            ytdlp_path: PathBuf::from("/opt/yt-dlp"),
            cache_path: PathBuf::from("/tmp/cache.json"),
            event_buffer: 8,
        };
        save_to(&settings, &path).unwrap();
        assert_eq!(load_from(&path).unwrap(), settings);
    }

    #[test]
    fn missing_keys_take_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "downloads_dir = \"/data\"\n").unwrap();
        let settings = load_from(&path).unwrap();
        assert_eq!(settings.downloads_dir, PathBuf::from("/data"));
        assert_eq!(settings.event_buffer, Settings::default().event_buffer);
    }

    #[test]
    fn broken_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "event_buffer = \"lots\"").unwrap();
        assert!(matches!(load_from(&path), Err(ConfigError::Parse(_))));
        assert!(matches!(
            load_from(&dir.path().join("absent.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
