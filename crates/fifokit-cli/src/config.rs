//! CLI configuration file
//!
//! Channel defaults live in a TOML file:
//!
//! ```toml
//! [channel]
//! name = "cli"
//! idle_interval_ms = 100
//! read_chunk_size = 8192
//! ```
//!
//! The file is looked up at `--config`, then `$FIFOKIT_CONFIG`, then
//! `<config dir>/fifokit/config.toml`. A missing default file is not an error.

use fifokit::ChannelConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Defaults applied to every channel the CLI opens
    pub channel: ChannelConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::named("fifokit-cli"),
        }
    }
}

/// Default location of the configuration file
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fifokit").join("config.toml"))
}

/// Load settings from `explicit`, or from the default location if present.
pub fn load(explicit: Option<&Path>) -> Result<Settings, Box<dyn std::error::Error>> {
    match explicit {
        Some(path) => parse_file(path),
        None => match default_path() {
            Some(path) if path.is_file() => parse_file(&path),
            _ => Ok(Settings::default()),
        },
    }
}

fn parse_file(path: &Path) -> Result<Settings, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("cannot read config {}: {}", path.display(), e))?;
    let settings: Settings =
        toml::from_str(&text).map_err(|e| format!("invalid config {}: {}", path.display(), e))?;
    settings.channel.validate()?;
    tracing::debug!(path = %path.display(), "loaded configuration");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fifokit::Mode;
    use std::time::Duration;

    #[test]
    fn test_parse_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[channel]\nname = \"bridge\"\nidle_interval_ms = 100\n",
        )
        .unwrap();

        let settings = load(Some(path.as_path())).unwrap();
        assert_eq!(settings.channel.name, "bridge");
        assert_eq!(settings.channel.idle_interval, Duration::from_millis(100));
        assert_eq!(settings.channel.mode, Mode::NonBlocking);
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[channel]\nread_chunk_size = 0\n").unwrap();
        assert!(load(Some(path.as_path())).is_err());

        fs::write(&path, "[channel\n").unwrap();
        assert!(load(Some(path.as_path())).is_err());
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(Some(dir.path().join("nope.toml").as_path())).is_err());
    }
}
