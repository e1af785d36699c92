//! Command line options and persisted user preferences.

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use shared::DEFAULT_PORT;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// How the peer takes part in a game when it starts up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Play alone without any networking
    Solo,
    /// Listen for up to three other players
    Host,
    /// Connect to a host
    Join,
}

#[derive(Parser, Debug)]
#[clap(author, version, about)]
pub struct Args {
    /// Role to start in
    #[clap(short, long, value_enum, default_value = "solo")]
    pub mode: Mode,
    /// Host address to join; falls back to the last address used
    #[clap(short, long)]
    pub address: Option<String>,
    /// Interface to listen on when hosting
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    pub bind: String,
    /// Port to listen on or connect to
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Preferences file
    #[clap(short, long, default_value = "asteroids-settings.json")]
    pub settings: PathBuf,
    /// Seed for asteroid generation
    #[clap(long)]
    pub seed: Option<u64>,
}

/// Network and simulation options for one [`crate::network::Node`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub bind: String,
    pub port: u16,
    pub seed: Option<u64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            seed: None,
        }
    }
}

impl From<&Args> for NodeConfig {
    fn from(args: &Args) -> Self {
        Self {
            bind: args.bind.clone(),
            port: args.port,
            seed: args.seed,
        }
    }
}

impl NodeConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Appends the configured port to `address` unless it already names one.
    pub fn dial_addr(&self, address: &str) -> String {
        if address.contains(':') {
            address.to_string()
        } else {
            format!("{}:{}", address, self.port)
        }
    }
}

#[derive(Debug)]
pub enum SettingsError {
    Io(io::Error),
    Format(serde_json::Error),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "settings file error: {e}"),
            Self::Format(e) => write!(f, "settings format error: {e}"),
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Format(e) => Some(e),
        }
    }
}

impl From<io::Error> for SettingsError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(e: serde_json::Error) -> Self {
        Self::Format(e)
    }
}

/// User preferences kept between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sound_enabled: bool,
    pub music_enabled: bool,
    /// Last host address successfully typed in for joining
    pub last_address: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            music_enabled: false,
            last_address: None,
        }
    }
}

impl Settings {
    /// Reads preferences from `path`. A missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("asteroids-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn test_missing_settings_file_gives_defaults() {
        let path = scratch_file("missing");
        let _ = fs::remove_file(&path);

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.sound_enabled);
        assert!(!settings.music_enabled);
    }

    #[test]
    fn test_settings_survive_save_and_load() {
        let path = scratch_file("saved");
        let settings = Settings {
            sound_enabled: false,
            music_enabled: true,
            last_address: Some("192.168.1.20".to_string()),
        };

        settings.save(&path).unwrap();
        let loaded = Settings::load(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_settings_fill_in_defaults() {
        let path = scratch_file("partial");
        fs::write(&path, r#"{ "music_enabled": true }"#).unwrap();

        let loaded = Settings::load(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert!(loaded.sound_enabled);
        assert!(loaded.music_enabled);
        assert_eq!(loaded.last_address, None);
    }

    #[test]
    fn test_corrupt_settings_are_an_error() {
        let path = scratch_file("corrupt");
        fs::write(&path, "not json").unwrap();

        let result = Settings::load(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(SettingsError::Format(_))));
    }

    #[test]
    fn test_dial_addr_adds_default_port() {
        let config = NodeConfig::default();
        assert_eq!(config.dial_addr("10.0.0.5"), "10.0.0.5:50001");
        assert_eq!(config.dial_addr("10.0.0.5:6000"), "10.0.0.5:6000");
        assert_eq!(config.listen_addr(), "0.0.0.0:50001");
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["peer", "--mode", "join", "-a", "10.1.1.1", "--seed", "9"]);
        assert_eq!(args.mode, Mode::Join);
        assert_eq!(args.address.as_deref(), Some("10.1.1.1"));
        assert_eq!(args.port, DEFAULT_PORT);

        let config = NodeConfig::from(&args);
        assert_eq!(config.seed, Some(9));
    }
}
