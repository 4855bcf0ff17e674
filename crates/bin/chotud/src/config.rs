//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `chotu.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Board link settings.
    pub board: BoardConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Link fault policy.
    pub safety: SafetyConfig,
    /// Canned samples of the virtual board.
    pub virtual_board: VirtualBoardConfig,
}

/// Which board adapter to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardKind {
    #[default]
    Firmata,
    Virtual,
}

impl FromStr for BoardKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firmata" => Ok(Self::Firmata),
            "virtual" => Ok(Self::Virtual),
            other => Err(ConfigError::Validation(format!(
                "unknown board kind `{other}`"
            ))),
        }
    }
}

/// What to do when the board link faults after startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkFaultPolicy {
    /// Exit with a non-zero status.
    #[default]
    Terminate,
    /// Keep serving; every command answers "device not ready".
    Degrade,
}

impl FromStr for LinkFaultPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "terminate" => Ok(Self::Terminate),
            "degrade" => Ok(Self::Degrade),
            other => Err(ConfigError::Validation(format!(
                "unknown link fault policy `{other}`"
            ))),
        }
    }
}

/// Board link configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub kind: BoardKind,
    /// Serial port path (e.g. `/dev/ttyACM0`, `COM3`).
    pub address: String,
    pub baud_rate: u32,
    /// Seconds to wait for the board to answer the version query.
    pub handshake_timeout_secs: u64,
}

impl BoardConfig {
    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub on_link_fault: LinkFaultPolicy,
}

/// Raw 10-bit samples reported by the virtual board.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VirtualBoardConfig {
    pub temperature_raw: u16,
    pub distance_raw: u16,
}

impl Config {
    /// Load configuration from `chotu.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, an
    /// override cannot be parsed, or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("chotu.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = lookup("CHOTU_BOARD_KIND") {
            self.board.kind = val.parse()?;
        }
        if let Some(val) = lookup("CHOTU_BOARD_ADDRESS") {
            self.board.address = val;
        }
        if let Some(val) = lookup("CHOTU_BAUD_RATE") {
            self.board.baud_rate = val.trim().parse().map_err(|_| {
                ConfigError::Validation(format!("CHOTU_BAUD_RATE `{val}` is not a number"))
            })?;
        }
        if let Some(val) = lookup("CHOTU_ON_LINK_FAULT") {
            self.safety.on_link_fault = val.parse()?;
        }
        if let Some(val) = lookup("CHOTU_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = lookup("RUST_LOG") {
            self.logging.filter = val;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.board.address.trim().is_empty() {
            return Err(ConfigError::Validation(
                "board address must not be empty".to_string(),
            ));
        }
        if self.board.baud_rate == 0 {
            return Err(ConfigError::Validation(
                "baud rate must be non-zero".to_string(),
            ));
        }
        if self.board.handshake_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "handshake timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            kind: BoardKind::default(),
            address: "/dev/ttyACM0".to_string(),
            baud_rate: 57_600,
            handshake_timeout_secs: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "chotud=info,chotu=info".to_string(),
        }
    }
}

impl Default for VirtualBoardConfig {
    fn default() -> Self {
        Self {
            temperature_raw: 512,
            distance_raw: 120,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.board.kind, BoardKind::Firmata);
        assert_eq!(config.board.address, "/dev/ttyACM0");
        assert_eq!(config.board.baud_rate, 57_600);
        assert_eq!(config.board.handshake_timeout(), Duration::from_secs(10));
        assert_eq!(config.safety.on_link_fault, LinkFaultPolicy::Terminate);
        assert_eq!(config.virtual_board.temperature_raw, 512);
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.board.baud_rate, 57_600);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [board]
            kind = 'virtual'
            address = 'COM3'
            baud_rate = 115200
            handshake_timeout_secs = 3

            [logging]
            filter = 'debug'

            [safety]
            on_link_fault = 'degrade'

            [virtual_board]
            temperature_raw = 300
            distance_raw = 42
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.board.kind, BoardKind::Virtual);
        assert_eq!(config.board.address, "COM3");
        assert_eq!(config.board.baud_rate, 115_200);
        assert_eq!(config.board.handshake_timeout_secs, 3);
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.safety.on_link_fault, LinkFaultPolicy::Degrade);
        assert_eq!(config.virtual_board.distance_raw, 42);
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [board]
            address = '/dev/ttyUSB0'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.board.address, "/dev/ttyUSB0");
        assert_eq!(config.board.kind, BoardKind::Firmata);
        assert_eq!(config.logging.filter, "chotud=info,chotu=info");
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.board.address, "/dev/ttyACM0");
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }

    #[test]
    fn should_apply_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(env(&[
                ("CHOTU_BOARD_KIND", "Virtual"),
                ("CHOTU_BOARD_ADDRESS", "/dev/ttyUSB1"),
                ("CHOTU_BAUD_RATE", "9600"),
                ("CHOTU_ON_LINK_FAULT", "degrade"),
                ("CHOTU_LOG", "chotu=debug"),
            ]))
            .unwrap();

        assert_eq!(config.board.kind, BoardKind::Virtual);
        assert_eq!(config.board.address, "/dev/ttyUSB1");
        assert_eq!(config.board.baud_rate, 9600);
        assert_eq!(config.safety.on_link_fault, LinkFaultPolicy::Degrade);
        assert_eq!(config.logging.filter, "chotu=debug");
    }

    #[test]
    fn should_prefer_rust_log_over_chotu_log() {
        let mut config = Config::default();
        config
            .apply_overrides(env(&[("CHOTU_LOG", "warn"), ("RUST_LOG", "trace")]))
            .unwrap();
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_reject_unparseable_overrides() {
        let mut config = Config::default();
        assert!(
            config
                .apply_overrides(env(&[("CHOTU_BAUD_RATE", "fast")]))
                .is_err()
        );
        assert!(
            config
                .apply_overrides(env(&[("CHOTU_BOARD_KIND", "raspberry")]))
                .is_err()
        );
    }

    #[test]
    fn should_reject_empty_address() {
        let mut config = Config::default();
        config.board.address = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_baud_rate_and_timeout() {
        let mut config = Config::default();
        config.board.baud_rate = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.board.handshake_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_accept_defaults() {
        assert!(Config::default().validate().is_ok());
    }
}
