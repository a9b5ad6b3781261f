//! # Configuration Management
//!
//! Typed configuration for the relay: the hosting side, one entry per realm,
//! and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides (`REALMGATE_*`) via `from_env()`
//!
//! ## Realm Entries
//! Up to [`MAX_REALMS`] realms are honoured; entries past that are reported by
//! `validate()` and ignored by [`HostConfig::enabled_realms`].

use crate::error::{ProtocolError, Result};
use crate::protocol::realm::opcode::DEFAULT_REALM_PORT;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Maximum number of realm entries scanned.
pub const MAX_REALMS: usize = 32;

/// Default client token sent in `SID_AUTH_CHECK`.
pub const DEFAULT_CLIENT_TOKEN: u32 = 0x07CB_01DC;

/// Default port the game listener binds.
pub const DEFAULT_HOST_PORT: u16 = 6113;

/// Longest chat command any realm accepts.
pub const MAX_CHAT_COMMAND_LEN: usize = 255;

/// Placeholder CD key used when none is configured.
const PLACEHOLDER_KEY: &str = "FFFFFFFFFFFFFFFFFFFFFFFFFF";

/// Top-level configuration for one relay process.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    /// Authenticate as the expansion (two CD keys) rather than the base game
    pub tft: bool,

    /// Address the game listener binds
    pub bind_address: String,

    /// Port announced to realms and bound by the game listener
    pub host_port: u16,

    /// Cadence of the session tick
    #[serde(with = "duration_serde")]
    pub tick_interval: Duration,

    /// Realm entries, in `[[realms]]` tables
    pub realms: Vec<RealmConfig>,

    pub logging: LoggingConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tft: true,
            bind_address: String::from("0.0.0.0"),
            host_port: DEFAULT_HOST_PORT,
            tick_interval: Duration::from_millis(50),
            realms: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl HostConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults plus environment overrides.
    ///
    /// `REALMGATE_SERVER`, `REALMGATE_USERNAME`, `REALMGATE_PASSWORD` and the
    /// key variables describe a single realm; when `REALMGATE_SERVER` is set a
    /// realm entry is created for it.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("REALMGATE_HOST_PORT") {
            config.host_port = port.parse::<u16>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid REALMGATE_HOST_PORT: {e}"))
            })?;
        }

        if let Ok(tick) = std::env::var("REALMGATE_TICK_INTERVAL_MS") {
            if let Ok(val) = tick.parse::<u64>() {
                config.tick_interval = Duration::from_millis(val);
            }
        }

        if let Ok(tft) = std::env::var("REALMGATE_TFT") {
            config.tft = matches!(tft.as_str(), "1" | "true" | "yes");
        }

        if let Ok(server) = std::env::var("REALMGATE_SERVER") {
            let mut realm = RealmConfig {
                server: server.clone(),
                alias: server,
                ..RealmConfig::default()
            };
            if let Ok(username) = std::env::var("REALMGATE_USERNAME") {
                realm.username = username;
            }
            if let Ok(password) = std::env::var("REALMGATE_PASSWORD") {
                realm.password = password;
            }
            if let Ok(key) = std::env::var("REALMGATE_KEY_ROC") {
                realm.key_roc = key;
            }
            if let Ok(key) = std::env::var("REALMGATE_KEY_TFT") {
                realm.key_tft = key;
            }
            config.realms.push(realm);
        }

        if let Ok(level) = std::env::var("REALMGATE_LOG_LEVEL") {
            config.logging.log_level = level.parse::<Level>().map_err(|_| {
                ProtocolError::ConfigError(format!("Invalid REALMGATE_LOG_LEVEL: {level}"))
            })?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        let example = Self::default_with_overrides(|c| {
            c.realms.push(RealmConfig {
                server: String::from("server.eurobattle.net"),
                alias: String::from("eurobattle"),
                username: String::from("relaybot"),
                password_hash_type: PasswordHashType::Pvpgn,
                ..RealmConfig::default()
            });
        });
        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Enabled realm entries within the [`MAX_REALMS`] cap, with their index.
    pub fn enabled_realms(&self) -> impl Iterator<Item = (usize, &RealmConfig)> {
        self.realms
            .iter()
            .take(MAX_REALMS)
            .enumerate()
            .filter(|(_, realm)| realm.enabled)
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.host_port == 0 {
            errors.push("Host port must be greater than 0".to_string());
        }

        if self.bind_address.parse::<std::net::IpAddr>().is_err() {
            errors.push(format!(
                "Invalid bind address: '{}' (expected an IP address such as '0.0.0.0')",
                self.bind_address
            ));
        }

        if self.tick_interval.as_millis() < 1 {
            errors.push("Tick interval too short (minimum: 1ms)".to_string());
        } else if self.tick_interval > Duration::from_secs(1) {
            errors.push("Tick interval too long (maximum: 1s)".to_string());
        }

        if self.realms.len() > MAX_REALMS {
            errors.push(format!(
                "Too many realm entries: {} (only the first {MAX_REALMS} are used)",
                self.realms.len()
            ));
        }

        for (i, realm) in self.realms.iter().enumerate() {
            errors.extend(
                realm
                    .validate(self.tft)
                    .into_iter()
                    .map(|e| format!("realm {i} ({}): {e}", realm.alias)),
            );
        }

        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// How the logon proof is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordHashType {
    /// SRP exchange, official servers
    #[default]
    Battlenet,
    /// Plain password hash, PvPGN servers
    Pvpgn,
}

/// One realm connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RealmConfig {
    pub enabled: bool,

    /// Realm server host name or address
    pub server: String,

    pub port: u16,

    /// Short name used in logs and events
    pub alias: String,

    pub username: String,
    pub password: String,

    pub key_roc: String,
    pub key_tft: String,

    /// Prefix marking chat messages as commands
    pub command_trigger: char,

    pub war3_version: u32,

    /// Overrides the version read from the executable
    pub exe_version: Option<u32>,

    /// Overrides the revision-check result
    pub exe_version_hash: Option<u32>,

    pub password_hash_type: PasswordHashType,
    pub pvpgn_realm_name: String,

    /// Chat length limit applied on PvPGN servers
    pub max_message_length: usize,

    pub locale_id: u32,
    pub country_abbrev: String,
    pub country: String,

    /// Locale string, reversed on the wire
    pub language: String,

    pub war3_exe: PathBuf,
    pub storm_dll: PathBuf,
    pub game_dll: PathBuf,

    pub first_channel: String,

    pub root_admin: Option<String>,
    pub admins: Vec<String>,

    /// Name reported as the CD-key owner
    pub key_owner: String,

    /// Minutes offset from UTC reported to the server
    pub timezone_bias: u32,

    pub client_token: u32,
}

impl Default for RealmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server: String::new(),
            port: DEFAULT_REALM_PORT,
            alias: String::new(),
            username: String::new(),
            password: String::new(),
            key_roc: PLACEHOLDER_KEY.to_string(),
            key_tft: PLACEHOLDER_KEY.to_string(),
            command_trigger: '!',
            war3_version: 26,
            exe_version: None,
            exe_version_hash: None,
            password_hash_type: PasswordHashType::Battlenet,
            pvpgn_realm_name: String::from("PvPGN Realm"),
            max_message_length: 200,
            locale_id: 1033,
            country_abbrev: String::from("USA"),
            country: String::from("United States"),
            language: String::from("enUS"),
            war3_exe: PathBuf::from("war3.exe"),
            storm_dll: PathBuf::from("Storm.dll"),
            game_dll: PathBuf::from("game.dll"),
            first_channel: String::from("The Void"),
            root_admin: None,
            admins: Vec::new(),
            key_owner: String::from("realmgate"),
            timezone_bias: 0,
            client_token: DEFAULT_CLIENT_TOKEN,
        }
    }
}

impl RealmConfig {
    /// Effective chat length limit for this realm.
    pub fn chat_limit(&self) -> usize {
        match self.password_hash_type {
            PasswordHashType::Pvpgn => self.max_message_length.min(MAX_CHAT_COMMAND_LEN),
            PasswordHashType::Battlenet => MAX_CHAT_COMMAND_LEN,
        }
    }

    /// Validate realm configuration
    pub fn validate(&self, tft: bool) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.enabled {
            return errors;
        }

        if self.server.is_empty() {
            errors.push("Server cannot be empty".to_string());
        }

        if self.port == 0 {
            errors.push("Port must be greater than 0".to_string());
        }

        if self.username.is_empty() {
            errors.push("Username cannot be empty".to_string());
        }

        if self.password.is_empty() {
            errors.push("Password cannot be empty".to_string());
        }

        if !matches!(self.key_roc.len(), 26 | 16) {
            errors.push(format!(
                "ROC CD key has {} characters (expected 26)",
                self.key_roc.len()
            ));
        }

        if tft && !matches!(self.key_tft.len(), 26 | 16) {
            errors.push(format!(
                "TFT CD key has {} characters (expected 26)",
                self.key_tft.len()
            ));
        }

        if self.language.len() != 4 {
            errors.push(format!(
                "Language must be a four character locale such as 'enUS', got '{}'",
                self.language
            ));
        }

        if self.command_trigger.is_whitespace() {
            errors.push("Command trigger cannot be whitespace".to_string());
        }

        if self.password_hash_type == PasswordHashType::Pvpgn && self.max_message_length == 0 {
            errors.push("Max message length must be greater than 0".to_string());
        }

        if let Some(root) = &self.root_admin {
            if root.is_empty() {
                errors.push("Root admin cannot be an empty name".to_string());
            }
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level, overridden by `RUST_LOG` when set
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,

    /// Whether to include the module path in each line
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("realmgate"),
            log_level: Level::INFO,
            json_format: false,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
