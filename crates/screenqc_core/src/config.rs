//! Connection settings.
//!
//! # Responsibility
//! - Carry the credentials and endpoint for one server connection.
//! - Load settings from a JSON file and validate them before any connect
//!   attempt happens.
//!
//! # Invariants
//! - Validation rejects blank credentials; the gateway never sees them.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 4064;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration failure detected before connecting.
#[derive(Debug)]
pub enum ConfigError {
    MissingUsername,
    MissingPassword,
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingUsername => write!(f, "cannot connect: no username"),
            Self::MissingPassword => write!(f, "cannot connect: no password"),
            Self::Io(err) => write!(f, "cannot read config file: {err}"),
            Self::Parse(err) => write!(f, "cannot parse config file: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Credentials and endpoint for one server connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub username: String,
    pub password: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl ConnectionConfig {
    /// Config for the default host and port.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            host: default_host(),
            port: DEFAULT_PORT,
        }
    }

    /// Loads and validates a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects blank credentials.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.username.trim().is_empty() {
            return Err(ConfigError::MissingUsername);
        }
        if self.password.trim().is_empty() {
            return Err(ConfigError::MissingPassword);
        }
        Ok(())
    }

    /// `user@host:port`, for log lines; never includes the password.
    pub fn endpoint(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ConnectionConfig, DEFAULT_PORT};
    use std::io::Write;

    #[test]
    fn new_uses_default_endpoint() {
        let config = ConnectionConfig::new("importer", "secret");
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.endpoint(), "importer@localhost:4064");
    }

    #[test]
    fn validate_rejects_blank_credentials() {
        let err = ConnectionConfig::new(" ", "secret").validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingUsername));

        let err = ConnectionConfig::new("importer", "").validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingPassword));
    }

    #[test]
    fn from_json_file_applies_endpoint_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"username": "importer", "password": "secret"}}"#).unwrap();

        let config = ConnectionConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.username, "importer");
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn from_json_file_rejects_missing_credentials() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"username": "importer", "password": ""}}"#).unwrap();

        let err = ConnectionConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingPassword));
    }
}
