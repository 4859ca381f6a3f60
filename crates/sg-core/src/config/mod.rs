//! Configuration management for shellgate

mod pump;
pub mod serde_utils;
mod ssh;

pub use pump::PumpConfig;
pub use ssh::{Credential, HostKeyPolicy, SshConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::types::TerminalSpec;

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shellgate")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    tracing::debug!("Loaded config from {:?}", path);
    Ok(config)
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}

/// Full configuration of the relay service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP/WebSocket listener binds to
    pub bind_address: String,

    /// Outbound SSH settings
    pub ssh: SshConfig,

    /// PTY requested for every shell
    pub terminal: TerminalSpec,

    /// Pump tuning
    pub relay: PumpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8002".to_string(),
            ssh: SshConfig::default(),
            terminal: TerminalSpec::default(),
            relay: PumpConfig::default(),
        }
    }
}

impl Config {
    /// Reject values the relay cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ssh.username.trim().is_empty() {
            return Err(ConfigError::Invalid("ssh.username must not be empty".into()));
        }
        if self.ssh.port == 0 {
            return Err(ConfigError::Invalid("ssh.port must not be 0".into()));
        }
        if self.ssh.login_command.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "ssh.login_command must not be empty".into(),
            ));
        }
        if let HostKeyPolicy::Pinned { fingerprint } = &self.ssh.host_key_policy {
            if fingerprint.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "pinned host key policy needs a fingerprint".into(),
                ));
            }
        }
        if self.terminal.columns == 0 || self.terminal.rows == 0 {
            return Err(ConfigError::Invalid(
                "terminal dimensions must be non-zero".into(),
            ));
        }
        if self.terminal.term_type.trim().is_empty() {
            return Err(ConfigError::Invalid("terminal.term_type must not be empty".into()));
        }
        if self.relay.read_chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "relay.read_chunk_size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
bind_address = "0.0.0.0:9000"

[ssh]
username = "ec2-user"
credential = { type = "private-key", path = "/keys/svc.pem" }
host_key_policy = { mode = "pinned", fingerprint = "SHA256:abc" }

[relay]
empty_read_backoff = 10
"#,
        )
        .unwrap();

        let config: Config = load_config(&path).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:9000");
        assert_eq!(config.ssh.username, "ec2-user");
        assert_eq!(config.ssh.port, 22);
        assert_eq!(
            config.ssh.host_key_policy,
            HostKeyPolicy::Pinned {
                fingerprint: "SHA256:abc".into()
            }
        );
        assert_eq!(config.terminal, TerminalSpec::default());
        assert_eq!(config.relay.read_chunk_size, 4096);
        assert_eq!(config.relay.empty_read_backoff, Duration::from_millis(10));
        config.validate().unwrap();
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config::<Config>(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.terminal.columns = 200;
        save_config(&path, &config).unwrap();

        let loaded: Config = load_config(&path).unwrap();
        assert_eq!(loaded.terminal.columns, 200);
        assert_eq!(loaded.ssh.host_key_policy, HostKeyPolicy::TrustAlways);
    }

    #[test]
    fn test_validate_rejects_unusable_values() {
        let mut config = Config::default();
        config.relay.read_chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.terminal.rows = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ssh.username = "  ".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ssh.host_key_policy = HostKeyPolicy::Pinned {
            fingerprint: String::new(),
        };
        assert!(config.validate().is_err());
    }
}
