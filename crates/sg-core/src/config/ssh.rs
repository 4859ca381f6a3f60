//! Remote shell (SSH) configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::serde_utils::duration_secs;

/// How the relay decides whether to trust a target's host key.
///
/// Targets are hosts the provisioning pipeline has just created, so no
/// known-hosts entry exists for them yet. `TrustAlways` accepts any key and
/// is the default; the other modes exist for long-lived targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum HostKeyPolicy {
    /// Accept any host key (trust-on-first-use without persistence)
    #[default]
    TrustAlways,
    /// Accept only the key with this SHA256 fingerprint
    Pinned { fingerprint: String },
    /// Accept only keys listed for the host in an OpenSSH known_hosts file
    KnownHosts { path: PathBuf },
}

impl fmt::Display for HostKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostKeyPolicy::TrustAlways => write!(f, "trust-always"),
            HostKeyPolicy::Pinned { fingerprint } => write!(f, "pinned({})", fingerprint),
            HostKeyPolicy::KnownHosts { path } => write!(f, "known-hosts({})", path.display()),
        }
    }
}

/// Credential of the fixed service account
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Credential {
    /// OpenSSH or PEM private key on disk
    PrivateKey {
        path: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        passphrase: Option<String>,
    },
    /// Plain password authentication
    Password { password: String },
}

impl Credential {
    /// Key file path with a leading `~/` expanded to the home directory
    pub fn key_path(&self) -> Option<PathBuf> {
        match self {
            Credential::PrivateKey { path, .. } => Some(expand_home(path)),
            Credential::Password { .. } => None,
        }
    }
}

// Secrets never reach the logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::PrivateKey { path, passphrase } => f
                .debug_struct("PrivateKey")
                .field("path", path)
                .field("passphrase", &passphrase.as_ref().map(|_| "<redacted>"))
                .finish(),
            Credential::Password { .. } => f
                .debug_struct("Password")
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

impl Default for Credential {
    fn default() -> Self {
        Credential::PrivateKey {
            path: super::default_config_dir().join("service_key.pem"),
            passphrase: None,
        }
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().unwrap_or_default().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Configuration of the outbound SSH connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Service account every session logs in as
    pub username: String,

    /// Port used when the target carries none
    pub port: u16,

    /// Command run inside the PTY
    pub login_command: String,

    /// Credential for the service account
    pub credential: Credential,

    /// Host key acceptance policy
    pub host_key_policy: HostKeyPolicy,

    /// Bound on TCP connect plus SSH handshake and authentication
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            username: "ubuntu".to_string(),
            port: 22,
            login_command: "bash --login".to_string(),
            credential: Credential::default(),
            host_key_policy: HostKeyPolicy::default(),
            connect_timeout: Duration::from_secs(30),
        }
    }
}
