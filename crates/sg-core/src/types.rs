//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;

/// Identifier for one relay session, used for log correlation only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    /// Generate a fresh session ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Short form used in log lines
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address of the freshly provisioned host a session connects to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetHost {
    host: String,
    port: u16,
}

impl TargetHost {
    /// Create a target from an already validated host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host`, `host:port`, `[v6]`, `[v6]:port` or a bare IPv6 address.
    ///
    /// `default_port` applies when the input carries no port.
    pub fn parse(input: &str, default_port: u16) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidTarget {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty address"));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(invalid("address contains whitespace"));
        }

        let parse_port = |s: &str| -> Result<u16, ConfigError> {
            match s.parse::<u16>() {
                Ok(0) | Err(_) => Err(invalid("port must be a number between 1 and 65535")),
                Ok(port) => Ok(port),
            }
        };

        if let Some(rest) = trimmed.strip_prefix('[') {
            let (host, after) = rest
                .split_once(']')
                .ok_or_else(|| invalid("unterminated '[' in IPv6 address"))?;
            if host.is_empty() {
                return Err(invalid("empty address"));
            }
            let port = match after {
                "" => default_port,
                _ => {
                    let port = after
                        .strip_prefix(':')
                        .ok_or_else(|| invalid("unexpected text after ']'"))?;
                    parse_port(port)?
                }
            };
            return Ok(Self::new(host, port));
        }

        match trimmed.matches(':').count() {
            0 => Ok(Self::new(trimmed, default_port)),
            1 => {
                let (host, port) = trimmed.split_once(':').unwrap_or((trimmed, ""));
                if host.is_empty() {
                    return Err(invalid("empty address"));
                }
                Ok(Self::new(host, parse_port(port)?))
            }
            // Bare IPv6 without brackets cannot carry a port
            _ => Ok(Self::new(trimmed, default_port)),
        }
    }

    /// Host name or IP address
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port of the SSH daemon
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for TargetHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Pseudo-terminal requested for the remote shell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalSpec {
    /// Value of TERM on the remote side
    pub term_type: String,
    /// Width in character cells
    pub columns: u32,
    /// Height in character cells
    pub rows: u32,
}

impl Default for TerminalSpec {
    fn default() -> Self {
        Self {
            term_type: "xterm-256color".to_string(),
            columns: 120,
            rows: 40,
        }
    }
}
