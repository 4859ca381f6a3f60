//! Core error types for shellgate

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the shellgate crates
#[derive(Error, Debug)]
pub enum SgError {
    /// Client channel error
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Remote shell error
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the browser-facing duplex channel
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The channel was already closed
    #[error("Channel closed")]
    Closed,

    /// Sending a frame failed
    #[error("Send failed: {0}")]
    Send(String),

    /// Receiving a frame failed
    #[error("Receive failed: {0}")]
    Receive(String),
}

/// Errors raised by the remote shell boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// TCP connect or SSH handshake failed
    #[error("Connection to {host} failed: {message}")]
    ConnectionFailed { host: String, message: String },

    /// The handshake did not finish in time
    #[error("Connection to {host} timed out")]
    Timeout { host: String },

    /// The server rejected the service account credential
    #[error("Authentication rejected for user '{user}'")]
    AuthenticationRejected { user: String },

    /// The host key did not satisfy the configured policy
    #[error("Host key verification failed: {message}")]
    HostKeyRejected { message: String },

    /// The credential could not be loaded
    #[error("Credential at {} could not be loaded: {message}", path.display())]
    Credential { path: PathBuf, message: String },

    /// Opening the channel, PTY or shell failed
    #[error("Shell process could not be started: {0}")]
    ShellProcess(String),

    /// Reading the combined output stream failed
    #[error("Remote read failed: {0}")]
    Read(String),

    /// Writing to the remote stdin failed
    #[error("Remote write failed: {0}")]
    Write(String),

    /// The remote process or connection is gone
    #[error("Remote shell closed")]
    Closed,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Target host string could not be parsed
    #[error("Invalid target host '{input}': {reason}")]
    InvalidTarget { input: String, reason: String },

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
