//! Remote shell boundary
//!
//! The relay only needs three capabilities from the remote side: connect
//! to a host, start one PTY-backed shell on that connection, and move bytes
//! in and out of that shell. The SSH backend in [`crate::ssh`] implements
//! them with russh; tests implement them in memory.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use sg_core::config::{Credential, HostKeyPolicy};
use sg_core::error::RemoteError;
use sg_core::{TargetHost, TerminalSpec};

/// Fixed account every session logs in as
#[derive(Debug, Clone)]
pub struct ServiceAccount {
    /// Remote user name
    pub username: String,
    /// Secret proving the account
    pub credential: Credential,
}

/// Capability to open remote connections
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Connect and authenticate to `target`
    async fn connect(
        &self,
        target: &TargetHost,
        account: &ServiceAccount,
        policy: &HostKeyPolicy,
    ) -> Result<Box<dyn RemoteConnection>, RemoteError>;
}

/// An authenticated connection to one host
#[async_trait]
pub trait RemoteConnection: Send + Sync {
    /// Start the interactive shell inside a PTY of the given size and type
    async fn create_shell_process(
        &self,
        terminal: &TerminalSpec,
    ) -> Result<Arc<dyn RemoteProcess>, RemoteError>;

    /// Drop the connection
    async fn close(&self) -> Result<(), RemoteError>;
}

/// A running remote shell with combined stdout/stderr
#[async_trait]
pub trait RemoteProcess: Send + Sync {
    /// Read at most `max` bytes of output.
    ///
    /// An empty result means "no data yet", not end-of-stream. The stream
    /// ends only with an error.
    async fn read(&self, max: usize) -> Result<Bytes, RemoteError>;

    /// Write raw bytes to the shell's stdin
    async fn write_stdin(&self, data: &[u8]) -> Result<(), RemoteError>;

    /// Stop the shell
    async fn terminate(&self) -> Result<(), RemoteError>;
}
