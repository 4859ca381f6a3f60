//! Relay sessions
//!
//! A [`Session`] binds one client channel to one remote shell. It is created
//! by [`open_session`] once the shell is running and consumed by
//! [`Session::run`], which pumps both directions until one of them ends and
//! then tears everything down.
//!
//! # Lifecycle
//!
//! ```text
//! open_session ──► connect ──► create_shell_process ──► "Connected to <host>"
//!      │ (failure)                                            │
//!      ▼                                                      ▼
//! "[ERROR] ..." + close                      run: upstream ∥ downstream
//!                                                             │ first to end
//!                                                             ▼
//!                                  cancel + join upstream, trailing notice, close
//! ```

mod notice;
mod pump;
mod sentinel;
mod utf8;

pub use sentinel::is_exit_sentinel;
pub use utf8::Utf8Carry;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use sg_core::config::{Config, HostKeyPolicy, PumpConfig};
use sg_core::error::{ChannelError, RemoteError};
use sg_core::time::{current_time_millis, elapsed_since};
use sg_core::{SessionId, TargetHost, TerminalSpec};

use crate::channel::ClientChannel;
use crate::error::RelayError;
use crate::remote::{RemoteConnection, RemoteProcess, RemoteShell, ServiceAccount};

/// Static settings applied to every session
#[derive(Debug, Clone, Default)]
pub struct RelaySettings {
    /// Host key acceptance policy for new connections
    pub host_key_policy: HostKeyPolicy,
    /// PTY requested for the shell
    pub terminal: TerminalSpec,
    /// Pump tuning
    pub pump: PumpConfig,
}

impl RelaySettings {
    /// Extract the session settings from the service configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            host_key_policy: config.ssh.host_key_policy.clone(),
            terminal: config.terminal.clone(),
            pump: config.relay.clone(),
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client sent `exit` or `logout`
    ClosedByUser,
    /// The client closed the transport
    ClientDisconnected,
    /// Receiving from or sending to the client failed
    ClientFailed(ChannelError),
    /// Reading remote output or writing remote stdin failed
    RemoteFailed(RemoteError),
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::ClosedByUser => write!(f, "closed by user"),
            SessionEnd::ClientDisconnected => write!(f, "client disconnected"),
            SessionEnd::ClientFailed(e) => write!(f, "client failed: {}", e),
            SessionEnd::RemoteFailed(e) => write!(f, "remote failed: {}", e),
        }
    }
}

/// A running relay between one client channel and one remote shell
pub struct Session {
    id: SessionId,
    target: TargetHost,
    created_at: u64,
    client: Arc<dyn ClientChannel>,
    connection: Box<dyn RemoteConnection>,
    process: Arc<dyn RemoteProcess>,
    pump: PumpConfig,
    closed: AtomicBool,
}

/// Connect to `target`, start the shell and announce the session.
///
/// On failure the client receives exactly one error line and the channel
/// is closed; no session exists afterwards.
pub async fn open_session(
    client: Arc<dyn ClientChannel>,
    target: TargetHost,
    account: &ServiceAccount,
    shell: &dyn RemoteShell,
    settings: &RelaySettings,
) -> Result<Session, RelayError> {
    let id = SessionId::new();
    tracing::info!(
        session = %id.short(),
        "Opening shell on {} as '{}' (host key policy: {})",
        target,
        account.username,
        settings.host_key_policy
    );

    let connection = match shell
        .connect(&target, account, &settings.host_key_policy)
        .await
    {
        Ok(connection) => connection,
        Err(e) => return Err(reject(id, client.as_ref(), e).await),
    };

    let process = match connection.create_shell_process(&settings.terminal).await {
        Ok(process) => process,
        Err(e) => {
            if let Err(close_err) = connection.close().await {
                tracing::debug!(session = %id.short(), "Ignoring close error: {}", close_err);
            }
            return Err(reject(id, client.as_ref(), e).await);
        }
    };

    let session = Session {
        id,
        created_at: current_time_millis(),
        client,
        connection,
        process,
        pump: settings.pump.clone(),
        closed: AtomicBool::new(false),
        target,
    };

    if let Err(e) = session
        .client
        .send(&notice::connected(session.target.host()))
        .await
    {
        tracing::warn!(session = %id.short(), "Client went away before streaming: {}", e);
        session.close().await;
        return Err(RelayError::Channel(e));
    }

    tracing::info!(session = %id.short(), "Shell ready on {}", session.target);
    Ok(session)
}

/// Report a connect failure to the client and close the channel
async fn reject(id: SessionId, client: &dyn ClientChannel, err: RemoteError) -> RelayError {
    tracing::warn!(session = %id.short(), "Connect failed: {}", err);
    if let Err(e) = client.send(&notice::error(&err)).await {
        tracing::debug!(session = %id.short(), "Could not deliver error notice: {}", e);
    }
    if let Err(e) = client.close().await {
        tracing::debug!(session = %id.short(), "Ignoring close error: {}", e);
    }
    RelayError::Connect(err)
}

impl Session {
    /// Session identifier
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Host this session is connected to
    pub fn target(&self) -> &TargetHost {
        &self.target
    }

    /// Creation time in milliseconds since the Unix epoch
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Whether teardown has started
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Pump both directions until the session ends, then tear down.
    pub async fn run(self) -> SessionEnd {
        let cancel = CancellationToken::new();
        let mut upstream = tokio::spawn(pump::upstream(
            self.id,
            Arc::clone(&self.process),
            Arc::clone(&self.client),
            self.pump.clone(),
            cancel.clone(),
        ));

        let mut upstream_joined = false;
        let end = tokio::select! {
            end = pump::downstream(self.id, self.process.as_ref(), self.client.as_ref()) => end,
            joined = &mut upstream => {
                upstream_joined = true;
                match joined {
                    Ok(Some(end)) => end,
                    // The token is only cancelled below, so `None` cannot happen here
                    Ok(None) => SessionEnd::RemoteFailed(RemoteError::Closed),
                    Err(e) => SessionEnd::RemoteFailed(RemoteError::Read(e.to_string())),
                }
            }
        };

        cancel.cancel();
        if !upstream_joined {
            if let Err(e) = upstream.await {
                tracing::debug!(session = %self.id.short(), "Upstream task ended abnormally: {}", e);
            }
        }

        // Upstream is stopped, so the trailing notice is the last frame
        let trailing = match &end {
            SessionEnd::ClosedByUser => Some(notice::CLOSED_BY_USER.to_string()),
            SessionEnd::RemoteFailed(e) => Some(notice::error(e)),
            SessionEnd::ClientDisconnected | SessionEnd::ClientFailed(_) => None,
        };
        if let Some(line) = trailing {
            if let Err(e) = self.client.send(&line).await {
                tracing::debug!(session = %self.id.short(), "Could not deliver final notice: {}", e);
            }
        }

        self.close().await;

        match &end {
            SessionEnd::ClosedByUser | SessionEnd::ClientDisconnected => tracing::info!(
                session = %self.id.short(),
                "Session on {} ended ({}) after {:?}",
                self.target,
                end,
                elapsed_since(self.created_at)
            ),
            SessionEnd::ClientFailed(_) | SessionEnd::RemoteFailed(_) => tracing::warn!(
                session = %self.id.short(),
                "Session on {} ended ({}) after {:?}",
                self.target,
                end,
                elapsed_since(self.created_at)
            ),
        }
        end
    }

    /// Release the shell, the connection and the client channel.
    ///
    /// Safe to call any number of times; errors from handles that are
    /// already closed are swallowed.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Err(e) = self.process.terminate().await {
            tracing::debug!(session = %self.id.short(), "Ignoring terminate error: {}", e);
        }
        if let Err(e) = self.connection.close().await {
            tracing::debug!(session = %self.id.short(), "Ignoring disconnect error: {}", e);
        }
        if let Err(e) = self.client.close().await {
            tracing::debug!(session = %self.id.short(), "Ignoring channel close error: {}", e);
        }
    }
}
