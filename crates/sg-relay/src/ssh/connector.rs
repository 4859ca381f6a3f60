//! Outbound SSH connector
//!
//! Opens the authenticated SSH connection to a provisioned host and starts
//! the login shell inside a PTY.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Config, Handle};
use russh::Disconnect;
use russh_keys::key::{KeyPair, PublicKey};

use sg_core::config::{Credential, HostKeyPolicy, SshConfig};
use sg_core::error::RemoteError;
use sg_core::{TargetHost, TerminalSpec};

use super::host_key::verify_host_key;
use super::process::SshProcess;
use crate::remote::{RemoteConnection, RemoteProcess, RemoteShell, ServiceAccount};

/// russh-backed implementation of [`RemoteShell`]
pub struct SshShell {
    /// Command started inside the PTY
    login_command: String,
    /// Bound on connect, handshake and authentication
    connect_timeout: Duration,
    /// Service key loaded once, with the credential it came from
    service_key: Option<(Credential, Arc<KeyPair>)>,
}

impl SshShell {
    /// Create a connector from the SSH section of the configuration
    pub fn new(config: &SshConfig) -> Self {
        Self {
            login_command: config.login_command.clone(),
            connect_timeout: config.connect_timeout,
            service_key: None,
        }
    }

    /// Load the private key named by `credential` now and reuse it for
    /// every connection made with that credential
    pub fn preload_key(&mut self, credential: &Credential) -> Result<(), RemoteError> {
        let key = load_private_key(credential)?;
        self.service_key = Some((credential.clone(), Arc::new(key)));
        Ok(())
    }

    /// Key for `credential`, read from disk off the runtime when not preloaded
    async fn key_for(&self, credential: &Credential) -> Result<Arc<KeyPair>, RemoteError> {
        if let Some((loaded_from, key)) = &self.service_key {
            if loaded_from == credential {
                return Ok(Arc::clone(key));
            }
        }

        let credential = credential.clone();
        let path = credential.key_path().unwrap_or_default();
        tokio::task::spawn_blocking(move || load_private_key(&credential))
            .await
            .map_err(|e| RemoteError::Credential {
                path,
                message: e.to_string(),
            })?
            .map(Arc::new)
    }

    async fn connect_inner(
        &self,
        target: &TargetHost,
        account: &ServiceAccount,
        policy: &HostKeyPolicy,
    ) -> Result<SshConnection, RemoteError> {
        // A shell may sit idle for hours; the session has no idle timeout
        let ssh_config = Arc::new(Config {
            inactivity_timeout: None,
            ..Default::default()
        });

        let rejection = Arc::new(Mutex::new(None));
        let handler = ClientHandler {
            target: target.clone(),
            policy: policy.clone(),
            rejection: Arc::clone(&rejection),
        };

        tracing::debug!("Connecting to {}", target);
        let mut handle = client::connect(ssh_config, (target.host(), target.port()), handler)
            .await
            .map_err(|e| {
                let reason = rejection.lock().ok().and_then(|mut slot| slot.take());
                match reason {
                    Some(message) => RemoteError::HostKeyRejected { message },
                    None => RemoteError::ConnectionFailed {
                        host: target.to_string(),
                        message: e.to_string(),
                    },
                }
            })?;

        tracing::debug!("Authenticating as user '{}'", account.username);
        let authenticated = match &account.credential {
            Credential::PrivateKey { .. } => {
                let key = self.key_for(&account.credential).await?;
                handle
                    .authenticate_publickey(account.username.clone(), key)
                    .await
            }
            Credential::Password { password } => {
                handle
                    .authenticate_password(account.username.clone(), password.clone())
                    .await
            }
        }
        .map_err(|e| RemoteError::ConnectionFailed {
            host: target.to_string(),
            message: format!("Authentication error: {}", e),
        })?;

        if !authenticated {
            if let Err(e) = handle
                .disconnect(Disconnect::ByApplication, "authentication rejected", "en")
                .await
            {
                tracing::debug!("Ignoring disconnect error: {}", e);
            }
            return Err(RemoteError::AuthenticationRejected {
                user: account.username.clone(),
            });
        }

        Ok(SshConnection {
            handle,
            target: target.clone(),
            login_command: self.login_command.clone(),
        })
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn connect(
        &self,
        target: &TargetHost,
        account: &ServiceAccount,
        policy: &HostKeyPolicy,
    ) -> Result<Box<dyn RemoteConnection>, RemoteError> {
        let connection = tokio::time::timeout(
            self.connect_timeout,
            self.connect_inner(target, account, policy),
        )
        .await
        .map_err(|_| RemoteError::Timeout {
            host: target.to_string(),
        })??;

        tracing::info!("Authenticated to {} as '{}'", target, account.username);
        Ok(Box::new(connection))
    }
}

/// Load the service account's private key
pub fn load_private_key(credential: &Credential) -> Result<KeyPair, RemoteError> {
    let (path, passphrase) = match credential {
        Credential::PrivateKey { passphrase, .. } => (
            credential.key_path().unwrap_or_default(),
            passphrase.as_deref(),
        ),
        Credential::Password { .. } => {
            return Err(RemoteError::Credential {
                path: Default::default(),
                message: "password credentials carry no key".to_string(),
            })
        }
    };

    if !path.exists() {
        return Err(RemoteError::Credential {
            path,
            message: "file does not exist".to_string(),
        });
    }

    russh_keys::load_secret_key(&path, passphrase).map_err(|e| RemoteError::Credential {
        path: path.clone(),
        message: e.to_string(),
    })
}

/// An authenticated SSH connection to one target
pub struct SshConnection {
    handle: Handle<ClientHandler>,
    target: TargetHost,
    login_command: String,
}

#[async_trait]
impl RemoteConnection for SshConnection {
    async fn create_shell_process(
        &self,
        terminal: &TerminalSpec,
    ) -> Result<Arc<dyn RemoteProcess>, RemoteError> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| RemoteError::ShellProcess(format!("Failed to open channel: {}", e)))?;

        channel
            .request_pty(
                false,
                &terminal.term_type,
                terminal.columns,
                terminal.rows,
                0,
                0,
                &[],
            )
            .await
            .map_err(|e| RemoteError::ShellProcess(format!("PTY request failed: {}", e)))?;

        channel
            .exec(false, self.login_command.as_str())
            .await
            .map_err(|e| RemoteError::ShellProcess(format!("Failed to start shell: {}", e)))?;

        tracing::debug!(
            "Started '{}' in a {}x{} {} PTY",
            self.login_command,
            terminal.columns,
            terminal.rows,
            terminal.term_type
        );
        Ok(Arc::new(SshProcess::spawn(channel)))
    }

    async fn close(&self) -> Result<(), RemoteError> {
        self.handle
            .disconnect(Disconnect::ByApplication, "session closed", "en")
            .await
            .map_err(|e| RemoteError::ConnectionFailed {
                host: self.target.to_string(),
                message: format!("Disconnect failed: {}", e),
            })
    }
}

/// SSH client handler applying the configured host key policy
struct ClientHandler {
    target: TargetHost,
    policy: HostKeyPolicy,
    /// Why the host key was refused, read back when `connect` fails
    rejection: Arc<Mutex<Option<String>>>,
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        match verify_host_key(&self.policy, &self.target, server_public_key) {
            Ok(()) => Ok(true),
            Err(message) => {
                tracing::error!("Rejecting host key: {}", message);
                if let Ok(mut slot) = self.rejection.lock() {
                    *slot = Some(message);
                }
                Ok(false)
            }
        }
    }
}
