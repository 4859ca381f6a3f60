//! The two byte pumps of a session

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use sg_core::config::PumpConfig;
use sg_core::SessionId;

use super::sentinel::{is_exit_sentinel, EXIT_LINE};
use super::utf8::Utf8Carry;
use super::SessionEnd;
use crate::channel::{ClientChannel, Inbound};
use crate::remote::RemoteProcess;

/// Remote output -> client.
///
/// Returns `None` when cancelled, otherwise the failure that ended it.
pub(super) async fn upstream(
    id: SessionId,
    process: Arc<dyn RemoteProcess>,
    client: Arc<dyn ClientChannel>,
    config: PumpConfig,
    cancel: CancellationToken,
) -> Option<SessionEnd> {
    let mut decoder = Utf8Carry::default();

    loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            read = process.read(config.read_chunk_size) => read,
        };

        let chunk = match read {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(session = %id.short(), "Remote output ended: {}", e);
                let tail = decoder.finish();
                if !tail.is_empty() {
                    if let Err(send_err) = client.send(&tail).await {
                        tracing::debug!(session = %id.short(), "Could not flush output tail: {}", send_err);
                    }
                }
                return Some(SessionEnd::RemoteFailed(e));
            }
        };

        if chunk.is_empty() {
            // Nothing buffered yet; the shell may simply be idle
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(config.empty_read_backoff) => continue,
            }
        }

        let text = decoder.decode(&chunk);
        if text.is_empty() {
            continue;
        }

        tracing::trace!(session = %id.short(), "Relaying {} bytes upstream", chunk.len());
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            sent = client.send(&text) => {
                if let Err(e) = sent {
                    tracing::debug!(session = %id.short(), "Client send failed: {}", e);
                    return Some(SessionEnd::ClientFailed(e));
                }
            }
        }
    }
}

/// Client -> remote stdin. Runs until the session has a reason to end.
pub(super) async fn downstream(
    id: SessionId,
    process: &dyn RemoteProcess,
    client: &dyn ClientChannel,
) -> SessionEnd {
    loop {
        let message = match client.receive().await {
            Ok(Inbound::Text(message)) => message,
            Ok(Inbound::Disconnected) => return SessionEnd::ClientDisconnected,
            Err(e) => return SessionEnd::ClientFailed(e),
        };

        if is_exit_sentinel(&message) {
            tracing::debug!(session = %id.short(), "Exit requested by client");
            return match process.write_stdin(EXIT_LINE).await {
                Ok(()) => SessionEnd::ClosedByUser,
                Err(e) => SessionEnd::RemoteFailed(e),
            };
        }

        if let Err(e) = process.write_stdin(message.as_bytes()).await {
            return SessionEnd::RemoteFailed(e);
        }
    }
}
