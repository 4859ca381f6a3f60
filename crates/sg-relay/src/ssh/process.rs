//! Shell process running on an SSH channel
//!
//! The russh channel is owned by one driver task. Output it receives is
//! queued for [`SshProcess::read`]; stdin writes and termination reach it
//! as commands, each write acknowledged once the bytes are on the wire.

use async_trait::async_trait;
use bytes::Bytes;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use tokio::sync::{mpsc, oneshot, Mutex};

use sg_core::error::RemoteError;

use crate::remote::RemoteProcess;

/// Output chunks buffered between the driver and the upstream pump.
///
/// The driver stops pulling from the SSH channel while this is full, which
/// pushes back on the remote side through the SSH window.
const OUTPUT_QUEUE_CAPACITY: usize = 256;

/// Commands from the relay to the driver task
enum Command {
    Write {
        data: Vec<u8>,
        ack: oneshot::Sender<Result<(), RemoteError>>,
    },
    Terminate,
}

/// Receiving end of the output queue
struct OutputState {
    rx: mpsc::Receiver<Bytes>,
    /// Tail of a chunk larger than the caller's read size
    pending: Bytes,
}

impl OutputState {
    fn new(rx: mpsc::Receiver<Bytes>) -> Self {
        Self {
            rx,
            pending: Bytes::new(),
        }
    }

    /// Next `max` bytes at most, waiting for the driver when nothing is
    /// buffered. Fails with `Closed` once the driver has stopped.
    async fn read(&mut self, max: usize) -> Result<Bytes, RemoteError> {
        if self.pending.is_empty() {
            match self.rx.recv().await {
                Some(chunk) => self.pending = chunk,
                None => return Err(RemoteError::Closed),
            }
        }

        let take = max.min(self.pending.len());
        Ok(self.pending.split_to(take))
    }
}

/// Handle to a shell started with a PTY on an SSH channel
pub struct SshProcess {
    commands: mpsc::Sender<Command>,
    output: Mutex<OutputState>,
}

impl SshProcess {
    /// Take ownership of `channel` and start its driver task
    pub(crate) fn spawn(channel: Channel<Msg>) -> Self {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (output_tx, output_rx) = mpsc::channel(OUTPUT_QUEUE_CAPACITY);

        tokio::spawn(drive(channel, command_rx, output_tx));

        Self {
            commands: command_tx,
            output: Mutex::new(OutputState::new(output_rx)),
        }
    }
}

#[async_trait]
impl RemoteProcess for SshProcess {
    async fn read(&self, max: usize) -> Result<Bytes, RemoteError> {
        self.output.lock().await.read(max).await
    }

    async fn write_stdin(&self, data: &[u8]) -> Result<(), RemoteError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.commands
            .send(Command::Write {
                data: data.to_vec(),
                ack: ack_tx,
            })
            .await
            .map_err(|_| RemoteError::Closed)?;

        ack_rx.await.map_err(|_| RemoteError::Closed)?
    }

    async fn terminate(&self) -> Result<(), RemoteError> {
        self.commands
            .send(Command::Terminate)
            .await
            .map_err(|_| RemoteError::Closed)
    }
}

/// Pump between the SSH channel and the process handle until either ends
async fn drive(
    mut channel: Channel<Msg>,
    mut commands: mpsc::Receiver<Command>,
    output: mpsc::Sender<Bytes>,
) {
    loop {
        tokio::select! {
            msg = channel.wait() => match msg {
                // With a PTY, stderr is merged by the remote side; extended
                // data is forwarded the same way for shells that still use it.
                Some(ChannelMsg::Data { ref data }) | Some(ChannelMsg::ExtendedData { ref data, .. }) => {
                    if output.send(Bytes::copy_from_slice(data)).await.is_err() {
                        break;
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    tracing::debug!("Remote shell exited with status {}", exit_status);
                }
                Some(ChannelMsg::Eof) => {
                    tracing::debug!("Remote shell sent EOF");
                }
                Some(ChannelMsg::Close) | None => {
                    tracing::debug!("Remote channel closed");
                    break;
                }
                Some(other) => {
                    tracing::trace!("Ignoring channel message: {:?}", other);
                }
            },

            command = commands.recv() => match command {
                Some(Command::Write { data, ack }) => {
                    let result = channel
                        .data(&data[..])
                        .await
                        .map_err(|e| RemoteError::Write(e.to_string()));
                    let _ = ack.send(result);
                }
                Some(Command::Terminate) | None => {
                    let _ = channel.eof().await;
                    let _ = channel.close().await;
                    break;
                }
            },
        }
    }
    // Dropping `output` makes the next read fail with `RemoteError::Closed`
}
