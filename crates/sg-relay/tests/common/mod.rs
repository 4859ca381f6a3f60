//! In-memory client channel and remote shell for relay tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;

use sg_core::config::{Credential, HostKeyPolicy, PumpConfig};
use sg_core::error::{ChannelError, RemoteError};
use sg_core::{TargetHost, TerminalSpec};
use sg_relay::{
    ClientChannel, Inbound, RelaySettings, RemoteConnection, RemoteProcess, RemoteShell,
    ServiceAccount,
};

/// How long tests wait for an expected event
pub const WAIT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Client side
// ---------------------------------------------------------------------------

/// Client channel driven by a [`ClientHandle`]
pub struct MockChannel {
    inbound: Mutex<mpsc::UnboundedReceiver<Inbound>>,
    sent_tx: mpsc::UnboundedSender<String>,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    late_sends: AtomicUsize,
    fail_sends: AtomicBool,
}

/// Test-side end of a [`MockChannel`]
pub struct ClientHandle {
    pub channel: Arc<MockChannel>,
    inbound_tx: Option<mpsc::UnboundedSender<Inbound>>,
    sent_rx: mpsc::UnboundedReceiver<String>,
}

pub fn mock_channel() -> ClientHandle {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (sent_tx, sent_rx) = mpsc::unbounded_channel();
    let channel = Arc::new(MockChannel {
        inbound: Mutex::new(inbound_rx),
        sent_tx,
        closed: AtomicBool::new(false),
        close_calls: AtomicUsize::new(0),
        late_sends: AtomicUsize::new(0),
        fail_sends: AtomicBool::new(false),
    });
    ClientHandle {
        channel,
        inbound_tx: Some(inbound_tx),
        sent_rx,
    }
}

impl ClientHandle {
    /// The channel as the relay sees it
    pub fn as_client(&self) -> Arc<dyn ClientChannel> {
        Arc::clone(&self.channel) as Arc<dyn ClientChannel>
    }

    /// Type a message in the browser terminal
    pub fn type_text(&self, text: &str) {
        if let Some(tx) = &self.inbound_tx {
            tx.send(Inbound::Text(text.to_string())).unwrap();
        }
    }

    /// Close the browser side
    pub fn disconnect(&mut self) {
        if let Some(tx) = self.inbound_tx.take() {
            let _ = tx.send(Inbound::Disconnected);
        }
    }

    /// Next frame the relay sent, failing the test after [`WAIT`]
    pub async fn next_frame(&mut self) -> String {
        timeout(WAIT, self.sent_rx.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("channel dropped")
    }

    /// Frames already sent, without waiting
    pub fn drain_frames(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.sent_rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    pub fn close_calls(&self) -> usize {
        self.channel.close_calls.load(Ordering::SeqCst)
    }

    pub fn late_sends(&self) -> usize {
        self.channel.late_sends.load(Ordering::SeqCst)
    }

    pub fn fail_sends(&self) {
        self.channel.fail_sends.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClientChannel for MockChannel {
    async fn receive(&self) -> Result<Inbound, ChannelError> {
        let mut inbound = self.inbound.lock().await;
        Ok(inbound.recv().await.unwrap_or(Inbound::Disconnected))
    }

    async fn send(&self, text: &str) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::SeqCst) {
            self.late_sends.fetch_add(1, Ordering::SeqCst);
            return Err(ChannelError::Closed);
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ChannelError::Send("broken pipe".to_string()));
        }
        let _ = self.sent_tx.send(text.to_string());
        Ok(())
    }

    async fn close(&self) -> Result<(), ChannelError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Remote side
// ---------------------------------------------------------------------------

/// One scripted result of [`RemoteProcess::read`]
pub enum ReadStep {
    Data(Bytes),
    Empty,
    Fail(String),
}

/// Remote shell process scripted by a [`RemoteHandle`]
pub struct MockProcess {
    output: Mutex<mpsc::UnboundedReceiver<ReadStep>>,
    stdin_tx: mpsc::UnboundedSender<Vec<u8>>,
    terminate_calls: AtomicUsize,
    fail_writes: AtomicBool,
    fail_terminate: bool,
}

/// Test-side end of a [`MockProcess`]
pub struct RemoteHandle {
    pub process: Arc<MockProcess>,
    output_tx: mpsc::UnboundedSender<ReadStep>,
    stdin_rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl RemoteHandle {
    /// Emit output from the remote shell
    pub fn emit(&self, data: &str) {
        self.output_tx
            .send(ReadStep::Data(Bytes::copy_from_slice(data.as_bytes())))
            .unwrap();
    }

    /// Emit raw output bytes, not necessarily valid UTF-8
    pub fn emit_bytes(&self, data: &[u8]) {
        self.output_tx
            .send(ReadStep::Data(Bytes::copy_from_slice(data)))
            .unwrap();
    }

    /// Make the next read return no data
    pub fn emit_empty(&self) {
        self.output_tx.send(ReadStep::Empty).unwrap();
    }

    /// Make the next read fail
    pub fn fail_read(&self, message: &str) {
        self.output_tx
            .send(ReadStep::Fail(message.to_string()))
            .unwrap();
    }

    /// Next write that reached the remote stdin
    pub async fn next_write(&mut self) -> Vec<u8> {
        timeout(WAIT, self.stdin_rx.recv())
            .await
            .expect("timed out waiting for stdin")
            .expect("process dropped")
    }

    /// Writes already made, without waiting
    pub fn drain_writes(&mut self) -> Vec<Vec<u8>> {
        let mut writes = Vec::new();
        while let Ok(write) = self.stdin_rx.try_recv() {
            writes.push(write);
        }
        writes
    }

    pub fn terminate_calls(&self) -> usize {
        self.process.terminate_calls.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self) {
        self.process.fail_writes.store(true, Ordering::SeqCst);
    }
}

fn mock_process(fail_terminate: bool) -> RemoteHandle {
    let (output_tx, output_rx) = mpsc::unbounded_channel();
    let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
    let process = Arc::new(MockProcess {
        output: Mutex::new(output_rx),
        stdin_tx,
        terminate_calls: AtomicUsize::new(0),
        fail_writes: AtomicBool::new(false),
        fail_terminate,
    });
    RemoteHandle {
        process,
        output_tx,
        stdin_rx,
    }
}

#[async_trait]
impl RemoteProcess for MockProcess {
    async fn read(&self, max: usize) -> Result<Bytes, RemoteError> {
        let mut output = self.output.lock().await;
        match output.recv().await {
            Some(ReadStep::Data(mut data)) => {
                // Scripted chunks are expected to fit the read size
                data.truncate(max);
                Ok(data)
            }
            Some(ReadStep::Empty) => Ok(Bytes::new()),
            Some(ReadStep::Fail(message)) => Err(RemoteError::Read(message)),
            // An idle shell: nothing more will ever arrive
            None => std::future::pending().await,
        }
    }

    async fn write_stdin(&self, data: &[u8]) -> Result<(), RemoteError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::Write("channel reset".to_string()));
        }
        self.stdin_tx
            .send(data.to_vec())
            .map_err(|_| RemoteError::Closed)
    }

    async fn terminate(&self) -> Result<(), RemoteError> {
        self.terminate_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_terminate {
            return Err(RemoteError::Closed);
        }
        Ok(())
    }
}

/// Per-host behavior of a [`MockShell`]
struct HostEntry {
    process: Option<Arc<MockProcess>>,
    connection_closes: Arc<AtomicUsize>,
    fail_close: bool,
}

/// Remote shell that knows a fixed set of hosts
#[derive(Default)]
pub struct MockShell {
    hosts: StdMutex<HashMap<String, HostEntry>>,
    terminals: Arc<StdMutex<Vec<TerminalSpec>>>,
}

/// Counters for one registered host
pub struct HostStats {
    connection_closes: Arc<AtomicUsize>,
}

impl HostStats {
    pub fn connection_closes(&self) -> usize {
        self.connection_closes.load(Ordering::SeqCst)
    }
}

impl MockShell {
    /// Register a host whose shell starts normally
    pub fn add_host(&self, host: &str) -> (RemoteHandle, HostStats) {
        self.add_host_with(host, false, false)
    }

    /// Register a host whose shell starts but whose handles fail to close
    pub fn add_host_with_failing_teardown(&self, host: &str) -> (RemoteHandle, HostStats) {
        self.add_host_with(host, true, true)
    }

    fn add_host_with(
        &self,
        host: &str,
        fail_terminate: bool,
        fail_close: bool,
    ) -> (RemoteHandle, HostStats) {
        let handle = mock_process(fail_terminate);
        let closes = Arc::new(AtomicUsize::new(0));
        self.hosts.lock().unwrap().insert(
            host.to_string(),
            HostEntry {
                process: Some(Arc::clone(&handle.process)),
                connection_closes: Arc::clone(&closes),
                fail_close,
            },
        );
        (
            handle,
            HostStats {
                connection_closes: closes,
            },
        )
    }

    /// Register a host that accepts the connection but cannot start a shell
    pub fn add_host_without_shell(&self, host: &str) -> HostStats {
        let closes = Arc::new(AtomicUsize::new(0));
        self.hosts.lock().unwrap().insert(
            host.to_string(),
            HostEntry {
                process: None,
                connection_closes: Arc::clone(&closes),
                fail_close: false,
            },
        );
        HostStats {
            connection_closes: closes,
        }
    }

    /// Terminal specs requested so far
    pub fn terminals(&self) -> Vec<TerminalSpec> {
        self.terminals.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteShell for MockShell {
    async fn connect(
        &self,
        target: &TargetHost,
        _account: &ServiceAccount,
        _policy: &HostKeyPolicy,
    ) -> Result<Box<dyn RemoteConnection>, RemoteError> {
        let hosts = self.hosts.lock().unwrap();
        let entry = hosts
            .get(target.host())
            .ok_or_else(|| RemoteError::ConnectionFailed {
                host: target.to_string(),
                message: "No route to host".to_string(),
            })?;

        Ok(Box::new(MockConnection {
            process: entry.process.clone(),
            closes: Arc::clone(&entry.connection_closes),
            fail_close: entry.fail_close,
            terminals: Arc::clone(&self.terminals),
        }))
    }
}

struct MockConnection {
    process: Option<Arc<MockProcess>>,
    closes: Arc<AtomicUsize>,
    fail_close: bool,
    terminals: Arc<StdMutex<Vec<TerminalSpec>>>,
}

#[async_trait]
impl RemoteConnection for MockConnection {
    async fn create_shell_process(
        &self,
        terminal: &TerminalSpec,
    ) -> Result<Arc<dyn RemoteProcess>, RemoteError> {
        self.terminals.lock().unwrap().push(terminal.clone());
        match &self.process {
            Some(process) => Ok(Arc::clone(process) as Arc<dyn RemoteProcess>),
            None => Err(RemoteError::ShellProcess(
                "PTY request refused".to_string(),
            )),
        }
    }

    async fn close(&self) -> Result<(), RemoteError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(RemoteError::Closed);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn account() -> ServiceAccount {
    ServiceAccount {
        username: "ubuntu".to_string(),
        credential: Credential::Password {
            password: "unused".to_string(),
        },
    }
}

/// Default settings with a short empty-read backoff
pub fn settings() -> RelaySettings {
    RelaySettings {
        pump: PumpConfig {
            read_chunk_size: 4096,
            empty_read_backoff: Duration::from_millis(5),
        },
        ..Default::default()
    }
}

pub fn target(host: &str) -> TargetHost {
    TargetHost::new(host, 22)
}
