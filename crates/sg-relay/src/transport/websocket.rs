//! axum WebSocket adapter for [`ClientChannel`]

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;

use sg_core::error::ChannelError;

use crate::channel::{ClientChannel, Inbound};

/// An accepted browser WebSocket, split so both pumps can use it at once
pub struct WebSocketChannel {
    sink: Mutex<SplitSink<WebSocket, Message>>,
    stream: Mutex<SplitStream<WebSocket>>,
    closed: AtomicBool,
}

impl WebSocketChannel {
    /// Wrap an upgraded socket
    pub fn new(socket: WebSocket) -> Self {
        let (sink, stream) = socket.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed: AtomicBool::new(false),
        }
    }
}

/// Map a WebSocket message to a channel event; control frames yield `None`
fn inbound_from(message: Message) -> Option<Inbound> {
    match message {
        Message::Text(text) => Some(Inbound::Text(text)),
        // xterm.js sends text, but some clients send keystrokes as binary
        Message::Binary(data) => Some(Inbound::Text(String::from_utf8_lossy(&data).into_owned())),
        Message::Ping(_) | Message::Pong(_) => None,
        Message::Close(_) => Some(Inbound::Disconnected),
    }
}

#[async_trait]
impl ClientChannel for WebSocketChannel {
    async fn receive(&self) -> Result<Inbound, ChannelError> {
        let mut stream = self.stream.lock().await;
        loop {
            let message = match stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(ChannelError::Receive(e.to_string())),
                None => return Ok(Inbound::Disconnected),
            };
            if let Some(inbound) = inbound_from(message) {
                return Ok(inbound);
            }
        }
    }

    async fn send(&self, text: &str) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        self.sink
            .lock()
            .await
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| ChannelError::Send(e.to_string()))
    }

    async fn close(&self) -> Result<(), ChannelError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        let mut sink = self.sink.lock().await;
        // The peer may already be gone; the close frame is best-effort
        let _ = sink.send(Message::Close(None)).await;
        sink.close()
            .await
            .map_err(|e| ChannelError::Send(e.to_string()))
    }
}
