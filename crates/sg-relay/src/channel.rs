//! Browser-facing duplex channel

use async_trait::async_trait;

use sg_core::error::ChannelError;

/// One event read from the client channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text message typed or pasted in the browser terminal
    Text(String),
    /// The peer closed the transport
    Disconnected,
}

/// Duplex text channel already accepted by the surrounding service.
///
/// Methods take `&self` so one handle can be shared by the upstream and
/// downstream pumps; implementations serialize access per direction.
#[async_trait]
pub trait ClientChannel: Send + Sync {
    /// Wait for the next message or a disconnect
    async fn receive(&self) -> Result<Inbound, ChannelError>;

    /// Send one text frame
    async fn send(&self, text: &str) -> Result<(), ChannelError>;

    /// Close the transport. Closing a closed channel may return an error.
    async fn close(&self) -> Result<(), ChannelError>;
}
