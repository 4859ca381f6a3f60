//! Relay error types

use thiserror::Error;

use sg_core::error::{ChannelError, RemoteError};

/// Errors returned by [`crate::open_session`]
#[derive(Error, Debug)]
pub enum RelayError {
    /// The remote connection or the shell process could not be created
    #[error("Connect failed: {0}")]
    Connect(#[source] RemoteError),

    /// The client channel failed before streaming began
    #[error("Client channel failed: {0}")]
    Channel(#[from] ChannelError),
}
