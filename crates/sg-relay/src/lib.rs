//! sg-relay: Remote-shell relay for shellgate
//!
//! Accepts a browser terminal over a WebSocket, opens an SSH shell on a
//! freshly provisioned host and pumps keystrokes and output between the
//! two until either side goes away or the user types `exit`/`logout`.

pub mod channel;
pub mod error;
pub mod remote;
pub mod server;
pub mod session;
pub mod ssh;
pub mod transport;

pub use channel::{ClientChannel, Inbound};
pub use error::RelayError;
pub use remote::{RemoteConnection, RemoteProcess, RemoteShell, ServiceAccount};
pub use session::{open_session, RelaySettings, Session, SessionEnd};
