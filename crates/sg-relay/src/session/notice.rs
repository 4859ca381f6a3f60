//! Informational lines the relay writes outside raw passthrough
//!
//! Each line ends with CRLF so it renders correctly in a raw-mode terminal.

use std::fmt::Display;

/// Sent after the user typed `exit` or `logout`
pub const CLOSED_BY_USER: &str = "\r\n[INFO] Session closed by user.\r\n";

/// Sent once the shell is running, before any output
pub fn connected(host: &str) -> String {
    format!("Connected to {}\r\n", host)
}

/// Sent once on a hard failure, before the channel closes
pub fn error(err: &impl Display) -> String {
    format!("[ERROR] {}\r\n", err)
}
