//! SSH backend for the remote shell boundary

mod connector;
mod host_key;
mod process;

pub use connector::{load_private_key, SshConnection, SshShell};
pub use host_key::verify_host_key;
pub use process::SshProcess;
