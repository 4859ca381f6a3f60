//! sg-core: Core types and configuration for shellgate
//!
//! This crate provides the configuration structures, error types and
//! small value types shared by the relay library and the server binary.

pub mod config;
pub mod error;
pub mod time;
pub mod types;

pub use error::SgError;
pub use types::{SessionId, TargetHost, TerminalSpec};
