//! Tuning of the relay's byte pumps

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_millis;

/// Parameters of the upstream pump
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    /// Upper bound on the bytes pulled from the remote output per read
    pub read_chunk_size: usize,

    /// Pause after a read that returned no data
    #[serde(with = "duration_millis")]
    pub empty_read_backoff: Duration,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: 4096,
            empty_read_backoff: Duration::from_millis(50),
        }
    }
}
