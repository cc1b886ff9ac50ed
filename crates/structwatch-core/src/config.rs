//! Engine timing configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing knobs for the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Window in which a removal and a later creation can pair into a move
    #[serde(default = "default_move_timeout_ms")]
    pub move_timeout_ms: u64,

    /// Extra delay past the move window before an unpaired removal is
    /// confirmed as a deletion
    #[serde(default = "default_expiry_grace_ms")]
    pub expiry_grace_ms: u64,

    /// Quiet period after the last change before the rebuild runs
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Period of the reconciliation scan
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
}

fn default_move_timeout_ms() -> u64 {
    300
}

fn default_expiry_grace_ms() -> u64 {
    50
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_scan_interval_ms() -> u64 {
    1000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            move_timeout_ms: default_move_timeout_ms(),
            expiry_grace_ms: default_expiry_grace_ms(),
            debounce_ms: default_debounce_ms(),
            scan_interval_ms: default_scan_interval_ms(),
        }
    }
}

impl EngineConfig {
    pub fn move_timeout(&self) -> Duration {
        Duration::from_millis(self.move_timeout_ms)
    }

    /// Delay between a removal and its expiry check.
    pub fn expiry_delay(&self) -> Duration {
        Duration::from_millis(self.move_timeout_ms + self.expiry_grace_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms.max(1))
    }
}
