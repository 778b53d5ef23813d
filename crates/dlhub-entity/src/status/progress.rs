//! Progress counters.

use serde::{Deserialize, Serialize};

/// Count of finished files out of the batch total, plus a derived percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    /// Files finished so far.
    pub current: u32,
    /// Files in the batch.
    pub total: u32,
    /// `round(100 * current / total)`.
    pub percentage: u32,
}

impl Progress {
    /// Build a progress value, clamping `current` to `total`.
    ///
    /// A zero-file batch is complete by definition and reports 100%.
    pub fn new(current: u32, total: u32) -> Self {
        let current = current.min(total);
        let percentage = if total == 0 {
            100
        } else {
            ((u64::from(current) * 100 + u64::from(total) / 2) / u64::from(total)) as u32
        };
        Self {
            current,
            total,
            percentage,
        }
    }

    /// Progress at the start of a batch.
    pub fn start(total: u32) -> Self {
        Self::new(0, total)
    }

    /// Progress with every file finished.
    pub fn finished(total: u32) -> Self {
        Self::new(total, total)
    }
}
