//! Tunables grouped into one struct with a `Default`, matching this
//! codebase's `NetConfig`/`ClientConfig` style (§0.3). No file-parsing logic
//! lives here; an embedding application deserializes this however it likes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Retry budget for `enqueue_cherished` before it gives up with
    /// `QueueError::CherishExhausted` (§7.3, §9 Open Question: hardcoded at 4
    /// in the distilled spec; kept as a config knob here instead of a magic
    /// constant, see DESIGN.md).
    pub cherish_retries: u32,
    /// Delay between successive attempts within `enqueue_cherished`.
    pub cherish_retry_delay: Duration,
    /// Optional cap on `MultiQueue::total_size()`; `None` means unbounded,
    /// matching the distilled spec's default (§9 Open Question).
    pub max_scheduled: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            cherish_retries: 4,
            cherish_retry_delay: Duration::from_millis(200),
            max_scheduled: None,
        }
    }
}
