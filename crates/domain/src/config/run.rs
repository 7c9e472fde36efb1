use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// How long an early `close()` waits for the callback to notice the
    /// cancellation signal before the background task is aborted.
    #[serde(default = "d_cancel_grace_ms")]
    pub cancel_grace_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            cancel_grace_ms: d_cancel_grace_ms(),
        }
    }
}

impl RunConfig {
    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }
}

fn d_cancel_grace_ms() -> u64 {
    250
}
