//! Request pacing for free upstream endpoints.
//!
//! Enforces a minimum interval between outbound requests. Both Yahoo and
//! NSE start returning 429s under burst traffic; a fixed inter-request
//! pause keeps a full NIFTY500 run under their informal limits.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::trace;

/// Minimum-interval pacer shared by all requests of one adapter.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl Throttle {
    /// Create a pacer with the given minimum interval between requests.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Create a pacer from a pause in milliseconds (0 disables pacing).
    pub fn from_millis(pause_ms: u64) -> Self {
        Self::new(Duration::from_millis(pause_ms))
    }

    /// Wait until the minimum interval since the previous request has
    /// elapsed, then claim the slot.
    pub async fn wait(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                let pause = self.min_interval - elapsed;
                trace!(pause_ms = pause.as_millis() as u64, "Throttling request");
                tokio::time::sleep(pause).await;
            }
        }
        *last = Some(Instant::now());
    }
}

// ============================================================================
// Tests
// ============================================================================
