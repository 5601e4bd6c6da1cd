//! Fixed-interval pacing for calls to the external design API.
//!
//! The API throttles aggressively and rejects bursty export requests, so
//! all outbound calls within one ingestion run are serialized through a
//! pacer that enforces a minimum gap between calls. Injected rather than
//! inlined as sleeps so tests can run with a zero interval.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

/// Default gap between external calls.
pub const DEFAULT_CALL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug)]
struct PacerState {
    last_call: Option<Instant>,
    total_calls: u64,
    total_waited: Duration,
}

/// Counters exposed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacerStats {
    pub total_calls: u64,
    pub total_waited: Duration,
}

/// Enforces a minimum interval between external API calls.
#[derive(Debug, Clone)]
pub struct CallPacer {
    interval: Duration,
    state: Arc<Mutex<PacerState>>,
}

impl CallPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Arc::new(Mutex::new(PacerState {
                last_call: None,
                total_calls: 0,
                total_waited: Duration::ZERO,
            })),
        }
    }

    /// A pacer that never waits, for tests.
    pub fn unthrottled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the interval since the previous call has elapsed, then
    /// record this call as started.
    pub async fn pause(&self) {
        let wait = {
            let state = self.state.lock().await;
            match state.last_call {
                Some(last) => self.interval.saturating_sub(last.elapsed()),
                None => Duration::ZERO,
            }
        };

        if wait > Duration::ZERO {
            debug!(?wait, "pacing external call");
            tokio::time::sleep(wait).await;
        }

        let mut state = self.state.lock().await;
        state.last_call = Some(Instant::now());
        state.total_calls += 1;
        state.total_waited += wait;
    }

    pub async fn stats(&self) -> PacerStats {
        let state = self.state.lock().await;
        PacerStats {
            total_calls: state.total_calls,
            total_waited: state.total_waited,
        }
    }
}

impl Default for CallPacer {
    fn default() -> Self {
        Self::new(DEFAULT_CALL_INTERVAL)
    }
}
