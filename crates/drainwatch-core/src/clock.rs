//! Wall-clock abstraction.
//!
//! Job timestamps (`created_at`, `observed_at`) are Unix milliseconds so they
//! survive a process restart and can be compared across runs. The clock is
//! injected so tests can drive it alongside a paused tokio runtime.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch. Signed so differences can go negative
/// when samples arrive out of order.
pub type UnixMillis = i64;

/// Source of "now" for the estimator and the lifecycle controller.
pub trait Clock: Send + Sync {
    fn now(&self) -> UnixMillis;
}

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> UnixMillis {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }
}

/// Clock that follows tokio's (possibly paused) time, anchored at a fixed epoch.
///
/// With `tokio::time::pause()` this advances only when the runtime advances
/// virtual time, which keeps snapshot timestamps consistent with sampler ticks.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    anchor_ms: UnixMillis,
    anchor: tokio::time::Instant,
}

impl TokioClock {
    pub fn starting_at(anchor_ms: UnixMillis) -> Self {
        Self {
            anchor_ms,
            anchor: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> UnixMillis {
        self.anchor_ms + self.anchor.elapsed().as_millis() as i64
    }
}

/// Converts a millisecond span to seconds as `f64`.
pub fn millis_to_secs(ms: i64) -> f64 {
    ms as f64 / 1_000.0
}
