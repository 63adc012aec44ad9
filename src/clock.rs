use std::time::{SystemTime, UNIX_EPOCH};

/// A source of "now, in epoch seconds" used only for expiration math.
///
/// The original implementation this crate is modeled on mixed two
/// different notions of "now" (one wrapping on a minute/day boundary,
/// one full epoch-seconds) across its two code paths — almost certainly
/// a bug. This crate uses a single, injectable clock so that expiration
/// set and check always agree, and so tests don't need to sleep in
/// real time to exercise TTL logic.
pub trait Clock: Send + Sync {
    /// The current time, in whole seconds. Monotonicity is desirable but
    /// not required: expiration math only ever compares two readings of
    /// the same clock.
    fn now_seconds(&self) -> i64;
}

/// The default clock, backed by the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_seconds(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the Unix epoch")
            .as_secs() as i64
    }
}
