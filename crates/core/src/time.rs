// crates/core/src/time.rs
//! Injectable wall clock so cache expiry is deterministic under test.

/// Millisecond wall clock. The avatar cache reads time through this so tests
/// can drive expiry without sleeping.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Production clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}
