use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Hands out creation timestamps that are strictly increasing across the store.
///
/// Wall-clock milliseconds are used while they keep moving forward; when several
/// writes land in the same millisecond (or the clock steps back) the value is
/// bumped past the last one issued.
#[derive(Debug, Default)]
pub struct CreationClock {
    last: AtomicI64,
}

impl CreationClock {
    #[must_use]
    pub const fn new() -> Self {
        Self { last: AtomicI64::new(0) }
    }

    pub fn next(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut prev = self.last.load(Ordering::Acquire);
        loop {
            let candidate = now.max(prev.saturating_add(1));
            match self.last.compare_exchange_weak(
                prev,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return candidate,
                Err(actual) => prev = actual,
            }
        }
    }

    /// Make sure later timestamps land after `ts` (used on log replay).
    pub fn observe(&self, ts: i64) {
        self.last.fetch_max(ts, Ordering::AcqRel);
    }

    pub fn last(&self) -> i64 {
        self.last.load(Ordering::Acquire)
    }
}
