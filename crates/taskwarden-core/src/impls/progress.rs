//! ProgressCounter - liveness from a counter the work keeps advancing.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared between a handler's `execute` (which calls [`tick`](Self::tick))
/// and its `is_alive` (which calls [`advanced`](Self::advanced)).
#[derive(Debug, Default)]
pub struct ProgressCounter {
    count: AtomicU64,
    seen: AtomicU64,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// `true` if `tick` was called since the previous call to `advanced`.
    pub fn advanced(&self) -> bool {
        let now = self.count.load(Ordering::Relaxed);
        self.seen.swap(now, Ordering::Relaxed) != now
    }
}
