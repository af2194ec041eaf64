//! Lock-free export progress shared between a loader and its observers.

use std::sync::atomic::{AtomicU8, Ordering};

/// What a progress query found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressState {
    /// `start` has not been called.
    NotStarted,
    /// Percentage in `0..=100`.
    Available(u8),
    /// The loader cannot report progress, e.g. after an error.
    Unavailable,
}

const NOT_STARTED: u8 = u8::MAX;
const UNAVAILABLE: u8 = u8::MAX - 1;

/// Monotonic percentage readable from any thread without blocking.
///
/// Within one session the value never decreases: [`update`](Self::update)
/// with a lower value than the current one is ignored.
#[derive(Debug)]
pub struct Progress {
    value: AtomicU8,
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress {
    /// Progress in the not-started state.
    pub const fn new() -> Self {
        Self {
            value: AtomicU8::new(NOT_STARTED),
        }
    }

    /// Switch from not-started to 0 %. No effect once started.
    pub fn start(&self) {
        let _ = self
            .value
            .compare_exchange(NOT_STARTED, 0, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Raise the percentage to `percent`, clamped to 100.
    ///
    /// Ignored if not started, unavailable, or already at or above `percent`.
    pub fn update(&self, percent: u8) {
        let percent = percent.min(100);
        let _ = self
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current <= 100 && percent > current).then_some(percent)
            });
    }

    /// Stop reporting progress for the rest of the session.
    pub fn mark_unavailable(&self) {
        self.value.store(UNAVAILABLE, Ordering::Release);
    }

    /// Current state.
    pub fn get(&self) -> ProgressState {
        match self.value.load(Ordering::Acquire) {
            NOT_STARTED => ProgressState::NotStarted,
            UNAVAILABLE => ProgressState::Unavailable,
            percent => ProgressState::Available(percent),
        }
    }
}

/// Integer percentage of `done` out of `total`, 0 when `total` is 0.
pub fn percent_of(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    ((done.min(total) * 100) / total) as u8
}
