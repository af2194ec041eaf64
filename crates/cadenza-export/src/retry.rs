//! Delayed re-submission of operations refused with `TRY_AGAIN_LATER`.

use std::time::Duration;

use tracing::debug;

use crate::task_queue::{QueueClosed, ScheduledTask, TaskHandle};

/// Default delay between attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Re-issues a refused operation on a [`TaskQueue`](crate::TaskQueue) after a
/// fixed interval.
///
/// At most one retry is pending at a time; scheduling a new one cancels the
/// previous one. After [`release`](Self::release) nothing is scheduled again.
/// There is no attempt limit: an operation is retried until it succeeds, fails,
/// or the owner is released.
#[derive(Debug)]
pub struct RetryScheduler {
    interval: Duration,
    pending: Option<ScheduledTask>,
    attempts: u64,
    released: bool,
}

impl Default for RetryScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_INTERVAL)
    }
}

impl RetryScheduler {
    /// Scheduler waiting `interval` between attempts.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: None,
            attempts: 0,
            released: false,
        }
    }

    /// Delay between attempts.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of retries scheduled so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Whether a scheduled retry has not fired or been cancelled yet.
    pub fn has_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|t| !t.is_cancelled())
    }

    /// Run `task` on the queue after one interval, replacing any pending
    /// retry.
    ///
    /// Returns `Ok(false)` without scheduling once released.
    pub fn schedule<S, F>(&mut self, queue: &TaskHandle<S>, task: F) -> Result<bool, QueueClosed>
    where
        S: 'static,
        F: FnOnce(&mut S, &TaskHandle<S>) + Send + 'static,
    {
        if self.released {
            return Ok(false);
        }
        self.cancel();
        let scheduled = queue.post_delayed(self.interval, task)?;
        self.pending = Some(scheduled);
        self.attempts += 1;
        debug!(attempt = self.attempts, interval = ?self.interval, "retry scheduled");
        Ok(true)
    }

    /// Mark the pending retry as done. Call at the top of the retried task.
    pub fn fired(&mut self) {
        self.pending = None;
    }

    /// Cancel the pending retry, if any.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel();
        }
    }

    /// Cancel the pending retry and refuse to schedule new ones. Idempotent.
    pub fn release(&mut self) {
        self.cancel();
        self.released = true;
    }

    /// Whether [`release`](Self::release) was called.
    pub fn is_released(&self) -> bool {
        self.released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task_queue::TaskQueue;

    struct State {
        retry: RetryScheduler,
        runs: u32,
    }

    fn attempt(state: &mut State, queue: &TaskHandle<State>, done: crossbeam_channel::Sender<u32>) {
        state.retry.fired();
        state.runs += 1;
        if state.runs < 3 {
            state
                .retry
                .schedule(queue, move |s, q| attempt(s, q, done))
                .unwrap();
        } else {
            done.send(state.runs).unwrap();
        }
    }

    #[test]
    fn default_interval_is_ten_millis() {
        assert_eq!(RetryScheduler::default().interval(), Duration::from_millis(10));
    }

    #[test]
    fn retries_until_done() {
        let state = State {
            retry: RetryScheduler::new(Duration::from_millis(1)),
            runs: 0,
        };
        let queue = TaskQueue::spawn("retry-test", state).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        queue.post(move |s, q| attempt(s, q, tx)).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 3);
    }

    #[test]
    fn release_cancels_and_blocks_new_retries() {
        let queue = TaskQueue::spawn("retry-test", ()).unwrap();
        let handle = queue.handle();
        let mut retry = RetryScheduler::new(Duration::from_millis(50));
        assert!(retry.schedule(&handle, |_, _| {}).unwrap());
        assert!(retry.has_pending());

        retry.release();
        assert!(!retry.has_pending());
        assert!(!retry.schedule(&handle, |_, _| {}).unwrap());
        retry.release();
        assert!(retry.is_released());
        assert_eq!(retry.attempts(), 1);
    }
}
