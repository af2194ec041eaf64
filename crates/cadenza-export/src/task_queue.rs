//! Single-threaded sequential task queue.
//!
//! A [`TaskQueue`] owns a piece of state `S` on a dedicated thread and runs
//! posted closures against it one at a time, in order. Delayed tasks wait in a
//! deadline heap and can be cancelled until they fire. Blocking work (file
//! I/O, decoding) runs on a worker thread through
//! [`TaskHandle::spawn_blocking`], and its result is marshalled back onto the
//! queue before it touches `S`.
//!
//! Since only the queue thread ever sees `S`, the state needs no locks.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::marker::PhantomData;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error};

type Task<S> = Box<dyn FnOnce(&mut S, &TaskHandle<S>) + Send>;

enum Command<S> {
    Run(Task<S>),
    RunAt(Timer<S>),
    Shutdown,
}

struct Timer<S> {
    deadline: Instant,
    sequence: u64,
    cancelled: Arc<AtomicBool>,
    task: Task<S>,
}

// Ordered so that `BinaryHeap` (a max-heap) pops the earliest deadline first,
// ties broken by submission order.
impl<S> Ord for Timer<S> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl<S> PartialOrd for Timer<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S> PartialEq for Timer<S> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.sequence == other.sequence
    }
}

impl<S> Eq for Timer<S> {}

/// The queue thread has stopped accepting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("task queue is shut down")]
pub struct QueueClosed;

/// Cancellation token for a delayed task.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    cancelled: Arc<AtomicBool>,
}

impl ScheduledTask {
    /// Prevent the task from running if it has not started yet.
    pub fn cancel(&self) {
        self.cancelled.store(true, AtomicOrdering::Release);
    }

    /// Whether [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::Acquire)
    }
}

/// Handle on work running off the queue whose result of type `T` will be
/// delivered back onto it.
#[derive(Debug)]
pub struct CompletionHandle<T> {
    cancelled: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    _result: PhantomData<fn() -> T>,
}

impl<T> Clone for CompletionHandle<T> {
    fn clone(&self) -> Self {
        Self {
            cancelled: Arc::clone(&self.cancelled),
            finished: Arc::clone(&self.finished),
            _result: PhantomData,
        }
    }
}

impl<T> CompletionHandle<T> {
    /// Drop the result instead of delivering it. The work itself still runs
    /// to completion on its worker thread.
    pub fn cancel(&self) {
        self.cancelled.store(true, AtomicOrdering::Release);
    }

    /// Whether [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::Acquire)
    }

    /// Whether the worker has produced its result.
    pub fn is_finished(&self) -> bool {
        self.finished.load(AtomicOrdering::Acquire)
    }
}

/// Cloneable sender side of a [`TaskQueue`].
pub struct TaskHandle<S> {
    tx: Sender<Command<S>>,
    sequence: Arc<AtomicU64>,
}

impl<S> Clone for TaskHandle<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            sequence: Arc::clone(&self.sequence),
        }
    }
}

impl<S: 'static> TaskHandle<S> {
    /// Run `task` on the queue after every task posted before it.
    pub fn post<F>(&self, task: F) -> Result<(), QueueClosed>
    where
        F: FnOnce(&mut S, &TaskHandle<S>) + Send + 'static,
    {
        self.tx
            .send(Command::Run(Box::new(task)))
            .map_err(|_| QueueClosed)
    }

    /// Run `task` on the queue once `delay` has elapsed.
    pub fn post_delayed<F>(&self, delay: Duration, task: F) -> Result<ScheduledTask, QueueClosed>
    where
        F: FnOnce(&mut S, &TaskHandle<S>) + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let timer = Timer {
            deadline: Instant::now() + delay,
            sequence: self.sequence.fetch_add(1, AtomicOrdering::Relaxed),
            cancelled: Arc::clone(&cancelled),
            task: Box::new(task),
        };
        self.tx
            .send(Command::RunAt(timer))
            .map_err(|_| QueueClosed)?;
        Ok(ScheduledTask { cancelled })
    }

    /// Run `work` on a fresh worker thread, then `on_complete` with its
    /// result on the queue.
    ///
    /// The result is dropped if the handle is cancelled or the queue has shut
    /// down by the time the work finishes.
    pub fn spawn_blocking<T, W, C>(
        &self,
        name: &str,
        work: W,
        on_complete: C,
    ) -> std::io::Result<CompletionHandle<T>>
    where
        T: Send + 'static,
        W: FnOnce() -> T + Send + 'static,
        C: FnOnce(&mut S, &TaskHandle<S>, T) + Send + 'static,
    {
        let handle = CompletionHandle {
            cancelled: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(AtomicBool::new(false)),
            _result: PhantomData,
        };
        let completion = handle.clone();
        let queue = self.clone();
        thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                let value = work();
                completion.finished.store(true, AtomicOrdering::Release);
                if completion.is_cancelled() {
                    return;
                }
                let delivered = queue.post(move |state, handle| {
                    if !completion.is_cancelled() {
                        on_complete(state, handle, value);
                    }
                });
                if delivered.is_err() {
                    debug!("queue closed before blocking work completed");
                }
            })?;
        Ok(handle)
    }
}

/// Owner of the queue thread.
///
/// Dropping the queue shuts it down: tasks already running finish, pending
/// delayed tasks are discarded.
pub struct TaskQueue<S> {
    handle: TaskHandle<S>,
    join: Option<JoinHandle<()>>,
}

impl<S: Send + 'static> TaskQueue<S> {
    /// Start a queue thread named `name` that owns `state`.
    pub fn spawn(name: impl Into<String>, state: S) -> std::io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded::<Command<S>>();
        let handle = TaskHandle {
            tx,
            sequence: Arc::new(AtomicU64::new(0)),
        };
        let loop_handle = handle.clone();
        let join = thread::Builder::new()
            .name(name.into())
            .spawn(move || run_queue_loop(state, &rx, &loop_handle))?;
        Ok(Self {
            handle,
            join: Some(join),
        })
    }

    /// A handle for posting work.
    pub fn handle(&self) -> TaskHandle<S> {
        self.handle.clone()
    }

    /// Shorthand for [`TaskHandle::post`].
    pub fn post<F>(&self, task: F) -> Result<(), QueueClosed>
    where
        F: FnOnce(&mut S, &TaskHandle<S>) + Send + 'static,
    {
        self.handle.post(task)
    }

    /// Stop the queue thread and wait for it to exit.
    ///
    /// When called from the queue thread itself the thread is told to stop
    /// after the current task instead of being joined.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl<S> Drop for TaskQueue<S> {
    fn drop(&mut self) {
        let _ = self.handle.tx.send(Command::Shutdown);
        let Some(join) = self.join.take() else {
            return;
        };
        if join.thread().id() == thread::current().id() {
            return;
        }
        if join.join().is_err() {
            error!("task queue thread panicked");
        }
    }
}

fn run_queue_loop<S: 'static>(mut state: S, rx: &Receiver<Command<S>>, handle: &TaskHandle<S>) {
    let mut timers: BinaryHeap<Timer<S>> = BinaryHeap::new();
    loop {
        let now = Instant::now();
        while timers.peek().is_some_and(|t| t.deadline <= now) {
            let Some(timer) = timers.pop() else { break };
            if timer.cancelled.load(AtomicOrdering::Acquire) {
                continue;
            }
            if !run_task(&mut state, handle, timer.task) {
                return;
            }
        }

        let command = match timers.peek() {
            Some(next) => match rx.recv_timeout(next.deadline.saturating_duration_since(now)) {
                Ok(command) => command,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return,
            },
            None => match rx.recv() {
                Ok(command) => command,
                Err(_) => return,
            },
        };

        match command {
            Command::Run(task) => {
                if !run_task(&mut state, handle, task) {
                    return;
                }
            }
            Command::RunAt(timer) => timers.push(timer),
            Command::Shutdown => {
                debug!(discarded = timers.len(), "task queue shutting down");
                return;
            }
        }
    }
}

/// Returns `false` if the task panicked and the loop should stop.
fn run_task<S>(state: &mut S, handle: &TaskHandle<S>, task: Task<S>) -> bool {
    let result = catch_unwind(AssertUnwindSafe(|| task(state, handle)));
    if result.is_err() {
        error!("task panicked, stopping queue");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn wait_for(rx: &crossbeam_channel::Receiver<u32>) -> u32 {
        rx.recv_timeout(Duration::from_secs(2)).expect("task ran")
    }

    #[test]
    fn tasks_run_in_order_against_owned_state() {
        let queue = TaskQueue::spawn("test-queue", Vec::<u32>::new()).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        for i in 0..5 {
            queue.post(move |state, _| state.push(i)).unwrap();
        }
        queue
            .post(move |state, _| tx.send(state.iter().sum()).unwrap())
            .unwrap();
        assert_eq!(wait_for(&rx), 10);
    }

    #[test]
    fn delayed_tasks_fire_by_deadline() {
        let queue = TaskQueue::spawn("test-queue", ()).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let late = tx.clone();
        queue
            .handle()
            .post_delayed(Duration::from_millis(60), move |_, _| late.send(2).unwrap())
            .unwrap();
        queue
            .handle()
            .post_delayed(Duration::from_millis(5), move |_, _| tx.send(1).unwrap())
            .unwrap();
        assert_eq!(wait_for(&rx), 1);
        assert_eq!(wait_for(&rx), 2);
    }

    #[test]
    fn cancelled_task_never_runs() {
        let queue = TaskQueue::spawn("test-queue", ()).unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let scheduled = queue
            .handle()
            .post_delayed(Duration::from_millis(20), move |_, _| {
                flag.store(true, AtomicOrdering::SeqCst)
            })
            .unwrap();
        scheduled.cancel();
        thread::sleep(Duration::from_millis(60));
        assert!(!ran.load(AtomicOrdering::SeqCst));
        assert!(scheduled.is_cancelled());
    }

    #[test]
    fn shutdown_discards_pending_timers() {
        let queue = TaskQueue::spawn("test-queue", ()).unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        queue
            .handle()
            .post_delayed(Duration::from_millis(30), move |_, _| {
                flag.store(true, AtomicOrdering::SeqCst)
            })
            .unwrap();
        let handle = queue.handle();
        queue.shutdown();
        thread::sleep(Duration::from_millis(60));
        assert!(!ran.load(AtomicOrdering::SeqCst));
        assert_eq!(handle.post(|_, _| {}), Err(QueueClosed));
    }

    #[test]
    fn blocking_work_completes_on_queue() {
        let queue = TaskQueue::spawn("test-queue", 0u32).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let queue_thread = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&queue_thread);
        queue
            .post(move |_, _| *seen.lock().unwrap() = Some(thread::current().id()))
            .unwrap();

        let seen = Arc::clone(&queue_thread);
        let completion = queue
            .handle()
            .spawn_blocking(
                "test-worker",
                || 21u32,
                move |state, _, value| {
                    *state += value * 2;
                    assert_eq!(*seen.lock().unwrap(), Some(thread::current().id()));
                    tx.send(*state).unwrap();
                },
            )
            .unwrap();
        assert_eq!(wait_for(&rx), 42);
        assert!(completion.is_finished());
    }

    #[test]
    fn tasks_can_schedule_follow_ups() {
        let queue = TaskQueue::spawn("test-queue", 0u32).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        queue
            .post(move |state, handle| {
                *state = 1;
                handle
                    .post_delayed(Duration::from_millis(1), move |state, _| {
                        tx.send(*state + 1).unwrap()
                    })
                    .unwrap();
            })
            .unwrap();
        assert_eq!(wait_for(&rx), 2);
    }
}
