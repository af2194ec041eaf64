//! Asset loaders: producers that feed one asset into a sink.
//!
//! Every loader runs its state on a private [`TaskQueue`]. `start` announces
//! the duration and track count on the caller's thread, then everything else
//! (decoding results, format handshake, queue calls, retries) happens on the
//! queue. `release` stops the queue, which discards any scheduled retry.
//!
//! | loader | track | source |
//! |--------|-------|--------|
//! | [`ImageAssetLoader`] | video | a [`BitmapLoader`](crate::BitmapLoader), repeated at a constant frame rate |
//! | [`AudioAssetLoader`] | audio | an [`AudioSource`](crate::AudioSource) through a [`ProcessingChain`](cadenza_core::ProcessingChain) |

mod audio;
mod still_image;

pub use audio::AudioAssetLoader;
pub use still_image::ImageAssetLoader;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cadenza_core::{Format, TrackType};
use tracing::{debug, error, info};

use crate::error::ExportError;
use crate::listener::AssetLoaderListener;
use crate::progress::{Progress, ProgressState};
use crate::retry::{DEFAULT_RETRY_INTERVAL, RetryScheduler};
use crate::sink::SharedSink;
use crate::task_queue::{TaskHandle, TaskQueue};

/// Drives one asset into a sink.
pub trait AssetLoader: Send {
    /// Begin loading. Listener callbacks follow, the first two on this thread.
    ///
    /// Does nothing after [`release`](Self::release).
    ///
    /// # Panics
    ///
    /// Panics if called twice.
    fn start(&mut self);

    /// Current progress. Never blocks.
    fn progress(&self) -> ProgressState;

    /// Stop all work and cancel pending retries. Idempotent, callable in any
    /// state.
    fn release(&mut self);
}

/// Tuning shared by all loaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Delay before re-issuing a call refused with `TRY_AGAIN_LATER`.
    pub retry_interval: Duration,
    /// Frames read from an audio source per queue call.
    pub chunk_frames: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            retry_interval: DEFAULT_RETRY_INTERVAL,
            chunk_frames: 1024,
        }
    }
}

/// Queue-side state every loader carries.
pub(crate) struct LoaderContext {
    pub(crate) listener: Arc<dyn AssetLoaderListener>,
    pub(crate) retry: RetryScheduler,
    progress: Arc<Progress>,
    released: Arc<AtomicBool>,
    sink: Option<SharedSink>,
    done: bool,
}

impl LoaderContext {
    /// Whether the loader finished, failed, or was released.
    pub(crate) fn is_stopped(&self) -> bool {
        self.done || self.released.load(Ordering::Acquire)
    }

    pub(crate) fn progress(&self) -> &Progress {
        &self.progress
    }

    /// The sink for `format`, asking the listener until it hands one out.
    pub(crate) fn sink_for(&mut self, format: &Format) -> Result<Option<SharedSink>, ExportError> {
        if let Some(sink) = &self.sink {
            return Ok(Some(Arc::clone(sink)));
        }
        let sink = self.listener.on_output_format(format)?;
        if sink.is_some() {
            debug!(%format, "sink handed out");
        }
        self.sink.clone_from(&sink);
        Ok(sink)
    }

    /// Re-run `task` after the retry interval.
    pub(crate) fn retry<S, F>(&mut self, queue: &TaskHandle<S>, task: F)
    where
        S: 'static,
        F: FnOnce(&mut S, &TaskHandle<S>) + Send + 'static,
    {
        if self.is_stopped() {
            return;
        }
        if self.retry.schedule(queue, task).is_err() {
            debug!("queue closed, retry dropped");
        }
    }

    /// Close `track` after its last sample was accepted.
    pub(crate) fn end_track(&mut self, sink: &SharedSink, track: TrackType) {
        self.progress.update(100);
        let ended = sink.lock().signal_end_of_input(track);
        match ended {
            Ok(()) => self.complete(),
            Err(err) => self.fail(err),
        }
    }

    /// Everything was delivered.
    pub(crate) fn complete(&mut self) {
        if self.is_stopped() {
            return;
        }
        self.done = true;
        self.retry.release();
        self.progress.update(100);
        info!(attempts = self.retry.attempts(), "asset loaded");
    }

    /// Report `err` and stop. Only the first failure reaches the listener.
    pub(crate) fn fail(&mut self, err: ExportError) {
        if self.is_stopped() {
            debug!(%err, "ignoring error after stop");
            return;
        }
        self.done = true;
        self.retry.release();
        self.progress.mark_unavailable();
        error!(%err, "asset loader failed");
        self.listener.on_error(err);
    }
}

/// Caller-side half of a loader: owns the queue and the shared flags.
pub(crate) struct LoaderShell<S> {
    thread_name: &'static str,
    listener: Arc<dyn AssetLoaderListener>,
    progress: Arc<Progress>,
    released: Arc<AtomicBool>,
    queue: Option<TaskQueue<S>>,
}

impl<S: Send + 'static> LoaderShell<S> {
    pub(crate) fn new(thread_name: &'static str, listener: Arc<dyn AssetLoaderListener>) -> Self {
        Self {
            thread_name,
            listener,
            progress: Arc::new(Progress::new()),
            released: Arc::new(AtomicBool::new(false)),
            queue: None,
        }
    }

    pub(crate) fn context(&self, options: &LoaderOptions) -> LoaderContext {
        LoaderContext {
            listener: Arc::clone(&self.listener),
            retry: RetryScheduler::new(options.retry_interval),
            progress: Arc::clone(&self.progress),
            released: Arc::clone(&self.released),
            sink: None,
            done: false,
        }
    }

    pub(crate) fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Report duration and track count, then run `first` on a new queue that
    /// owns `state`.
    pub(crate) fn launch<F>(&mut self, state: S, duration_us: u64, track_count: usize, first: F)
    where
        F: FnOnce(&mut S, &TaskHandle<S>) + Send + 'static,
    {
        if self.is_released() {
            return;
        }
        self.progress.start();
        info!(loader = self.thread_name, duration_us, track_count, "loader started");
        self.listener.on_duration_us(duration_us);
        self.listener.on_track_count(track_count);

        let queue = match TaskQueue::spawn(self.thread_name, state) {
            Ok(queue) => queue,
            Err(err) => {
                self.progress.mark_unavailable();
                self.listener.on_error(ExportError::io(err));
                return;
            }
        };
        if queue.post(first).is_err() {
            self.progress.mark_unavailable();
            self.listener
                .on_error(ExportError::unexpected("loader queue stopped before start"));
        }
        self.queue = Some(queue);
    }

    pub(crate) fn progress(&self) -> ProgressState {
        self.progress.get()
    }

    pub(crate) fn release(&mut self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(queue) = self.queue.take() {
            queue.shutdown();
        }
        debug!(loader = self.thread_name, "loader released");
    }
}
