//! Cadenza Export - asset loaders, sink handshake, and muxing
//!
//! This crate moves samples from a source into an output container:
//!
//! ```text
//!   AssetLoader ──on_output_format──▶ AssetLoaderListener (ExportSession)
//!        │                                   │ attaches tracks
//!        │ queue_* / signal_end_of_input     ▼
//!        └──────────────────────────▶ SinkHandshake ──▶ Muxer
//! ```
//!
//! # Core Abstractions
//!
//! - [`AssetLoader`] - Drives one asset ([`ImageAssetLoader`],
//!   [`AudioAssetLoader`]) on its own [`TaskQueue`]
//! - [`AssetLoaderListener`] - Mandatory notifications from a loader;
//!   [`ExportEvent`] is the same information as a tagged value
//! - [`SampleConsumer`] - Sink contract answering every queue call with an
//!   [`InputResult`]
//! - [`SinkHandshake`] - One-shot format negotiation and idempotent end of
//!   stream in front of a [`Muxer`] ([`WavMuxer`], [`MemoryMuxer`])
//! - [`RetryScheduler`] - Re-issues calls refused with
//!   [`InputResult::TryAgainLater`] after a fixed interval
//! - [`ExportError`] / [`ErrorCode`] - Failures with stable numeric codes
//!
//! Threading: every loader mutates its state only on its task queue. Blocking
//! work (decoding) runs on worker threads and reports back through the queue.
//! Retries are delayed tasks, so nothing ever sleeps or spins.

pub mod bitmap;
pub mod error;
pub mod http;
pub mod listener;
pub mod loader;
pub mod muxer;
pub mod progress;
pub mod retry;
pub mod session;
pub mod sink;
pub mod source;
pub mod task_queue;
pub mod timestamps;

pub use bitmap::{Bitmap, BitmapLoader, EncodedBitmapLoader, FileBitmapLoader};
pub use error::{ErrorCode, ExportError};
pub use listener::{AssetLoaderListener, ExportEvent, SupportedOutputs};
pub use loader::{AssetLoader, AudioAssetLoader, ImageAssetLoader, LoaderOptions};
pub use muxer::{MemoryMuxer, MuxSummary, Muxer, WavMuxer};
pub use progress::{Progress, ProgressState};
pub use retry::{DEFAULT_RETRY_INTERVAL, RetryScheduler};
pub use session::ExportSession;
pub use sink::{InputResult, SampleConsumer, SharedSink, SinkHandshake, UnknownInputResult};
pub use source::{AudioSource, SilenceSource, ToneSource, WavSource};
pub use task_queue::{CompletionHandle, QueueClosed, ScheduledTask, TaskHandle, TaskQueue};
pub use timestamps::ConstantRateTimestamps;
