//! Cadenza Core - format model, audio processor contract, and processing chain
//!
//! This crate holds the pieces of the export pipeline that touch raw audio
//! bytes. It has no threads, no I/O, and no knowledge of sinks or sources.
//!
//! # Core Abstractions
//!
//! ## Format model
//!
//! - [`Format`] / [`FormatBuilder`] - Immutable track description (MIME type,
//!   audio layout, video geometry, color metadata)
//! - [`AudioFormat`] - Physical layout of a raw audio buffer, with the
//!   [`AudioFormat::NOT_SET`] sentinel
//! - [`StreamMetadata`] - Position a stream resumes from after a flush
//!
//! ## Processing
//!
//! - [`AudioProcessor`] - Object-safe stage contract
//!   (configure, queue, read, end, flush, reset)
//! - [`PcmTransform`] + [`BaseProcessor`] - Shared lifecycle for stages that
//!   only differ in format negotiation and sample math
//! - [`ProcessingChain`] - Ordered stages with atomic configuration and a
//!   zero-copy bypass
//! - [`processors`] - Gain, PCM re-encoding, channel mapping, resampling
//!
//! # Example
//!
//! ```rust
//! use cadenza_core::{AudioFormat, Encoding, ProcessingChain, StreamMetadata};
//! use cadenza_core::processors::{channel_mapping, to_int16_pcm};
//!
//! let mut chain = ProcessingChain::new();
//! chain.push(Box::new(channel_mapping(vec![1, 0])));
//! chain.push(Box::new(to_int16_pcm()));
//!
//! chain
//!     .configure(AudioFormat::new(44100, 2, Encoding::Pcm16))
//!     .unwrap();
//! chain.flush(StreamMetadata::DEFAULT);
//!
//! let swapped = chain.process_buffer(&[1, 0, 2, 0]);
//! assert_eq!(&*swapped, &[2u8, 0, 1, 0][..]);
//! ```
//!
//! # Features
//!
//! - `tracing` - Emit `debug!` events for chain configuration and flushes

pub mod buffer;
pub mod chain;
pub mod error;
pub mod format;
pub mod processor;
pub mod processors;
pub mod stream;

pub use buffer::OutputBuffer;
pub use chain::ProcessingChain;
pub use error::{NegativePositionError, UnhandledAudioFormatError};
pub use format::{
    AudioFormat, ColorInfo, ColorRange, ColorSpace, ColorTransfer, Encoding, Format,
    FormatBuilder, TrackType, mime,
};
pub use processor::{
    AudioProcessor, BaseProcessor, DEFAULT_MAX_BUFFERED_OUTPUT, PcmTransform, StageFormats,
};
pub use stream::StreamMetadata;
