//! Producer-to-pipeline notifications.
//!
//! An asset loader reports to an [`AssetLoaderListener`] in a fixed order:
//! duration, track count, then per track `on_track_added` followed by one or
//! more `on_output_format` requests until a sink is handed out. `on_error`
//! arrives at most once and nothing follows it.
//!
//! Every listener method is mandatory. Observers that prefer a single
//! dispatch point consume [`ExportEvent`]s from an
//! [`ExportSession`](crate::ExportSession) instead.

use cadenza_core::{Format, TrackType};

use crate::error::ExportError;
use crate::sink::SharedSink;

/// Output kinds a loader can produce for a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SupportedOutputs {
    /// Raw decoded samples or frames.
    pub decoded: bool,
    /// Compressed samples passed through untouched.
    pub encoded: bool,
}

impl SupportedOutputs {
    /// Decoded output only.
    pub const DECODED: SupportedOutputs = SupportedOutputs {
        decoded: true,
        encoded: false,
    };
}

/// Receiver of asset loader notifications.
///
/// Called from the loader's task queue thread, and for the first two calls
/// from the thread that started the loader.
pub trait AssetLoaderListener: Send + Sync {
    /// Total duration of the asset in microseconds.
    fn on_duration_us(&self, duration_us: u64);

    /// Number of tracks the loader will add.
    fn on_track_count(&self, track_count: usize);

    /// A track was discovered with the given input format.
    fn on_track_added(&self, input_format: &Format, supported_outputs: SupportedOutputs);

    /// Request the sink for a track producing `format`.
    ///
    /// `Ok(None)` means the sink is not ready yet and the loader must ask
    /// again later with the same format.
    fn on_output_format(&self, format: &Format) -> Result<Option<SharedSink>, ExportError>;

    /// A runtime failure. Called at most once per loader.
    fn on_error(&self, error: ExportError);
}

/// Notification delivered through an export session's event channel.
#[derive(Debug)]
pub enum ExportEvent {
    /// Asset duration in microseconds.
    DurationUs(u64),
    /// Number of tracks announced by the loader.
    TrackCount(usize),
    /// A track was discovered.
    TrackAdded {
        /// Input format of the track.
        format: Format,
        /// Output kinds the loader offers.
        supported_outputs: SupportedOutputs,
    },
    /// The sink was handed out for a track.
    SinkReady {
        /// Track kind.
        track: TrackType,
        /// Agreed output format.
        format: Format,
    },
    /// A track signalled end of input.
    TrackEnded(TrackType),
    /// Every track ended and the output was finalised.
    Completed,
    /// The export failed.
    Error(ExportError),
}

impl ExportEvent {
    /// Whether no further events follow this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExportEvent::Completed | ExportEvent::Error(_))
    }
}
