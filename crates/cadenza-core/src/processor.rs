//! The audio processor contract and its shared state machine.
//!
//! [`AudioProcessor`] is the unit every stage of a
//! [`ProcessingChain`](crate::ProcessingChain) implements. Most stages only
//! differ in how they negotiate formats and how they turn one block of PCM
//! into another, so they implement the smaller [`PcmTransform`] trait and get
//! wrapped in [`BaseProcessor`], which owns the lifecycle:
//!
//! ```text
//! not configured ──configure──▶ pending ──flush──▶ active ──queue_end_of_stream──▶ draining ──▶ ended
//!        ▲                                           ▲                                          │
//!        └──────────────── reset ────────────────────┴──────────────── flush ───────────────────┘
//! ```
//!
//! A stage whose `configure` decides it has nothing to do (unity gain, matching
//! sample rates) reports itself inactive and is bypassed by the chain.

use crate::buffer::OutputBuffer;
use crate::error::UnhandledAudioFormatError;
use crate::format::AudioFormat;
use crate::stream::StreamMetadata;

/// Default cap on unread output a [`BaseProcessor`] holds before it stops
/// accepting input.
pub const DEFAULT_MAX_BUFFERED_OUTPUT: usize = 64 * 1024;

/// A single transformation stage operating on raw audio bytes.
///
/// Calls must follow the lifecycle described in the [module docs](self).
/// Calling [`queue_input`](AudioProcessor::queue_input) after
/// [`queue_end_of_stream`](AudioProcessor::queue_end_of_stream) without an
/// intervening [`flush`](AudioProcessor::flush) is a programmer error and
/// panics.
pub trait AudioProcessor: Send {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Declare the format that will be queued after the next flush.
    ///
    /// Returns the resulting output format, or [`AudioFormat::NOT_SET`] when
    /// the stage is inactive for this input. Does not disturb data that is
    /// currently flowing.
    fn configure(
        &mut self,
        input_format: AudioFormat,
    ) -> Result<AudioFormat, UnhandledAudioFormatError>;

    /// Whether queued input is transformed under the last `configure` call.
    fn is_active(&self) -> bool;

    /// Consume a prefix of `input`, advancing the slice past what was taken.
    ///
    /// May take less than offered; the caller retries with the remainder.
    fn queue_input(&mut self, input: &mut &[u8]);

    /// Signal that no more input follows until the next flush. Idempotent.
    fn queue_end_of_stream(&mut self);

    /// Output produced so far and not yet consumed. Never blocks.
    fn get_output(&mut self) -> &mut OutputBuffer;

    /// Whether end of stream was queued and every output byte was read.
    fn is_ended(&self) -> bool;

    /// Discard buffered state and start using the pending configuration.
    fn flush(&mut self, metadata: StreamMetadata);

    /// Release resources and return to the unconfigured state.
    fn reset(&mut self);
}

/// Format negotiation and sample conversion for a [`BaseProcessor`].
pub trait PcmTransform: Send {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Decide the output format for `input`.
    ///
    /// `Ok(None)` means the transform would be a no-op and the stage should be
    /// bypassed.
    fn on_configure(
        &mut self,
        input: AudioFormat,
    ) -> Result<Option<AudioFormat>, UnhandledAudioFormatError>;

    /// Transform whole frames from `input`, appending to `output`.
    ///
    /// `input` always holds a whole number of input frames. Returns the number
    /// of input bytes consumed.
    fn transform(
        &mut self,
        input: &[u8],
        formats: &StageFormats,
        output: &mut Vec<u8>,
    ) -> usize;

    /// Emit anything held back once the input has ended.
    fn on_end_of_stream(&mut self, _formats: &StageFormats, _output: &mut Vec<u8>) {}

    /// Clear internal state on flush.
    fn on_flush(&mut self, _metadata: StreamMetadata) {}

    /// Release internal state on reset.
    fn on_reset(&mut self) {}
}

/// Input and output formats of a flushed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageFormats {
    /// Format of queued input.
    pub input: AudioFormat,
    /// Format of produced output.
    pub output: AudioFormat,
}

/// Lifecycle wrapper turning a [`PcmTransform`] into an [`AudioProcessor`].
#[derive(Debug)]
pub struct BaseProcessor<T> {
    transform: T,
    pending: StageFormats,
    current: StageFormats,
    output: OutputBuffer,
    input_ended: bool,
    max_buffered: usize,
}

impl<T: PcmTransform> BaseProcessor<T> {
    /// Wrap `transform`.
    pub fn new(transform: T) -> Self {
        Self {
            transform,
            pending: StageFormats {
                input: AudioFormat::NOT_SET,
                output: AudioFormat::NOT_SET,
            },
            current: StageFormats {
                input: AudioFormat::NOT_SET,
                output: AudioFormat::NOT_SET,
            },
            output: OutputBuffer::new(),
            input_ended: false,
            max_buffered: DEFAULT_MAX_BUFFERED_OUTPUT,
        }
    }

    /// Cap unread output at `bytes`; input is refused while the cap is reached.
    pub fn with_max_buffered_output(mut self, bytes: usize) -> Self {
        self.max_buffered = bytes.max(1);
        self
    }

    /// The wrapped transform.
    pub fn transform(&self) -> &T {
        &self.transform
    }

    /// Mutable access to the wrapped transform.
    ///
    /// Parameter changes take effect at the next `configure` + `flush`.
    pub fn transform_mut(&mut self) -> &mut T {
        &mut self.transform
    }

    /// Formats in effect since the last flush.
    pub fn formats(&self) -> StageFormats {
        self.current
    }
}

impl<T: PcmTransform> AudioProcessor for BaseProcessor<T> {
    fn name(&self) -> &'static str {
        self.transform.name()
    }

    fn configure(
        &mut self,
        input_format: AudioFormat,
    ) -> Result<AudioFormat, UnhandledAudioFormatError> {
        let output = self.transform.on_configure(input_format)?;
        self.pending = StageFormats {
            input: input_format,
            output: output.unwrap_or(AudioFormat::NOT_SET),
        };
        Ok(self.pending.output)
    }

    fn is_active(&self) -> bool {
        self.pending.output.is_set()
    }

    fn queue_input(&mut self, input: &mut &[u8]) {
        assert!(
            !self.input_ended,
            "{}: queue_input after queue_end_of_stream without flush",
            self.transform.name()
        );
        assert!(
            self.current.output.is_set(),
            "{}: queue_input on a stage that is not active",
            self.transform.name()
        );
        if self.output.len() >= self.max_buffered {
            return;
        }

        let frame = self.current.input.bytes_per_frame().unwrap_or(1).max(1);
        let whole = input.len() - input.len() % frame;
        if whole == 0 {
            return;
        }
        let formats = self.current;
        let consumed = self
            .transform
            .transform(&input[..whole], &formats, self.output.write());
        debug_assert!(consumed <= whole);
        *input = &input[consumed..];
    }

    fn queue_end_of_stream(&mut self) {
        if self.input_ended {
            return;
        }
        self.input_ended = true;
        let formats = self.current;
        self.transform.on_end_of_stream(&formats, self.output.write());
    }

    fn get_output(&mut self) -> &mut OutputBuffer {
        &mut self.output
    }

    fn is_ended(&self) -> bool {
        self.input_ended && self.output.is_empty()
    }

    fn flush(&mut self, metadata: StreamMetadata) {
        self.current = self.pending;
        self.output.clear();
        self.input_ended = false;
        if self.current.output.is_set() {
            self.transform.on_flush(metadata);
        }
    }

    fn reset(&mut self) {
        self.flush(StreamMetadata::DEFAULT);
        self.pending = StageFormats {
            input: AudioFormat::NOT_SET,
            output: AudioFormat::NOT_SET,
        };
        self.current = self.pending;
        self.output.release();
        self.transform.on_reset();
    }
}
