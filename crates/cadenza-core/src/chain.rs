//! Ordered composition of [`AudioProcessor`] stages.
//!
//! A [`ProcessingChain`] routes the output of each active stage into the next
//! active stage. Inactive stages are skipped entirely; when no stage is active
//! the chain is in full bypass and [`ProcessingChain::process_buffer`] hands
//! the caller's bytes straight back without copying.
//!
//! Every call performs at most one pass over the active stages. Callers that
//! want everything processed at once use [`ProcessingChain::process_buffer`]
//! and [`ProcessingChain::drain_end_of_stream`], which loop until a pass makes
//! no progress.

use std::borrow::Cow;
use std::fmt;

use crate::buffer::OutputBuffer;
use crate::error::UnhandledAudioFormatError;
use crate::format::AudioFormat;
use crate::processor::AudioProcessor;
use crate::stream::StreamMetadata;

#[cfg(feature = "tracing")]
use tracing::debug;

/// A sequence of processing stages with one effective input/output format.
///
/// # Lifecycle
///
/// Mirrors the single stage contract: [`configure`](Self::configure) declares
/// the format that takes effect at the next [`flush`](Self::flush), then input
/// is queued and output read until [`is_ended`](Self::is_ended).
///
/// # Example
///
/// ```rust
/// use cadenza_core::{AudioFormat, Encoding, ProcessingChain, StreamMetadata};
/// use cadenza_core::processors::{gain, to_float_pcm};
///
/// let mut chain = ProcessingChain::new();
/// chain.push(Box::new(to_float_pcm()));
/// chain.push(Box::new(gain(0.5)));
///
/// let output = chain
///     .configure(AudioFormat::new(48000, 2, Encoding::Pcm16))
///     .unwrap();
/// assert_eq!(output.encoding, Encoding::PcmFloat);
/// chain.flush(StreamMetadata::DEFAULT);
/// assert!(chain.is_operational());
/// ```
pub struct ProcessingChain {
    stages: Vec<Box<dyn AudioProcessor>>,
    /// Indices into `stages` of the stages active since the last flush.
    active: Vec<usize>,
    /// Input each stage accepted at the last successful configure.
    stage_inputs: Vec<AudioFormat>,
    pending_input: AudioFormat,
    pending_output: AudioFormat,
    input_format: AudioFormat,
    output_format: AudioFormat,
    input_ended: bool,
    /// Always empty; returned while the chain is bypassed.
    bypass_output: OutputBuffer,
}

impl Default for ProcessingChain {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProcessingChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingChain")
            .field("stages", &self.stage_names())
            .field("active", &self.active)
            .field("input_format", &self.input_format)
            .field("output_format", &self.output_format)
            .field("input_ended", &self.input_ended)
            .finish()
    }
}

impl ProcessingChain {
    /// An empty chain. Bypassed until stages are added and configured.
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            active: Vec::new(),
            stage_inputs: Vec::new(),
            pending_input: AudioFormat::NOT_SET,
            pending_output: AudioFormat::NOT_SET,
            input_format: AudioFormat::NOT_SET,
            output_format: AudioFormat::NOT_SET,
            input_ended: false,
            bypass_output: OutputBuffer::new(),
        }
    }

    /// Build a chain from stages in processing order.
    pub fn from_stages(stages: Vec<Box<dyn AudioProcessor>>) -> Self {
        Self {
            stage_inputs: vec![AudioFormat::NOT_SET; stages.len()],
            stages,
            ..Self::new()
        }
    }

    /// Append a stage. It joins the data path at the next configure + flush.
    pub fn push(&mut self, stage: Box<dyn AudioProcessor>) {
        self.stages.push(stage);
        self.stage_inputs.push(AudioFormat::NOT_SET);
    }

    /// Number of stages, active or not.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the chain has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in processing order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Names of the stages active since the last flush.
    pub fn active_stage_names(&self) -> Vec<&'static str> {
        self.active.iter().map(|&i| self.stages[i].name()).collect()
    }

    /// Configure every stage in order, feeding each active stage's output
    /// format to the next.
    ///
    /// Returns the effective output format: that of the last active stage,
    /// or `input_format` itself when no stage is active. If any stage rejects
    /// its input, the stages walked so far get their previous pending
    /// configuration back and the error is returned. Data flowing under the
    /// configuration of the last flush is unaffected either way.
    pub fn configure(
        &mut self,
        input_format: AudioFormat,
    ) -> Result<AudioFormat, UnhandledAudioFormatError> {
        let mut format = input_format;
        let mut inputs = Vec::with_capacity(self.stages.len());
        for index in 0..self.stages.len() {
            match self.stages[index].configure(format) {
                Ok(output) => {
                    inputs.push(format);
                    if output.is_set() {
                        format = output;
                    }
                }
                Err(err) => {
                    #[cfg(feature = "tracing")]
                    debug!(stage = self.stages[index].name(), %err, "chain configure rejected");
                    self.restore_pending(index);
                    return Err(err);
                }
            }
        }
        self.stage_inputs = inputs;
        self.pending_input = input_format;
        self.pending_output = format;

        #[cfg(feature = "tracing")]
        debug!(input = %input_format, output = %format, "chain configured");

        Ok(format)
    }

    /// Put the pending configuration of `stages[..walked]` back to what the
    /// last successful configure left.
    fn restore_pending(&mut self, walked: usize) {
        for (index, stage) in self.stages[..walked].iter_mut().enumerate() {
            let previous = self
                .stage_inputs
                .get(index)
                .copied()
                .unwrap_or(AudioFormat::NOT_SET);
            if previous.is_set() {
                // Accepted before, so accepted again.
                let _ = stage.configure(previous);
            } else if !self.active.contains(&index) {
                stage.reset();
            }
        }
    }

    /// Discard buffered data in every stage and switch to the pending
    /// configuration.
    pub fn flush(&mut self, metadata: StreamMetadata) {
        for stage in &mut self.stages {
            stage.flush(metadata);
        }
        self.active = self
            .stages
            .iter()
            .enumerate()
            .filter(|(_, stage)| stage.is_active())
            .map(|(index, _)| index)
            .collect();
        self.input_format = self.pending_input;
        self.output_format = self.pending_output;
        self.input_ended = false;

        #[cfg(feature = "tracing")]
        debug!(
            active = ?self.active_stage_names(),
            offset_us = metadata.position_offset_us(),
            "chain flushed"
        );
    }

    /// Whether at least one stage transforms data.
    ///
    /// When `false`, queued input is not consumed and callers should pass
    /// their data through unchanged.
    pub fn is_operational(&self) -> bool {
        !self.active.is_empty()
    }

    /// Input format in effect since the last flush.
    pub fn input_format(&self) -> AudioFormat {
        self.input_format
    }

    /// Output format in effect since the last flush.
    pub fn output_format(&self) -> AudioFormat {
        self.output_format
    }

    /// Queue input into the first active stage and run one pass.
    ///
    /// Advances `input` past what was consumed. Does nothing when the chain
    /// is bypassed or end of stream has been queued.
    pub fn queue_input(&mut self, input: &mut &[u8]) {
        if !self.is_operational() || self.input_ended {
            return;
        }
        self.stages[self.active[0]].queue_input(input);
        self.process_data();
    }

    /// Run one pass and return the last active stage's output.
    ///
    /// Always empty while bypassed.
    pub fn get_output(&mut self) -> &mut OutputBuffer {
        let Some(&last) = self.active.last() else {
            return &mut self.bypass_output;
        };
        self.process_data();
        self.stages[last].get_output()
    }

    /// Signal end of stream to the first active stage. Idempotent.
    pub fn queue_end_of_stream(&mut self) {
        if self.input_ended {
            return;
        }
        self.input_ended = true;
        if let Some(&first) = self.active.first() {
            self.stages[first].queue_end_of_stream();
            self.process_data();
        }
    }

    /// Whether end of stream reached the last active stage and its output was
    /// read.
    pub fn is_ended(&self) -> bool {
        match self.active.last() {
            Some(&last) => self.stages[last].is_ended(),
            None => self.input_ended,
        }
    }

    /// Process a whole buffer, returning everything the chain produced.
    ///
    /// While bypassed the input is returned by reference, byte for byte.
    /// Stages that hold data back (a resampler's last frame, for instance)
    /// release it on [`drain_end_of_stream`](Self::drain_end_of_stream).
    /// A trailing partial frame is not consumed.
    pub fn process_buffer<'a>(&mut self, input: &'a [u8]) -> Cow<'a, [u8]> {
        if !self.is_operational() {
            return Cow::Borrowed(input);
        }
        let mut produced = Vec::new();
        let mut view = input;
        loop {
            let before = view.len();
            if !self.input_ended {
                self.stages[self.active[0]].queue_input(&mut view);
            }
            let mut progressed = self.process_data() || view.len() != before;
            let output = self.last_output();
            if output.has_remaining() {
                produced.extend_from_slice(output.remaining());
                output.clear();
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
        Cow::Owned(produced)
    }

    /// Queue end of stream and collect every remaining output byte.
    pub fn drain_end_of_stream(&mut self) -> Vec<u8> {
        self.queue_end_of_stream();
        let mut produced = Vec::new();
        if !self.is_operational() {
            return produced;
        }
        loop {
            let progressed = self.process_data();
            let output = self.last_output();
            let had_output = output.has_remaining();
            produced.extend_from_slice(output.remaining());
            output.clear();
            if self.is_ended() || (!progressed && !had_output) {
                break;
            }
        }
        produced
    }

    /// Reset every stage and forget all configuration.
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
        self.active.clear();
        self.stage_inputs.fill(AudioFormat::NOT_SET);
        self.pending_input = AudioFormat::NOT_SET;
        self.pending_output = AudioFormat::NOT_SET;
        self.input_format = AudioFormat::NOT_SET;
        self.output_format = AudioFormat::NOT_SET;
        self.input_ended = false;
    }

    fn last_output(&mut self) -> &mut OutputBuffer {
        match self.active.last() {
            Some(&last) => self.stages[last].get_output(),
            None => &mut self.bypass_output,
        }
    }

    /// One pass moving each active stage's unread output into the next one.
    ///
    /// End of stream moves downstream once a stage has ended. Returns whether
    /// any bytes moved or the last stage has output waiting.
    fn process_data(&mut self) -> bool {
        let mut progressed = false;
        for pair in 1..self.active.len() {
            let (upstream, downstream) =
                two_mut(&mut self.stages, self.active[pair - 1], self.active[pair]);

            let buffered = upstream.get_output();
            if buffered.has_remaining() {
                let remaining = buffered.remaining();
                let mut view = remaining;
                downstream.queue_input(&mut view);
                let taken = remaining.len() - view.len();
                buffered.consume(taken);
                progressed |= taken > 0;
            }

            if upstream.is_ended() {
                downstream.queue_end_of_stream();
            }
        }
        progressed || self.last_output().has_remaining()
    }
}

/// Mutable references to two distinct elements, `first < second`.
fn two_mut<T>(items: &mut [T], first: usize, second: usize) -> (&mut T, &mut T) {
    debug_assert!(first < second);
    let (head, tail) = items.split_at_mut(second);
    (&mut head[first], &mut tail[0])
}
