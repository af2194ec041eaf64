//! Sink side of the export handshake.
//!
//! A producer obtains a [`SharedSink`] through
//! [`AssetLoaderListener::on_output_format`](crate::AssetLoaderListener::on_output_format)
//! and then pushes samples into it. Every queue call answers with an
//! [`InputResult`]:
//!
//! | result | meaning |
//! |--------|---------|
//! | `Success` | sample accepted, the buffer is not retained |
//! | `TryAgainLater` | nothing consumed, re-issue the identical call later |
//! | `EndOfStream` | track closed, stop feeding it |
//!
//! [`SinkHandshake`] is the stock implementation. It attaches each track once
//! with a fixed [`Format`], forwards accepted samples to a [`Muxer`], and
//! finalises the muxer once every expected track has signalled end of input.

use std::sync::Arc;

use cadenza_core::{Format, TrackType};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::bitmap::Bitmap;
use crate::error::{ErrorCode, ExportError};
use crate::listener::ExportEvent;
use crate::muxer::Muxer;
use crate::timestamps::ConstantRateTimestamps;

/// Outcome of a queue call on a [`SampleConsumer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum InputResult {
    /// The sample was consumed.
    Success = 0,
    /// Nothing was consumed; retry with the same input.
    TryAgainLater = 1,
    /// The track takes no more input.
    EndOfStream = 2,
}

/// A raw queue result that is not one of the three known values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown sample consumer input result {0}")]
pub struct UnknownInputResult(pub i32);

impl InputResult {
    /// Numeric value of the result.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Decode a numeric result.
    ///
    /// Callers crossing a numeric boundary must treat an error here as a fatal
    /// consistency failure.
    pub const fn from_code(code: i32) -> Result<Self, UnknownInputResult> {
        match code {
            0 => Ok(InputResult::Success),
            1 => Ok(InputResult::TryAgainLater),
            2 => Ok(InputResult::EndOfStream),
            other => Err(UnknownInputResult(other)),
        }
    }
}

/// Accepts samples for one or more tracks.
///
/// Only the producer's task queue calls these methods. Buffers passed in are
/// never retained past the call.
pub trait SampleConsumer: Send {
    /// Queue a still image, shown once at every timestamp in `timestamps`.
    ///
    /// The whole run is accepted or refused as a unit.
    fn queue_bitmap(
        &mut self,
        bitmap: &Bitmap,
        timestamps: &ConstantRateTimestamps,
    ) -> Result<InputResult, ExportError>;

    /// Queue a buffer of interleaved PCM audio starting at
    /// `presentation_time_us`.
    fn queue_audio(
        &mut self,
        data: &[u8],
        presentation_time_us: u64,
    ) -> Result<InputResult, ExportError>;

    /// No more input follows for `track`. Repeated calls are no-ops.
    fn signal_end_of_input(&mut self, track: TrackType) -> Result<(), ExportError>;
}

/// A sink shared between the producer and the muxing side.
pub type SharedSink = Arc<Mutex<dyn SampleConsumer>>;

#[derive(Debug)]
struct TrackSlot {
    track: TrackType,
    format: Format,
    last_timestamp_us: Option<u64>,
    samples: u64,
    ended: bool,
}

/// Format-checked, backpressure-aware sink in front of a [`Muxer`].
///
/// Each track moves from unattached to attached (with one fixed format) to
/// ended. Queueing on an unattached track, or with timestamps that do not
/// strictly increase, is a sequencing violation and panics.
pub struct SinkHandshake<M> {
    muxer: M,
    expected_tracks: usize,
    tracks: Vec<TrackSlot>,
    events: Option<Sender<ExportEvent>>,
    finished: bool,
}

impl<M: Muxer> SinkHandshake<M> {
    /// A sink expecting a single track.
    pub fn new(muxer: M) -> Self {
        Self {
            muxer,
            expected_tracks: 1,
            tracks: Vec::new(),
            events: None,
            finished: false,
        }
    }

    /// Report track ends and completion on `events`.
    pub fn with_events(mut self, events: Sender<ExportEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Number of tracks that must end before the muxer is finalised.
    pub fn set_expected_tracks(&mut self, count: usize) {
        self.expected_tracks = count.max(1);
    }

    /// Attach the track that `format` describes.
    ///
    /// Attaching again with an equal format is a no-op. A different format
    /// for an attached track fails: negotiation is one-shot.
    pub fn attach(&mut self, format: &Format) -> Result<TrackType, ExportError> {
        let track = format.track_type().ok_or_else(|| {
            ExportError::new(
                ErrorCode::UnsupportedFormat,
                format!("no track type for {format}"),
            )
        })?;
        if let Some(slot) = self.slot(track) {
            if slot.format == *format {
                return Ok(track);
            }
            return Err(ExportError::new(
                ErrorCode::FailedRuntimeCheck,
                format!(
                    "{track} track already attached with {}, cannot switch to {format}",
                    slot.format
                ),
            ));
        }
        self.muxer.add_track(track, format)?;
        info!(%track, %format, "track attached");
        self.tracks.push(TrackSlot {
            track,
            format: format.clone(),
            last_timestamp_us: None,
            samples: 0,
            ended: false,
        });
        Ok(track)
    }

    /// Whether `track` has been attached.
    pub fn is_attached(&self, track: TrackType) -> bool {
        self.slot(track).is_some()
    }

    /// Whether every expected track has been attached.
    pub fn is_ready(&self) -> bool {
        self.tracks.len() >= self.expected_tracks
    }

    /// Format agreed for `track`.
    pub fn format(&self, track: TrackType) -> Option<&Format> {
        self.slot(track).map(|slot| &slot.format)
    }

    /// Number of accepted samples for `track`.
    pub fn sample_count(&self, track: TrackType) -> u64 {
        self.slot(track).map_or(0, |slot| slot.samples)
    }

    /// Whether every expected track ended and the muxer was finalised.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The wrapped muxer.
    pub fn muxer(&self) -> &M {
        &self.muxer
    }

    /// The wrapped muxer, mutably.
    pub fn muxer_mut(&mut self) -> &mut M {
        &mut self.muxer
    }

    /// Consume the sink and return the muxer.
    pub fn into_muxer(self) -> M {
        self.muxer
    }

    fn slot(&self, track: TrackType) -> Option<&TrackSlot> {
        self.tracks.iter().find(|slot| slot.track == track)
    }

    fn attached_slot(&mut self, track: TrackType) -> &mut TrackSlot {
        let Some(slot) = self.tracks.iter_mut().find(|slot| slot.track == track) else {
            panic!("{track} sample queued before the track was attached");
        };
        slot
    }

    fn emit(&self, event: ExportEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is listening any more.
            let _ = events.send(event);
        }
    }
}

impl<M: Muxer> SampleConsumer for SinkHandshake<M> {
    fn queue_bitmap(
        &mut self,
        bitmap: &Bitmap,
        timestamps: &ConstantRateTimestamps,
    ) -> Result<InputResult, ExportError> {
        let slot = self.attached_slot(TrackType::Video);
        if slot.ended {
            return Ok(InputResult::EndOfStream);
        }
        let last = slot.last_timestamp_us;
        if !self.muxer.is_ready(TrackType::Video) {
            return Ok(InputResult::TryAgainLater);
        }

        let mut previous = last;
        let mut written = 0u64;
        for timestamp_us in timestamps.clone() {
            assert!(
                previous.is_none_or(|p| timestamp_us > p),
                "video timestamp {timestamp_us} us does not follow {previous:?}"
            );
            self.muxer
                .write_sample(TrackType::Video, bitmap.as_rgba(), timestamp_us)?;
            // Counted per frame so a failed write leaves the slot matching the muxer.
            let slot = self.attached_slot(TrackType::Video);
            slot.last_timestamp_us = Some(timestamp_us);
            slot.samples += 1;
            previous = Some(timestamp_us);
            written += 1;
        }
        debug!(frames = written, "bitmap queued");
        Ok(InputResult::Success)
    }

    fn queue_audio(
        &mut self,
        data: &[u8],
        presentation_time_us: u64,
    ) -> Result<InputResult, ExportError> {
        let slot = self.attached_slot(TrackType::Audio);
        if slot.ended {
            return Ok(InputResult::EndOfStream);
        }
        assert!(
            slot.last_timestamp_us
                .is_none_or(|last| presentation_time_us > last),
            "audio timestamp {presentation_time_us} us does not follow {:?}",
            slot.last_timestamp_us
        );
        if !self.muxer.is_ready(TrackType::Audio) {
            return Ok(InputResult::TryAgainLater);
        }
        self.muxer
            .write_sample(TrackType::Audio, data, presentation_time_us)?;
        let slot = self.attached_slot(TrackType::Audio);
        slot.last_timestamp_us = Some(presentation_time_us);
        slot.samples += 1;
        Ok(InputResult::Success)
    }

    fn signal_end_of_input(&mut self, track: TrackType) -> Result<(), ExportError> {
        let slot = self.attached_slot(track);
        if slot.ended {
            warn!(%track, "end of input signalled again, ignoring");
            return Ok(());
        }
        slot.ended = true;
        let samples = slot.samples;
        self.muxer.end_track(track)?;
        info!(%track, samples, "track ended");
        self.emit(ExportEvent::TrackEnded(track));

        let all_ended = self.is_ready() && self.tracks.iter().all(|slot| slot.ended);
        if all_ended && !self.finished {
            self.muxer.finish()?;
            self.finished = true;
            info!("export finished");
            self.emit(ExportEvent::Completed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::muxer::MemoryMuxer;
    use cadenza_core::{AudioFormat, Encoding, mime};

    fn audio_format() -> Format {
        Format::from_audio_format(AudioFormat::new(48000, 2, Encoding::Pcm16))
    }

    fn image_format() -> Format {
        Format::builder()
            .sample_mime_type(mime::IMAGE_RAW)
            .width(2)
            .height(2)
            .frame_rate(30.0)
            .build()
    }

    #[test]
    fn input_result_codes() {
        for result in [
            InputResult::Success,
            InputResult::TryAgainLater,
            InputResult::EndOfStream,
        ] {
            assert_eq!(InputResult::from_code(result.code()), Ok(result));
        }
        assert_eq!(InputResult::from_code(7), Err(UnknownInputResult(7)));
    }

    #[test]
    fn attach_is_one_shot() {
        let mut sink = SinkHandshake::new(MemoryMuxer::new());
        assert_eq!(sink.attach(&audio_format()).unwrap(), TrackType::Audio);
        assert_eq!(sink.attach(&audio_format()).unwrap(), TrackType::Audio);

        let mono = audio_format().build_upon().channel_count(1).build();
        let err = sink.attach(&mono).unwrap_err();
        assert_eq!(err.code(), ErrorCode::FailedRuntimeCheck);
        assert_eq!(sink.muxer().tracks().len(), 1);
    }

    #[test]
    fn attach_rejects_unknown_track_type() {
        let mut sink = SinkHandshake::new(MemoryMuxer::new());
        let text = Format::builder().sample_mime_type("text/vtt").build();
        assert_eq!(
            sink.attach(&text).unwrap_err().code(),
            ErrorCode::UnsupportedFormat
        );
    }

    #[test]
    fn backpressure_consumes_nothing() {
        let mut sink = SinkHandshake::new(MemoryMuxer::new());
        sink.attach(&audio_format()).unwrap();
        sink.muxer_mut().stall_next(1);

        let data = [1u8, 2, 3, 4];
        assert_eq!(
            sink.queue_audio(&data, 0).unwrap(),
            InputResult::TryAgainLater
        );
        assert_eq!(sink.sample_count(TrackType::Audio), 0);
        assert_eq!(sink.queue_audio(&data, 0).unwrap(), InputResult::Success);
        assert_eq!(sink.sample_count(TrackType::Audio), 1);
    }

    #[test]
    fn bitmap_written_once_per_timestamp() {
        let mut sink = SinkHandshake::new(MemoryMuxer::new().without_data());
        sink.attach(&image_format()).unwrap();
        let bitmap = Bitmap::solid(2, 2, [255, 0, 0, 255]);
        let timestamps = ConstantRateTimestamps::new(1_000_000, 30.0);
        assert_eq!(
            sink.queue_bitmap(&bitmap, &timestamps).unwrap(),
            InputResult::Success
        );
        let track = sink.muxer().track(TrackType::Video).unwrap();
        assert_eq!(track.samples.len(), 30);
        assert_eq!(track.total_size(), 30 * 16);
    }

    /// Records like [`MemoryMuxer`] but fails every write after `budget`.
    struct FailingMuxer {
        inner: MemoryMuxer,
        budget: usize,
    }

    impl Muxer for FailingMuxer {
        fn add_track(&mut self, track: TrackType, format: &Format) -> Result<(), ExportError> {
            self.inner.add_track(track, format)
        }

        fn is_ready(&mut self, track: TrackType) -> bool {
            self.inner.is_ready(track)
        }

        fn write_sample(
            &mut self,
            track: TrackType,
            data: &[u8],
            presentation_time_us: u64,
        ) -> Result<(), ExportError> {
            if self.budget == 0 {
                return Err(ExportError::new(ErrorCode::MuxingFailed, "disk full"));
            }
            self.budget -= 1;
            self.inner.write_sample(track, data, presentation_time_us)
        }

        fn end_track(&mut self, track: TrackType) -> Result<(), ExportError> {
            self.inner.end_track(track)
        }

        fn finish(&mut self) -> Result<(), ExportError> {
            self.inner.finish()
        }
    }

    #[test]
    fn failed_bitmap_write_keeps_count_in_step_with_muxer() {
        let muxer = FailingMuxer {
            inner: MemoryMuxer::new().without_data(),
            budget: 4,
        };
        let mut sink = SinkHandshake::new(muxer);
        sink.attach(&image_format()).unwrap();
        let bitmap = Bitmap::solid(2, 2, [0, 0, 255, 255]);
        let timestamps = ConstantRateTimestamps::new(1_000_000, 30.0);

        let err = sink.queue_bitmap(&bitmap, &timestamps).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MuxingFailed);
        let written = sink.muxer().inner.track(TrackType::Video).unwrap().samples.len();
        assert_eq!(written, 4);
        assert_eq!(sink.sample_count(TrackType::Video), 4);
    }

    #[test]
    fn end_of_input_is_idempotent() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut sink = SinkHandshake::new(MemoryMuxer::new()).with_events(tx);
        sink.attach(&audio_format()).unwrap();
        sink.queue_audio(&[0; 4], 0).unwrap();

        sink.signal_end_of_input(TrackType::Audio).unwrap();
        sink.signal_end_of_input(TrackType::Audio).unwrap();
        assert!(sink.is_finished());
        assert_eq!(
            sink.queue_audio(&[0; 4], 10).unwrap(),
            InputResult::EndOfStream
        );

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ExportEvent::TrackEnded(TrackType::Audio)));
        assert!(matches!(events[1], ExportEvent::Completed));
    }

    #[test]
    fn waits_for_every_expected_track() {
        let mut sink = SinkHandshake::new(MemoryMuxer::new());
        sink.set_expected_tracks(2);
        sink.attach(&audio_format()).unwrap();
        sink.signal_end_of_input(TrackType::Audio).unwrap();
        assert!(!sink.is_finished());

        sink.attach(&image_format()).unwrap();
        sink.signal_end_of_input(TrackType::Video).unwrap();
        assert!(sink.is_finished());
        assert!(sink.muxer().is_finished());
    }

    #[test]
    #[should_panic(expected = "before the track was attached")]
    fn queue_before_attach_panics() {
        let mut sink = SinkHandshake::new(MemoryMuxer::new());
        let _ = sink.queue_audio(&[0; 4], 0);
    }

    #[test]
    #[should_panic(expected = "does not follow")]
    fn non_increasing_timestamps_panic() {
        let mut sink = SinkHandshake::new(MemoryMuxer::new());
        sink.attach(&audio_format()).unwrap();
        sink.queue_audio(&[0; 4], 100).unwrap();
        let _ = sink.queue_audio(&[0; 4], 100);
    }
}
