//! Output container writers behind the sink.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use cadenza_core::{AudioFormat, Encoding, Format, TrackType};
use hound::{SampleFormat, WavSpec, WavWriter};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ErrorCode, ExportError};

/// Writes accepted samples into an output container.
///
/// Only the sink calls a muxer, and only from the loader's task queue.
pub trait Muxer: Send {
    /// Register a track. Called once per track before any sample.
    fn add_track(&mut self, track: TrackType, format: &Format) -> Result<(), ExportError>;

    /// Whether the next sample for `track` can be written now.
    ///
    /// `false` makes the sink answer `TRY_AGAIN_LATER` without consuming the
    /// sample.
    fn is_ready(&mut self, track: TrackType) -> bool;

    /// Write one sample. `data` is not retained after the call.
    fn write_sample(
        &mut self,
        track: TrackType,
        data: &[u8],
        presentation_time_us: u64,
    ) -> Result<(), ExportError>;

    /// No more samples follow for `track`.
    fn end_track(&mut self, track: TrackType) -> Result<(), ExportError>;

    /// Finalise the output after every track ended.
    fn finish(&mut self) -> Result<(), ExportError>;
}

/// Writes a single PCM audio track to a WAV file with `hound`.
///
/// The file is created when the track is added and finalised on
/// [`Muxer::finish`]. Video tracks are rejected.
pub struct WavMuxer {
    path: PathBuf,
    writer: Option<WavWriter<BufWriter<File>>>,
    encoding: Encoding,
    frames_written: u64,
    channels: u16,
}

impl WavMuxer {
    /// Muxer writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
            encoding: Encoding::Invalid,
            frames_written: 0,
            channels: 0,
        }
    }

    /// Output path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn wav_spec(audio: AudioFormat) -> Option<WavSpec> {
        let (bits_per_sample, sample_format) = match audio.encoding {
            Encoding::Pcm8 => (8, SampleFormat::Int),
            Encoding::Pcm16 => (16, SampleFormat::Int),
            Encoding::Pcm24 => (24, SampleFormat::Int),
            Encoding::Pcm32 => (32, SampleFormat::Int),
            Encoding::PcmFloat => (32, SampleFormat::Float),
            Encoding::Aac | Encoding::Opus | Encoding::Invalid => return None,
        };
        Some(WavSpec {
            channels: audio.channel_count,
            sample_rate: audio.sample_rate,
            bits_per_sample,
            sample_format,
        })
    }
}

impl Muxer for WavMuxer {
    fn add_track(&mut self, track: TrackType, format: &Format) -> Result<(), ExportError> {
        if track != TrackType::Audio {
            return Err(ExportError::new(
                ErrorCode::UnsupportedFormat,
                format!("WAV output cannot hold a {track} track"),
            ));
        }
        if self.writer.is_some() {
            return Err(ExportError::muxing("WAV output holds a single audio track"));
        }
        let spec = AudioFormat::from_format(format)
            .and_then(Self::wav_spec)
            .ok_or_else(|| {
                ExportError::new(
                    ErrorCode::UnsupportedFormat,
                    format!("WAV output cannot hold {format}"),
                )
            })?;
        let writer = WavWriter::create(&self.path, spec)?;
        debug!(path = %self.path.display(), ?spec, "wav output created");
        self.encoding = format.encoding().unwrap_or(Encoding::Invalid);
        self.channels = spec.channels;
        self.writer = Some(writer);
        Ok(())
    }

    fn is_ready(&mut self, _track: TrackType) -> bool {
        true
    }

    fn write_sample(
        &mut self,
        _track: TrackType,
        data: &[u8],
        _presentation_time_us: u64,
    ) -> Result<(), ExportError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ExportError::muxing("sample written before the track was added"))?;
        match self.encoding {
            Encoding::Pcm8 => {
                for &b in data {
                    writer.write_sample((i16::from(b) - 128) as i8)?;
                }
            }
            Encoding::Pcm16 => {
                for s in data.chunks_exact(2) {
                    writer.write_sample(i16::from_le_bytes([s[0], s[1]]))?;
                }
            }
            Encoding::Pcm24 => {
                for s in data.chunks_exact(3) {
                    writer.write_sample(i32::from_le_bytes([0, s[0], s[1], s[2]]) >> 8)?;
                }
            }
            Encoding::Pcm32 => {
                for s in data.chunks_exact(4) {
                    writer.write_sample(i32::from_le_bytes([s[0], s[1], s[2], s[3]]))?;
                }
            }
            Encoding::PcmFloat => {
                for s in data.chunks_exact(4) {
                    writer.write_sample(f32::from_le_bytes([s[0], s[1], s[2], s[3]]))?;
                }
            }
            Encoding::Aac | Encoding::Opus | Encoding::Invalid => {
                return Err(ExportError::muxing(format!(
                    "cannot write {} samples",
                    self.encoding
                )));
            }
        }
        let frame_bytes = self.encoding.bytes_per_sample().unwrap_or(1) * self.channels as usize;
        self.frames_written += (data.len() / frame_bytes.max(1)) as u64;
        Ok(())
    }

    fn end_track(&mut self, _track: TrackType) -> Result<(), ExportError> {
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ExportError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
            info!(
                path = %self.path.display(),
                frames = self.frames_written,
                "wav output finalised"
            );
        }
        Ok(())
    }
}

/// One sample recorded by a [`MemoryMuxer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSample {
    /// Presentation time in microseconds.
    pub presentation_time_us: u64,
    /// Sample bytes; empty when the muxer does not retain data.
    pub data: Vec<u8>,
    /// Size of the sample in bytes.
    pub size: usize,
}

/// A track recorded by a [`MemoryMuxer`].
#[derive(Debug, Clone)]
pub struct RecordedTrack {
    /// Track kind.
    pub track: TrackType,
    /// Format given at `add_track`.
    pub format: Format,
    /// Samples in write order.
    pub samples: Vec<RecordedSample>,
    /// Whether `end_track` was called.
    pub ended: bool,
}

impl RecordedTrack {
    /// Concatenated sample bytes.
    pub fn bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.data.iter().copied()).collect()
    }

    /// Total bytes written, retained or not.
    pub fn total_size(&self) -> usize {
        self.samples.iter().map(|s| s.size).sum()
    }
}

/// Records everything in memory.
///
/// [`stall_next`](Self::stall_next) makes the next readiness checks fail,
/// which lets tests and dry runs exercise backpressure.
#[derive(Debug, Clone)]
pub struct MemoryMuxer {
    tracks: Vec<RecordedTrack>,
    stalls: usize,
    retain_data: bool,
    finished: bool,
}

impl Default for MemoryMuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMuxer {
    /// A muxer keeping sample bytes.
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            stalls: 0,
            retain_data: true,
            finished: false,
        }
    }

    /// Keep only sample sizes and timestamps.
    pub fn without_data(mut self) -> Self {
        self.retain_data = false;
        self
    }

    /// Report not-ready for the next `count` readiness checks.
    pub fn stall_next(&mut self, count: usize) {
        self.stalls = count;
    }

    /// Recorded track of the given kind.
    pub fn track(&self, track: TrackType) -> Option<&RecordedTrack> {
        self.tracks.iter().find(|t| t.track == track)
    }

    /// All recorded tracks.
    pub fn tracks(&self) -> &[RecordedTrack] {
        &self.tracks
    }

    /// Whether `finish` was called.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Serializable overview of what was recorded.
    pub fn summary(&self) -> MuxSummary {
        MuxSummary {
            finished: self.finished,
            tracks: self
                .tracks
                .iter()
                .map(|t| TrackSummary {
                    track: t.track.name(),
                    format: t.format.to_string(),
                    sample_count: t.samples.len(),
                    total_bytes: t.total_size(),
                    first_timestamp_us: t.samples.first().map(|s| s.presentation_time_us),
                    last_timestamp_us: t.samples.last().map(|s| s.presentation_time_us),
                    ended: t.ended,
                })
                .collect(),
        }
    }

    fn track_mut(&mut self, track: TrackType) -> Result<&mut RecordedTrack, ExportError> {
        self.tracks
            .iter_mut()
            .find(|t| t.track == track)
            .ok_or_else(|| ExportError::muxing(format!("no {track} track added")))
    }
}

impl Muxer for MemoryMuxer {
    fn add_track(&mut self, track: TrackType, format: &Format) -> Result<(), ExportError> {
        if self.track(track).is_some() {
            return Err(ExportError::muxing(format!("{track} track added twice")));
        }
        self.tracks.push(RecordedTrack {
            track,
            format: format.clone(),
            samples: Vec::new(),
            ended: false,
        });
        Ok(())
    }

    fn is_ready(&mut self, _track: TrackType) -> bool {
        if self.stalls > 0 {
            self.stalls -= 1;
            return false;
        }
        true
    }

    fn write_sample(
        &mut self,
        track: TrackType,
        data: &[u8],
        presentation_time_us: u64,
    ) -> Result<(), ExportError> {
        let retain = self.retain_data;
        self.track_mut(track)?.samples.push(RecordedSample {
            presentation_time_us,
            data: if retain { data.to_vec() } else { Vec::new() },
            size: data.len(),
        });
        Ok(())
    }

    fn end_track(&mut self, track: TrackType) -> Result<(), ExportError> {
        self.track_mut(track)?.ended = true;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ExportError> {
        self.finished = true;
        Ok(())
    }
}

/// Overview of a [`MemoryMuxer`] recording, written by dry runs.
#[derive(Debug, Clone, Serialize)]
pub struct MuxSummary {
    /// Whether the output was finalised.
    pub finished: bool,
    /// Per-track details.
    pub tracks: Vec<TrackSummary>,
}

/// One track of a [`MuxSummary`].
#[derive(Debug, Clone, Serialize)]
pub struct TrackSummary {
    /// `audio` or `video`.
    pub track: &'static str,
    /// Human-readable format.
    pub format: String,
    /// Number of samples.
    pub sample_count: usize,
    /// Bytes across all samples.
    pub total_bytes: usize,
    /// First presentation time.
    pub first_timestamp_us: Option<u64>,
    /// Last presentation time.
    pub last_timestamp_us: Option<u64>,
    /// Whether the track ended.
    pub ended: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo16() -> Format {
        Format::from_audio_format(AudioFormat::new(8000, 2, Encoding::Pcm16))
    }

    #[test]
    fn wav_muxer_writes_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let mut muxer = WavMuxer::new(&path);
        muxer.add_track(TrackType::Audio, &stereo16()).unwrap();

        let samples: Vec<u8> = [1i16, -1, 300, -300]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        muxer.write_sample(TrackType::Audio, &samples, 0).unwrap();
        muxer.finish().unwrap();
        assert_eq!(muxer.frames_written(), 2);

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 8000);
        let read: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(read, vec![1, -1, 300, -300]);
    }

    #[test]
    fn wav_muxer_rejects_video() {
        let dir = tempfile::tempdir().unwrap();
        let mut muxer = WavMuxer::new(dir.path().join("out.wav"));
        let video = Format::builder()
            .sample_mime_type(cadenza_core::mime::IMAGE_RAW)
            .width(4)
            .height(4)
            .build();
        let err = muxer.add_track(TrackType::Video, &video).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnsupportedFormat);
    }

    #[test]
    fn memory_muxer_stalls_then_records() {
        let mut muxer = MemoryMuxer::new();
        muxer.add_track(TrackType::Audio, &stereo16()).unwrap();
        muxer.stall_next(2);
        assert!(!muxer.is_ready(TrackType::Audio));
        assert!(!muxer.is_ready(TrackType::Audio));
        assert!(muxer.is_ready(TrackType::Audio));

        muxer.write_sample(TrackType::Audio, &[1, 2, 3, 4], 0).unwrap();
        muxer.end_track(TrackType::Audio).unwrap();
        muxer.finish().unwrap();

        let summary = muxer.summary();
        assert!(summary.finished);
        assert_eq!(summary.tracks[0].sample_count, 1);
        assert_eq!(summary.tracks[0].total_bytes, 4);
        assert!(summary.tracks[0].ended);
    }

    #[test]
    fn memory_muxer_without_data_keeps_sizes() {
        let mut muxer = MemoryMuxer::new().without_data();
        muxer.add_track(TrackType::Audio, &stereo16()).unwrap();
        muxer.write_sample(TrackType::Audio, &[0; 8], 125).unwrap();
        let track = muxer.track(TrackType::Audio).unwrap();
        assert!(track.bytes().is_empty());
        assert_eq!(track.total_size(), 8);
    }
}
