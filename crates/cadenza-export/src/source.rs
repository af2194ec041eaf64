//! PCM audio producers for the audio asset loader.
//!
//! An [`AudioSource`] hands out interleaved little-endian frames in its own
//! [`AudioFormat`]. Sources are read on the loader's task queue, in chunks.

use std::f64::consts::TAU;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use cadenza_core::{AudioFormat, Encoding};
use hound::{SampleFormat, WavReader};

use crate::error::{ErrorCode, ExportError};

/// A finite stream of PCM frames.
pub trait AudioSource: Send {
    /// Layout of the frames this source produces.
    fn format(&self) -> AudioFormat;

    /// Total number of frames in the stream.
    fn total_frames(&self) -> u64;

    /// Stream duration in microseconds.
    fn duration_us(&self) -> u64 {
        self.format().frames_to_duration_us(self.total_frames())
    }

    /// Replace the contents of `out` with up to `max_frames` frames.
    ///
    /// Returns the number of frames read; 0 means the stream is exhausted.
    fn read_frames(&mut self, max_frames: usize, out: &mut Vec<u8>) -> Result<usize, ExportError>;
}

/// Frames read from a WAV file with `hound`, in the file's own encoding.
///
/// 8-bit files come out as unsigned PCM, like the format itself.
pub struct WavSource {
    reader: WavReader<BufReader<File>>,
    format: AudioFormat,
    total_frames: u64,
    frames_read: u64,
}

impl WavSource {
    /// Open the WAV file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ExportError> {
        let reader = WavReader::open(path.as_ref())?;
        let spec = reader.spec();
        let encoding = Encoding::from_bits_per_sample(
            spec.bits_per_sample,
            spec.sample_format == SampleFormat::Float,
        );
        if encoding == Encoding::Invalid || spec.channels == 0 {
            return Err(ExportError::new(
                ErrorCode::DecodingFormatUnsupported,
                format!(
                    "{}: {} channel {}-bit {:?} WAV is not supported",
                    path.as_ref().display(),
                    spec.channels,
                    spec.bits_per_sample,
                    spec.sample_format
                ),
            ));
        }
        Ok(Self {
            total_frames: u64::from(reader.duration()),
            format: AudioFormat::new(spec.sample_rate, spec.channels, encoding),
            reader,
            frames_read: 0,
        })
    }
}

impl AudioSource for WavSource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn total_frames(&self) -> u64 {
        self.total_frames
    }

    fn read_frames(&mut self, max_frames: usize, out: &mut Vec<u8>) -> Result<usize, ExportError> {
        out.clear();
        let remaining = self.total_frames - self.frames_read;
        let frames = (max_frames as u64).min(remaining) as usize;
        let samples = frames * self.format.channel_count as usize;

        if self.format.encoding == Encoding::PcmFloat {
            for sample in self.reader.samples::<f32>().take(samples) {
                out.extend_from_slice(&sample?.to_le_bytes());
            }
        } else {
            for sample in self.reader.samples::<i32>().take(samples) {
                let sample = sample?;
                match self.format.encoding {
                    Encoding::Pcm8 => out.push((sample + 128) as u8),
                    Encoding::Pcm16 => out.extend_from_slice(&(sample as i16).to_le_bytes()),
                    Encoding::Pcm24 => out.extend_from_slice(&sample.to_le_bytes()[..3]),
                    _ => out.extend_from_slice(&sample.to_le_bytes()),
                }
            }
        }
        self.frames_read += frames as u64;
        Ok(frames)
    }
}

/// A sine tone in 32-bit float PCM at half amplitude.
#[derive(Debug, Clone)]
pub struct ToneSource {
    format: AudioFormat,
    frequency_hz: f64,
    total_frames: u64,
    position: u64,
}

impl ToneSource {
    /// A tone of `frequency_hz` lasting `duration_us`.
    pub fn new(frequency_hz: f64, duration_us: u64, sample_rate: u32, channel_count: u16) -> Self {
        let format = AudioFormat::new(sample_rate, channel_count, Encoding::PcmFloat);
        Self {
            format,
            frequency_hz,
            total_frames: format.duration_us_to_frames(duration_us),
            position: 0,
        }
    }
}

impl AudioSource for ToneSource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn total_frames(&self) -> u64 {
        self.total_frames
    }

    fn read_frames(&mut self, max_frames: usize, out: &mut Vec<u8>) -> Result<usize, ExportError> {
        out.clear();
        let frames = (max_frames as u64).min(self.total_frames - self.position) as usize;
        let step = TAU * self.frequency_hz / f64::from(self.format.sample_rate);
        for i in 0..frames as u64 {
            let value = (0.5 * ((self.position + i) as f64 * step).sin()) as f32;
            for _ in 0..self.format.channel_count {
                out.extend_from_slice(&value.to_le_bytes());
            }
        }
        self.position += frames as u64;
        Ok(frames)
    }
}

/// Digital silence in 16-bit PCM.
#[derive(Debug, Clone)]
pub struct SilenceSource {
    format: AudioFormat,
    total_frames: u64,
    position: u64,
}

impl SilenceSource {
    /// Silence lasting `duration_us`.
    pub fn new(duration_us: u64, sample_rate: u32, channel_count: u16) -> Self {
        let format = AudioFormat::new(sample_rate, channel_count, Encoding::Pcm16);
        Self {
            format,
            total_frames: format.duration_us_to_frames(duration_us),
            position: 0,
        }
    }
}

impl AudioSource for SilenceSource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn total_frames(&self) -> u64 {
        self.total_frames
    }

    fn read_frames(&mut self, max_frames: usize, out: &mut Vec<u8>) -> Result<usize, ExportError> {
        out.clear();
        let frames = (max_frames as u64).min(self.total_frames - self.position) as usize;
        out.resize(frames * self.format.bytes_per_frame().unwrap_or(0), 0);
        self.position += frames as u64;
        Ok(frames)
    }
}
