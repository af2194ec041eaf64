//! Stream format model.
//!
//! Two value types describe what flows through the pipeline:
//!
//! - [`Format`] describes a whole track (audio, video, or still image) as the
//!   producer announces it to the sink. It is immutable and built through
//!   [`FormatBuilder`], which copies an existing format and overrides fields.
//! - [`AudioFormat`] describes the physical layout of a raw audio buffer
//!   (sample rate, channel count, encoding). It is what processing stages
//!   negotiate with each other.
//!
//! Neither type carries behavior beyond derived quantities such as
//! [`AudioFormat::bytes_per_frame`].

use core::fmt;

/// MIME types used by the built-in sources and sinks.
pub mod mime {
    /// Raw (decoded) PCM audio.
    pub const AUDIO_RAW: &str = "audio/raw";
    /// Raw (decoded) video frames.
    pub const VIDEO_RAW: &str = "video/raw";
    /// Raw (decoded) still image, repeated as video frames.
    pub const IMAGE_RAW: &str = "image/raw";
    /// AAC audio.
    pub const AUDIO_AAC: &str = "audio/mp4a-latm";
    /// Opus audio.
    pub const AUDIO_OPUS: &str = "audio/opus";
}

/// Sample encoding of an audio stream.
///
/// PCM variants are little-endian, interleaved. Compressed variants only tag
/// the stream; they have no frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Unsigned 8-bit PCM.
    Pcm8,
    /// Signed 16-bit PCM.
    Pcm16,
    /// Signed 24-bit packed PCM.
    Pcm24,
    /// Signed 32-bit PCM.
    Pcm32,
    /// 32-bit IEEE float PCM.
    PcmFloat,
    /// AAC bitstream.
    Aac,
    /// Opus bitstream.
    Opus,
    /// No valid encoding.
    Invalid,
}

impl Encoding {
    /// Whether this is a linear PCM encoding.
    pub const fn is_pcm(self) -> bool {
        matches!(
            self,
            Encoding::Pcm8 | Encoding::Pcm16 | Encoding::Pcm24 | Encoding::Pcm32 | Encoding::PcmFloat
        )
    }

    /// Bytes per sample for PCM encodings, `None` otherwise.
    pub const fn bytes_per_sample(self) -> Option<usize> {
        match self {
            Encoding::Pcm8 => Some(1),
            Encoding::Pcm16 => Some(2),
            Encoding::Pcm24 => Some(3),
            Encoding::Pcm32 | Encoding::PcmFloat => Some(4),
            Encoding::Aac | Encoding::Opus | Encoding::Invalid => None,
        }
    }

    /// Stable lowercase name, as used in configuration files.
    pub const fn name(self) -> &'static str {
        match self {
            Encoding::Pcm8 => "pcm8",
            Encoding::Pcm16 => "pcm16",
            Encoding::Pcm24 => "pcm24",
            Encoding::Pcm32 => "pcm32",
            Encoding::PcmFloat => "pcm-float",
            Encoding::Aac => "aac",
            Encoding::Opus => "opus",
            Encoding::Invalid => "invalid",
        }
    }

    /// Parse a name produced by [`Encoding::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        let encoding = match name.trim().to_ascii_lowercase().as_str() {
            "pcm8" => Encoding::Pcm8,
            "pcm16" => Encoding::Pcm16,
            "pcm24" => Encoding::Pcm24,
            "pcm32" => Encoding::Pcm32,
            "pcm-float" | "float" => Encoding::PcmFloat,
            "aac" => Encoding::Aac,
            "opus" => Encoding::Opus,
            _ => return None,
        };
        Some(encoding)
    }

    /// PCM encoding for a WAV-style integer bit depth.
    pub const fn from_bits_per_sample(bits: u16, float: bool) -> Self {
        match (bits, float) {
            (32, true) => Encoding::PcmFloat,
            (8, false) => Encoding::Pcm8,
            (16, false) => Encoding::Pcm16,
            (24, false) => Encoding::Pcm24,
            (32, false) => Encoding::Pcm32,
            _ => Encoding::Invalid,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Physical layout of a raw audio buffer.
///
/// Two values are equal iff sample rate, channel count, and encoding all
/// match. [`AudioFormat::NOT_SET`] stands for "no format" and never compares
/// equal to a valid layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channel_count: u16,
    /// Sample encoding.
    pub encoding: Encoding,
}

impl AudioFormat {
    /// Sentinel for "no format".
    pub const NOT_SET: AudioFormat = AudioFormat {
        sample_rate: 0,
        channel_count: 0,
        encoding: Encoding::Invalid,
    };

    /// Create an audio format.
    pub const fn new(sample_rate: u32, channel_count: u16, encoding: Encoding) -> Self {
        Self {
            sample_rate,
            channel_count,
            encoding,
        }
    }

    /// Derive the audio layout announced by a track [`Format`].
    ///
    /// Returns `None` unless sample rate, channel count, and encoding are all
    /// present.
    pub fn from_format(format: &Format) -> Option<Self> {
        Some(Self::new(
            format.sample_rate()?,
            format.channel_count()?,
            format.encoding()?,
        ))
    }

    /// Whether this is anything other than [`AudioFormat::NOT_SET`].
    pub fn is_set(&self) -> bool {
        *self != Self::NOT_SET
    }

    /// Bytes per interleaved frame, `None` for non-PCM encodings.
    pub fn bytes_per_frame(&self) -> Option<usize> {
        self.encoding
            .bytes_per_sample()
            .map(|bytes| bytes * self.channel_count as usize)
    }

    /// Duration in microseconds of `frames` frames at this sample rate.
    pub fn frames_to_duration_us(&self, frames: u64) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        saturate(u128::from(frames) * 1_000_000 / u128::from(self.sample_rate))
    }

    /// Number of whole frames played in `duration_us` microseconds.
    pub fn duration_us_to_frames(&self, duration_us: u64) -> u64 {
        saturate(u128::from(duration_us) * u128::from(self.sample_rate) / 1_000_000)
    }
}

fn saturate(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_set() {
            return f.write_str("NOT_SET");
        }
        write!(
            f,
            "{} Hz, {} ch, {}",
            self.sample_rate, self.channel_count, self.encoding
        )
    }
}

/// Color primaries of a video or image track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    /// ITU-R BT.601.
    Bt601,
    /// ITU-R BT.709.
    Bt709,
    /// ITU-R BT.2020.
    Bt2020,
}

/// Quantization range of a video or image track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorRange {
    /// Studio swing.
    Limited,
    /// Full swing.
    Full,
}

/// Transfer characteristic of a video or image track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorTransfer {
    /// Standard dynamic range (SDR) gamma.
    Sdr,
    /// SMPTE ST 2084 (PQ).
    St2084,
    /// Hybrid log-gamma.
    Hlg,
}

/// Color and HDR metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColorInfo {
    /// Color primaries.
    pub color_space: ColorSpace,
    /// Quantization range.
    pub color_range: ColorRange,
    /// Transfer function.
    pub color_transfer: ColorTransfer,
    /// Opaque HDR static metadata block, if any.
    pub hdr_static_info: Option<Vec<u8>>,
}

impl ColorInfo {
    /// BT.709 SDR with limited range, the default for decoded still images.
    pub const SDR_BT709_LIMITED: ColorInfo = ColorInfo {
        color_space: ColorSpace::Bt709,
        color_range: ColorRange::Limited,
        color_transfer: ColorTransfer::Sdr,
        hdr_static_info: None,
    };

    /// Whether the transfer function is an HDR one.
    pub fn is_hdr(&self) -> bool {
        matches!(self.color_transfer, ColorTransfer::St2084 | ColorTransfer::Hlg)
    }
}

/// Kind of track a [`Format`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackType {
    /// Audio samples.
    Audio,
    /// Video frames, including frames synthesized from still images.
    Video,
}

impl TrackType {
    /// Stable lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            TrackType::Audio => "audio",
            TrackType::Video => "video",
        }
    }
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable description of a track.
///
/// Unset fields are `None`. Two formats are equal iff every field matches.
///
/// ```rust
/// use cadenza_core::{Encoding, Format, mime};
///
/// let stereo = Format::builder()
///     .sample_mime_type(mime::AUDIO_RAW)
///     .sample_rate(48000)
///     .channel_count(2)
///     .encoding(Encoding::Pcm16)
///     .build();
///
/// let mono = stereo.build_upon().channel_count(1).build();
/// assert_eq!(mono.sample_rate(), Some(48000));
/// assert_ne!(mono, stereo);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Format {
    sample_mime_type: Option<String>,
    sample_rate: Option<u32>,
    channel_count: Option<u16>,
    encoding: Option<Encoding>,
    width: Option<u32>,
    height: Option<u32>,
    frame_rate: Option<f32>,
    color_info: Option<ColorInfo>,
}

impl Format {
    /// Start building a format from scratch.
    pub fn builder() -> FormatBuilder {
        FormatBuilder::default()
    }

    /// Start building a format that copies every field of `self`.
    pub fn build_upon(&self) -> FormatBuilder {
        FormatBuilder {
            format: self.clone(),
        }
    }

    /// Raw audio format for a PCM layout.
    pub fn from_audio_format(audio: AudioFormat) -> Self {
        Self::builder()
            .sample_mime_type(mime::AUDIO_RAW)
            .sample_rate(audio.sample_rate)
            .channel_count(audio.channel_count)
            .encoding(audio.encoding)
            .build()
    }

    /// Sample MIME type.
    pub fn sample_mime_type(&self) -> Option<&str> {
        self.sample_mime_type.as_deref()
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// Channel count.
    pub fn channel_count(&self) -> Option<u16> {
        self.channel_count
    }

    /// Audio sample encoding.
    pub fn encoding(&self) -> Option<Encoding> {
        self.encoding
    }

    /// Frame width in pixels.
    pub fn width(&self) -> Option<u32> {
        self.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> Option<u32> {
        self.height
    }

    /// Frame rate in frames per second.
    pub fn frame_rate(&self) -> Option<f32> {
        self.frame_rate
    }

    /// Color and HDR metadata.
    pub fn color_info(&self) -> Option<&ColorInfo> {
        self.color_info.as_ref()
    }

    /// Track type implied by the MIME type, if recognizable.
    pub fn track_type(&self) -> Option<TrackType> {
        let mime = self.sample_mime_type.as_deref()?;
        if mime.starts_with("audio/") {
            Some(TrackType::Audio)
        } else if mime.starts_with("video/") || mime.starts_with("image/") {
            Some(TrackType::Video)
        } else {
            None
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sample_mime_type.as_deref().unwrap_or("?"))?;
        if let (Some(w), Some(h)) = (self.width, self.height) {
            write!(f, " {w}x{h}")?;
        }
        if let Some(rate) = self.frame_rate {
            write!(f, " @{rate}fps")?;
        }
        if let Some(rate) = self.sample_rate {
            write!(f, " {rate} Hz")?;
        }
        if let Some(channels) = self.channel_count {
            write!(f, " {channels} ch")?;
        }
        if let Some(encoding) = self.encoding {
            write!(f, " {encoding}")?;
        }
        Ok(())
    }
}

/// Builder for [`Format`].
#[derive(Debug, Clone, Default)]
pub struct FormatBuilder {
    format: Format,
}

impl FormatBuilder {
    /// Set the sample MIME type.
    pub fn sample_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.format.sample_mime_type = Some(mime.into());
        self
    }

    /// Set the sample rate.
    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.format.sample_rate = Some(sample_rate);
        self
    }

    /// Set the channel count.
    pub fn channel_count(mut self, channel_count: u16) -> Self {
        self.format.channel_count = Some(channel_count);
        self
    }

    /// Set the audio encoding.
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.format.encoding = Some(encoding);
        self
    }

    /// Set the frame width.
    pub fn width(mut self, width: u32) -> Self {
        self.format.width = Some(width);
        self
    }

    /// Set the frame height.
    pub fn height(mut self, height: u32) -> Self {
        self.format.height = Some(height);
        self
    }

    /// Set the frame rate.
    pub fn frame_rate(mut self, frame_rate: f32) -> Self {
        self.format.frame_rate = Some(frame_rate);
        self
    }

    /// Set color metadata.
    pub fn color_info(mut self, color_info: ColorInfo) -> Self {
        self.format.color_info = Some(color_info);
        self
    }

    /// Finish building.
    pub fn build(self) -> Format {
        self.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_per_frame_pcm() {
        assert_eq!(
            AudioFormat::new(44100, 2, Encoding::Pcm16).bytes_per_frame(),
            Some(4)
        );
        assert_eq!(
            AudioFormat::new(48000, 6, Encoding::Pcm24).bytes_per_frame(),
            Some(18)
        );
        assert_eq!(
            AudioFormat::new(48000, 1, Encoding::PcmFloat).bytes_per_frame(),
            Some(4)
        );
    }

    #[test]
    fn bytes_per_frame_unset_for_compressed() {
        assert_eq!(AudioFormat::new(48000, 2, Encoding::Aac).bytes_per_frame(), None);
        assert_eq!(AudioFormat::NOT_SET.bytes_per_frame(), None);
    }

    #[test]
    fn not_set_is_distinct() {
        assert!(!AudioFormat::NOT_SET.is_set());
        assert!(AudioFormat::new(8000, 1, Encoding::Pcm8).is_set());
        assert_eq!(AudioFormat::NOT_SET.to_string(), "NOT_SET");
    }

    #[test]
    fn build_upon_copies_and_overrides() {
        let base = Format::builder()
            .sample_mime_type(mime::IMAGE_RAW)
            .width(640)
            .height(480)
            .color_info(ColorInfo::SDR_BT709_LIMITED)
            .build();
        let wider = base.build_upon().width(1280).build();

        assert_eq!(wider.width(), Some(1280));
        assert_eq!(wider.height(), Some(480));
        assert_eq!(wider.color_info(), Some(&ColorInfo::SDR_BT709_LIMITED));
        assert_eq!(base.width(), Some(640));
        assert_eq!(base.build_upon().build(), base);
    }

    #[test]
    fn track_type_from_mime() {
        let audio = Format::from_audio_format(AudioFormat::new(48000, 2, Encoding::Pcm16));
        assert_eq!(audio.track_type(), Some(TrackType::Audio));
        let image = Format::builder().sample_mime_type(mime::IMAGE_RAW).build();
        assert_eq!(image.track_type(), Some(TrackType::Video));
        assert_eq!(Format::default().track_type(), None);
    }

    #[test]
    fn audio_format_from_format_requires_all_fields() {
        let partial = Format::builder().sample_rate(48000).channel_count(2).build();
        assert_eq!(AudioFormat::from_format(&partial), None);

        let full = partial.build_upon().encoding(Encoding::PcmFloat).build();
        assert_eq!(
            AudioFormat::from_format(&full),
            Some(AudioFormat::new(48000, 2, Encoding::PcmFloat))
        );
    }

    #[test]
    fn encoding_names_roundtrip() {
        for encoding in [
            Encoding::Pcm8,
            Encoding::Pcm16,
            Encoding::Pcm24,
            Encoding::Pcm32,
            Encoding::PcmFloat,
            Encoding::Aac,
            Encoding::Opus,
        ] {
            assert_eq!(Encoding::from_name(encoding.name()), Some(encoding));
        }
        assert_eq!(Encoding::from_name("mp3"), None);
    }

    #[test]
    fn duration_frame_conversion() {
        let format = AudioFormat::new(48000, 2, Encoding::Pcm16);
        assert_eq!(format.frames_to_duration_us(48000), 1_000_000);
        assert_eq!(format.duration_us_to_frames(500_000), 24000);
    }

    #[test]
    fn duration_frame_conversion_of_huge_values() {
        let format = AudioFormat::new(48000, 2, Encoding::Pcm16);
        assert_eq!(format.frames_to_duration_us(u64::MAX), u64::MAX);
        let frames = format.duration_us_to_frames(u64::MAX);
        assert_eq!(u128::from(frames), u128::from(u64::MAX) * 48000 / 1_000_000);
        assert_eq!(AudioFormat::NOT_SET.frames_to_duration_us(u64::MAX), 0);
    }

    #[test]
    fn hdr_detection() {
        assert!(!ColorInfo::SDR_BT709_LIMITED.is_hdr());
        let pq = ColorInfo {
            color_transfer: ColorTransfer::St2084,
            color_space: ColorSpace::Bt2020,
            ..ColorInfo::SDR_BT709_LIMITED
        };
        assert!(pq.is_hdr());
    }
}
