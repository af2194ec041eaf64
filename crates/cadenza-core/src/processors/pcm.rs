//! PCM sample decoding/encoding and the two reformatting stages.

use crate::error::UnhandledAudioFormatError;
use crate::format::{AudioFormat, Encoding};
use crate::processor::{BaseProcessor, PcmTransform, StageFormats};

/// Decode one little-endian sample to `[-1.0, 1.0)`.
///
/// # Panics
///
/// Panics if `encoding` is not PCM or `bytes` is shorter than one sample.
#[inline]
pub fn decode_sample(encoding: Encoding, bytes: &[u8]) -> f32 {
    match encoding {
        Encoding::Pcm8 => (f32::from(bytes[0]) - 128.0) / 128.0,
        Encoding::Pcm16 => f32::from(i16::from_le_bytes([bytes[0], bytes[1]])) / 32768.0,
        Encoding::Pcm24 => {
            let raw = i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8;
            raw as f32 / 8_388_608.0
        }
        Encoding::Pcm32 => {
            let raw = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            (f64::from(raw) / 2_147_483_648.0) as f32
        }
        Encoding::PcmFloat => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        Encoding::Aac | Encoding::Opus | Encoding::Invalid => {
            panic!("cannot decode {encoding} samples")
        }
    }
}

/// Encode one sample, clamping to the representable range.
///
/// # Panics
///
/// Panics if `encoding` is not PCM.
#[inline]
pub fn encode_sample(encoding: Encoding, sample: f32, out: &mut Vec<u8>) {
    match encoding {
        Encoding::Pcm8 => {
            let value = (sample * 128.0 + 128.0).round().clamp(0.0, 255.0) as u8;
            out.push(value);
        }
        Encoding::Pcm16 => {
            let value = (sample * 32768.0).round().clamp(-32768.0, 32767.0) as i16;
            out.extend_from_slice(&value.to_le_bytes());
        }
        Encoding::Pcm24 => {
            let value = (sample * 8_388_608.0).round().clamp(-8_388_608.0, 8_388_607.0) as i32;
            out.extend_from_slice(&value.to_le_bytes()[..3]);
        }
        Encoding::Pcm32 => {
            let value = (f64::from(sample) * 2_147_483_648.0)
                .round()
                .clamp(-2_147_483_648.0, 2_147_483_647.0) as i32;
            out.extend_from_slice(&value.to_le_bytes());
        }
        Encoding::PcmFloat => out.extend_from_slice(&sample.to_le_bytes()),
        Encoding::Aac | Encoding::Opus | Encoding::Invalid => {
            panic!("cannot encode {encoding} samples")
        }
    }
}

/// Re-encode every sample of `input` from one PCM encoding to another.
pub fn convert_samples(input: &[u8], from: Encoding, to: Encoding, out: &mut Vec<u8>) {
    let Some(width) = from.bytes_per_sample() else {
        panic!("cannot convert from {from}");
    };
    if from == to {
        out.extend_from_slice(input);
        return;
    }
    out.reserve(input.len() / width * to.bytes_per_sample().unwrap_or(width));
    for sample in input.chunks_exact(width) {
        encode_sample(to, decode_sample(from, sample), out);
    }
}

/// Converts any PCM encoding to a fixed target encoding.
///
/// Inactive when the input already uses the target encoding.
#[derive(Debug, Clone)]
pub struct PcmEncodingTransform {
    name: &'static str,
    target: Encoding,
}

impl PcmEncodingTransform {
    /// Convert to `target`, logging under `name`.
    pub fn new(name: &'static str, target: Encoding) -> Self {
        assert!(target.is_pcm(), "target encoding must be PCM");
        Self { name, target }
    }

    /// Target encoding.
    pub fn target(&self) -> Encoding {
        self.target
    }
}

impl PcmTransform for PcmEncodingTransform {
    fn name(&self) -> &'static str {
        self.name
    }

    fn on_configure(
        &mut self,
        input: AudioFormat,
    ) -> Result<Option<AudioFormat>, UnhandledAudioFormatError> {
        if !input.encoding.is_pcm() {
            return Err(UnhandledAudioFormatError::with_reason(input, "not PCM"));
        }
        if input.encoding == self.target {
            return Ok(None);
        }
        Ok(Some(AudioFormat {
            encoding: self.target,
            ..input
        }))
    }

    fn transform(&mut self, input: &[u8], formats: &StageFormats, output: &mut Vec<u8>) -> usize {
        convert_samples(input, formats.input.encoding, formats.output.encoding, output);
        input.len()
    }
}

/// Stage re-encoding PCM audio.
pub type PcmEncodingProcessor = BaseProcessor<PcmEncodingTransform>;

/// Create a stage converting PCM audio to signed 16-bit.
pub fn to_int16_pcm() -> PcmEncodingProcessor {
    BaseProcessor::new(PcmEncodingTransform::new("to-int16", Encoding::Pcm16))
}

/// Create a stage converting PCM audio to 32-bit float.
pub fn to_float_pcm() -> PcmEncodingProcessor {
    BaseProcessor::new(PcmEncodingTransform::new("to-float", Encoding::PcmFloat))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::AudioProcessor;
    use crate::stream::StreamMetadata;

    #[test]
    fn int16_float_roundtrip_is_exact() {
        let samples: Vec<i16> = vec![i16::MIN, -12345, -1, 0, 1, 12345, i16::MAX];
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        let mut float = Vec::new();
        convert_samples(&bytes, Encoding::Pcm16, Encoding::PcmFloat, &mut float);
        let mut back = Vec::new();
        convert_samples(&float, Encoding::PcmFloat, Encoding::Pcm16, &mut back);

        assert_eq!(back, bytes);
    }

    #[test]
    fn pcm24_sign_extension() {
        let minus_one = [0xFF, 0xFF, 0xFF];
        assert_eq!(decode_sample(Encoding::Pcm24, &minus_one), -1.0 / 8_388_608.0);
        let mut out = Vec::new();
        encode_sample(Encoding::Pcm24, -1.0 / 8_388_608.0, &mut out);
        assert_eq!(out, minus_one);
    }

    #[test]
    fn pcm8_is_unsigned() {
        assert_eq!(decode_sample(Encoding::Pcm8, &[128]), 0.0);
        let mut out = Vec::new();
        encode_sample(Encoding::Pcm8, -1.0, &mut out);
        assert_eq!(out, [0]);
    }

    #[test]
    fn encode_clamps() {
        let mut out = Vec::new();
        encode_sample(Encoding::Pcm16, 2.0, &mut out);
        assert_eq!(i16::from_le_bytes([out[0], out[1]]), i16::MAX);
    }

    #[test]
    fn to_int16_inactive_for_int16_input() {
        let mut stage = to_int16_pcm();
        let out = stage
            .configure(AudioFormat::new(44100, 2, Encoding::Pcm16))
            .unwrap();
        assert_eq!(out, AudioFormat::NOT_SET);
        assert!(!stage.is_active());
    }

    #[test]
    fn to_int16_rejects_compressed() {
        let mut stage = to_int16_pcm();
        let rejected = AudioFormat::new(44100, 2, Encoding::Opus);
        assert_eq!(stage.configure(rejected).unwrap_err().format, rejected);
    }

    #[test]
    fn to_float_converts() {
        let mut stage = to_float_pcm();
        let out = stage
            .configure(AudioFormat::new(44100, 1, Encoding::Pcm16))
            .unwrap();
        assert_eq!(out, AudioFormat::new(44100, 1, Encoding::PcmFloat));
        stage.flush(StreamMetadata::DEFAULT);

        let input = 16384i16.to_le_bytes();
        stage.queue_input(&mut &input[..]);
        let output = stage.get_output().take();
        assert_eq!(f32::from_le_bytes([output[0], output[1], output[2], output[3]]), 0.5);
    }
}
