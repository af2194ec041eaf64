//! Linear gain stage.

use crate::error::UnhandledAudioFormatError;
use crate::format::{AudioFormat, Encoding};
use crate::processor::{BaseProcessor, PcmTransform, StageFormats};
use crate::processors::pcm::{decode_sample, encode_sample};

/// Scales every sample by a constant factor.
///
/// Bypassed at unity gain. Works on 16-bit and float PCM; other encodings
/// need a [`to_float_pcm`](crate::processors::to_float_pcm) stage in front.
#[derive(Debug, Clone)]
pub struct Gain {
    factor: f32,
}

impl Gain {
    /// Gain by a linear factor.
    pub fn new(factor: f32) -> Self {
        Self { factor }
    }

    /// Gain in decibels.
    pub fn from_db(db: f32) -> Self {
        Self::new(10f32.powf(db / 20.0))
    }

    /// Linear factor.
    pub fn factor(&self) -> f32 {
        self.factor
    }

    /// Change the factor; applied at the next configure.
    pub fn set_factor(&mut self, factor: f32) {
        self.factor = factor;
    }
}

impl PcmTransform for Gain {
    fn name(&self) -> &'static str {
        "gain"
    }

    fn on_configure(
        &mut self,
        input: AudioFormat,
    ) -> Result<Option<AudioFormat>, UnhandledAudioFormatError> {
        if !matches!(input.encoding, Encoding::Pcm16 | Encoding::PcmFloat) {
            return Err(UnhandledAudioFormatError::with_reason(
                input,
                "gain needs 16-bit or float PCM",
            ));
        }
        if (self.factor - 1.0).abs() < f32::EPSILON {
            return Ok(None);
        }
        Ok(Some(input))
    }

    fn transform(&mut self, input: &[u8], formats: &StageFormats, output: &mut Vec<u8>) -> usize {
        let encoding = formats.input.encoding;
        let width = encoding.bytes_per_sample().unwrap_or(2);
        output.reserve(input.len());
        for sample in input.chunks_exact(width) {
            encode_sample(encoding, decode_sample(encoding, sample) * self.factor, output);
        }
        input.len()
    }
}

/// Gain stage.
pub type GainProcessor = BaseProcessor<Gain>;

/// Create a gain stage with a linear factor.
pub fn gain(factor: f32) -> GainProcessor {
    BaseProcessor::new(Gain::new(factor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::AudioProcessor;
    use crate::stream::StreamMetadata;

    #[test]
    fn unity_gain_is_inactive() {
        let mut stage = gain(1.0);
        stage
            .configure(AudioFormat::new(48000, 2, Encoding::Pcm16))
            .unwrap();
        assert!(!stage.is_active());
    }

    #[test]
    fn rejects_pcm24() {
        let mut stage = gain(0.5);
        let format = AudioFormat::new(48000, 2, Encoding::Pcm24);
        assert_eq!(stage.configure(format).unwrap_err().format, format);
    }

    #[test]
    fn halves_int16() {
        let mut stage = gain(0.5);
        stage
            .configure(AudioFormat::new(48000, 1, Encoding::Pcm16))
            .unwrap();
        stage.flush(StreamMetadata::DEFAULT);

        let input: Vec<u8> = [1000i16, -2000].iter().flat_map(|s| s.to_le_bytes()).collect();
        stage.queue_input(&mut &input[..]);
        let out = stage.get_output().take();
        let samples: Vec<i16> = out
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(samples, vec![500, -1000]);
    }

    #[test]
    fn from_db() {
        let g = Gain::from_db(-6.0206);
        assert!((g.factor() - 0.5).abs() < 1e-4);
    }
}
