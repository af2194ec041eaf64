//! Streaming linear-interpolation sample rate converter.

use crate::error::UnhandledAudioFormatError;
use crate::format::{AudioFormat, Encoding};
use crate::processor::{BaseProcessor, PcmTransform, StageFormats};
use crate::processors::pcm::{decode_sample, encode_sample};
use crate::stream::StreamMetadata;

/// Converts to a fixed output sample rate by linear interpolation.
///
/// State carries across blocks, so splitting the input at arbitrary frame
/// boundaries yields the same output as processing it in one piece. Bypassed
/// when the input already runs at the target rate.
#[derive(Debug, Clone)]
pub struct LinearResampler {
    target_rate: u32,
    input_rate: u64,
    /// Index of the next output frame since the last flush.
    next_output: u64,
    /// Absolute input frame index of `prev`.
    base_frame: u64,
    prev: Vec<f32>,
    has_prev: bool,
    scratch: Vec<f32>,
}

impl LinearResampler {
    /// Resample to `target_rate` Hz.
    pub fn new(target_rate: u32) -> Self {
        Self {
            target_rate,
            input_rate: 0,
            next_output: 0,
            base_frame: 0,
            prev: Vec::new(),
            has_prev: false,
            scratch: Vec::new(),
        }
    }

    /// Target sample rate in Hz.
    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Change the target rate; applied at the next configure.
    pub fn set_target_rate(&mut self, target_rate: u32) {
        self.target_rate = target_rate;
    }

    /// Input frame index and interpolation weight of the next output frame.
    fn next_position(&self) -> (u64, f32) {
        let out_rate = u64::from(self.target_rate);
        let numerator = self.next_output * self.input_rate;
        let frac = (numerator % out_rate) as f64 / out_rate as f64;
        (numerator / out_rate, frac as f32)
    }

    fn clear_state(&mut self) {
        self.next_output = 0;
        self.base_frame = 0;
        self.prev.clear();
        self.has_prev = false;
        self.scratch.clear();
    }
}

impl PcmTransform for LinearResampler {
    fn name(&self) -> &'static str {
        "resample"
    }

    fn on_configure(
        &mut self,
        input: AudioFormat,
    ) -> Result<Option<AudioFormat>, UnhandledAudioFormatError> {
        if !matches!(input.encoding, Encoding::Pcm16 | Encoding::PcmFloat) {
            return Err(UnhandledAudioFormatError::with_reason(
                input,
                "resampler needs 16-bit or float PCM",
            ));
        }
        if self.target_rate == 0 || input.sample_rate == 0 {
            return Err(UnhandledAudioFormatError::with_reason(input, "zero sample rate"));
        }
        if input.sample_rate == self.target_rate {
            return Ok(None);
        }
        self.input_rate = u64::from(input.sample_rate);
        Ok(Some(AudioFormat {
            sample_rate: self.target_rate,
            ..input
        }))
    }

    fn transform(&mut self, input: &[u8], formats: &StageFormats, output: &mut Vec<u8>) -> usize {
        let encoding = formats.input.encoding;
        let channels = formats.input.channel_count.max(1) as usize;
        let width = encoding.bytes_per_sample().unwrap_or(2);

        self.scratch.clear();
        if self.has_prev {
            self.scratch.extend_from_slice(&self.prev);
        }
        self.scratch.extend(
            input
                .chunks_exact(width)
                .map(|sample| decode_sample(encoding, sample)),
        );

        let total = self.scratch.len() / channels;
        if total == 0 {
            return input.len();
        }
        self.has_prev = true;

        loop {
            let (frame, t) = self.next_position();
            let index = (frame - self.base_frame) as usize;
            if index + 1 >= total {
                break;
            }
            let a = &self.scratch[index * channels..(index + 1) * channels];
            let b = &self.scratch[(index + 1) * channels..(index + 2) * channels];
            for (x, y) in a.iter().zip(b) {
                encode_sample(encoding, x + (y - x) * t, output);
            }
            self.next_output += 1;
        }

        self.prev.clear();
        self.prev
            .extend_from_slice(&self.scratch[(total - 1) * channels..total * channels]);
        self.base_frame += (total - 1) as u64;
        input.len()
    }

    fn on_end_of_stream(&mut self, formats: &StageFormats, output: &mut Vec<u8>) {
        if !self.has_prev {
            return;
        }
        while self.next_position().0 <= self.base_frame {
            for &sample in &self.prev {
                encode_sample(formats.output.encoding, sample, output);
            }
            self.next_output += 1;
        }
    }

    fn on_flush(&mut self, _metadata: StreamMetadata) {
        self.clear_state();
    }

    fn on_reset(&mut self) {
        self.clear_state();
        self.prev.shrink_to_fit();
        self.scratch.shrink_to_fit();
    }
}

/// Resampling stage.
pub type ResamplingProcessor = BaseProcessor<LinearResampler>;

/// Create a resampling stage targeting `sample_rate` Hz.
pub fn resampler(sample_rate: u32) -> ResamplingProcessor {
    BaseProcessor::new(LinearResampler::new(sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::AudioProcessor;

    fn float_bytes(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    fn run(stage: &mut ResamplingProcessor, input: &[u8], block: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in input.chunks(block) {
            let mut view = chunk;
            while !view.is_empty() {
                stage.queue_input(&mut view);
                out.extend(stage.get_output().take());
            }
        }
        stage.queue_end_of_stream();
        out.extend(stage.get_output().take());
        out
    }

    #[test]
    fn matching_rate_is_inactive() {
        let mut stage = resampler(48000);
        stage
            .configure(AudioFormat::new(48000, 2, Encoding::Pcm16))
            .unwrap();
        assert!(!stage.is_active());
    }

    #[test]
    fn rejects_pcm8() {
        let mut stage = resampler(48000);
        let format = AudioFormat::new(44100, 1, Encoding::Pcm8);
        assert_eq!(stage.configure(format).unwrap_err().format, format);
    }

    #[test]
    fn halving_rate_halves_length() {
        let mut stage = resampler(24000);
        let out_format = stage
            .configure(AudioFormat::new(48000, 1, Encoding::PcmFloat))
            .unwrap();
        assert_eq!(out_format.sample_rate, 24000);
        stage.flush(StreamMetadata::DEFAULT);

        let input: Vec<f32> = (0..4800).map(|i| i as f32 / 4800.0).collect();
        let out = floats(&run(&mut stage, &float_bytes(&input), 4096));
        assert!((out.len() as i64 - 2400).abs() <= 1, "got {}", out.len());
        // Every other input sample survives unchanged for an exact 2:1 ratio.
        assert_eq!(out[10], input[20]);
    }

    #[test]
    fn block_size_does_not_change_output() {
        let input: Vec<f32> = (0..1000).map(|i| ((i as f32) * 0.05).sin()).collect();
        let bytes = float_bytes(&input);

        let mut whole = resampler(44100);
        whole
            .configure(AudioFormat::new(48000, 1, Encoding::PcmFloat))
            .unwrap();
        whole.flush(StreamMetadata::DEFAULT);
        let a = run(&mut whole, &bytes, bytes.len());

        let mut split = resampler(44100);
        split
            .configure(AudioFormat::new(48000, 1, Encoding::PcmFloat))
            .unwrap();
        split.flush(StreamMetadata::DEFAULT);
        let b = run(&mut split, &bytes, 28);

        assert_eq!(a, b);
    }

    #[test]
    fn flush_clears_interpolation_state() {
        let mut stage = resampler(96000);
        stage
            .configure(AudioFormat::new(48000, 1, Encoding::PcmFloat))
            .unwrap();
        stage.flush(StreamMetadata::DEFAULT);
        let first = run(&mut stage, &float_bytes(&[1.0, 1.0, 1.0]), 12);

        stage.flush(StreamMetadata::new(0));
        let second = run(&mut stage, &float_bytes(&[1.0, 1.0, 1.0]), 12);
        assert_eq!(first, second);
    }
}
