//! Channel reordering, selection, and duplication.

use crate::error::UnhandledAudioFormatError;
use crate::format::AudioFormat;
use crate::processor::{BaseProcessor, PcmTransform, StageFormats};

/// Builds each output frame by picking input channels by index.
///
/// `[1, 0]` swaps a stereo pair, `[0]` keeps the left channel, `[0, 0]`
/// upmixes mono. Bypassed when no map is set or the map is the identity for
/// the input channel count.
#[derive(Debug, Clone, Default)]
pub struct ChannelMapping {
    map: Option<Vec<usize>>,
}

impl ChannelMapping {
    /// Mapping with the given output-to-input channel map.
    pub fn new(map: Vec<usize>) -> Self {
        Self { map: Some(map) }
    }

    /// Replace the map; applied at the next configure.
    pub fn set_map(&mut self, map: Option<Vec<usize>>) {
        self.map = map;
    }

    /// Current map.
    pub fn map(&self) -> Option<&[usize]> {
        self.map.as_deref()
    }
}

impl PcmTransform for ChannelMapping {
    fn name(&self) -> &'static str {
        "channel-map"
    }

    fn on_configure(
        &mut self,
        input: AudioFormat,
    ) -> Result<Option<AudioFormat>, UnhandledAudioFormatError> {
        let Some(map) = self.map.as_deref() else {
            return Ok(None);
        };
        if !input.encoding.is_pcm() {
            return Err(UnhandledAudioFormatError::with_reason(input, "not PCM"));
        }
        if map.is_empty() || map.iter().any(|&c| c >= input.channel_count as usize) {
            return Err(UnhandledAudioFormatError::with_reason(
                input,
                "channel map out of range",
            ));
        }
        let identity = map.len() == input.channel_count as usize
            && map.iter().enumerate().all(|(i, &c)| i == c);
        if identity {
            return Ok(None);
        }
        Ok(Some(AudioFormat {
            channel_count: map.len() as u16,
            ..input
        }))
    }

    fn transform(&mut self, input: &[u8], formats: &StageFormats, output: &mut Vec<u8>) -> usize {
        let Some(map) = self.map.as_deref() else {
            output.extend_from_slice(input);
            return input.len();
        };
        let width = formats.input.encoding.bytes_per_sample().unwrap_or(1);
        let frame = formats.input.bytes_per_frame().unwrap_or(width);
        output.reserve(input.len() / frame * map.len() * width);
        for frame_bytes in input.chunks_exact(frame) {
            for &channel in map {
                let start = channel * width;
                output.extend_from_slice(&frame_bytes[start..start + width]);
            }
        }
        input.len()
    }
}

/// Channel mapping stage.
pub type ChannelMappingProcessor = BaseProcessor<ChannelMapping>;

/// Create a channel mapping stage.
pub fn channel_mapping(map: Vec<usize>) -> ChannelMappingProcessor {
    BaseProcessor::new(ChannelMapping::new(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Encoding;
    use crate::processor::AudioProcessor;
    use crate::stream::StreamMetadata;

    #[test]
    fn identity_map_is_inactive() {
        let mut stage = channel_mapping(vec![0, 1]);
        stage
            .configure(AudioFormat::new(48000, 2, Encoding::Pcm16))
            .unwrap();
        assert!(!stage.is_active());
    }

    #[test]
    fn out_of_range_channel_rejected() {
        let mut stage = channel_mapping(vec![0, 2]);
        let format = AudioFormat::new(48000, 2, Encoding::Pcm16);
        assert_eq!(stage.configure(format).unwrap_err().format, format);
    }

    #[test]
    fn swaps_stereo() {
        let mut stage = channel_mapping(vec![1, 0]);
        stage
            .configure(AudioFormat::new(48000, 2, Encoding::Pcm16))
            .unwrap();
        stage.flush(StreamMetadata::DEFAULT);
        let input = [1u8, 2, 3, 4, 5, 6, 7, 8];
        stage.queue_input(&mut &input[..]);
        assert_eq!(stage.get_output().take(), vec![3, 4, 1, 2, 7, 8, 5, 6]);
    }

    #[test]
    fn upmixes_mono() {
        let mut stage = channel_mapping(vec![0, 0]);
        let out = stage
            .configure(AudioFormat::new(22050, 1, Encoding::Pcm8))
            .unwrap();
        assert_eq!(out.channel_count, 2);
        stage.flush(StreamMetadata::DEFAULT);
        let input = [10u8, 20];
        stage.queue_input(&mut &input[..]);
        assert_eq!(stage.get_output().take(), vec![10, 10, 20, 20]);
    }
}
