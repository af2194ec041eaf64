//! Built-in processing stages.
//!
//! Each stage pairs a [`PcmTransform`](crate::PcmTransform) with
//! [`BaseProcessor`](crate::BaseProcessor) and deactivates itself when it
//! would not change the audio:
//!
//! | Stage | Inactive when |
//! |-------|---------------|
//! | [`gain`] | factor is 1.0 |
//! | [`to_int16_pcm`] / [`to_float_pcm`] | input already has the target encoding |
//! | [`channel_mapping`] | no map, or the map is the identity |
//! | [`resampler`] | input already runs at the target rate |

mod channel_map;
mod gain;
pub mod pcm;
mod resample;

pub use channel_map::{ChannelMapping, ChannelMappingProcessor, channel_mapping};
pub use gain::{Gain, GainProcessor, gain};
pub use pcm::{PcmEncodingProcessor, PcmEncodingTransform, to_float_pcm, to_int16_pcm};
pub use resample::{LinearResampler, ResamplingProcessor, resampler};
