//! Export configuration file format.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use cadenza_core::{ProcessingChain, TrackType};
use cadenza_export::LoaderOptions;
use cadenza_registry::{Params, ProcessorRegistry};

use crate::error::ConfigError;
use crate::processor_config::ProcessorConfig;
use crate::validation::{ValidationError, output_stage, validate_config};

const DEFAULT_FRAME_RATE: f32 = 30.0;
const DEFAULT_FREQUENCY_HZ: f64 = 440.0;
const DEFAULT_SAMPLE_RATE: u32 = 48000;
const DEFAULT_CHANNEL_COUNT: u16 = 2;
const DEFAULT_RETRY_INTERVAL_MS: u64 = 10;
const DEFAULT_CHUNK_FRAMES: usize = 1024;

fn default_frame_rate() -> f32 {
    DEFAULT_FRAME_RATE
}

fn default_frequency_hz() -> f64 {
    DEFAULT_FREQUENCY_HZ
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

fn default_channel_count() -> u16 {
    DEFAULT_CHANNEL_COUNT
}

fn default_retry_interval_ms() -> u64 {
    DEFAULT_RETRY_INTERVAL_MS
}

fn default_chunk_frames() -> usize {
    DEFAULT_CHUNK_FRAMES
}

/// The asset an export reads, tagged by loader capability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InputConfig {
    /// PCM audio from a WAV file.
    Wav {
        /// File to read.
        path: PathBuf,
    },
    /// A PNG or JPEG repeated as video frames.
    Image {
        /// File to decode.
        path: PathBuf,
        /// Length of the generated video.
        duration_us: u64,
        /// Frames per second.
        #[serde(default = "default_frame_rate")]
        frame_rate: f32,
    },
    /// A synthetic sine tone.
    Tone {
        /// Tone pitch.
        #[serde(default = "default_frequency_hz")]
        frequency_hz: f64,
        /// Length of the tone.
        duration_us: u64,
        /// Output sample rate.
        #[serde(default = "default_sample_rate")]
        sample_rate: u32,
        /// Output channel count.
        #[serde(default = "default_channel_count")]
        channel_count: u16,
    },
    /// Digital silence.
    Silence {
        /// Length of the silence.
        duration_us: u64,
        /// Output sample rate.
        #[serde(default = "default_sample_rate")]
        sample_rate: u32,
        /// Output channel count.
        #[serde(default = "default_channel_count")]
        channel_count: u16,
    },
}

impl InputConfig {
    /// Capability tag of the asset loader that reads this input.
    pub const fn tag(&self) -> &'static str {
        match self {
            InputConfig::Wav { .. } => "wav",
            InputConfig::Image { .. } => "image",
            InputConfig::Tone { .. } => "tone",
            InputConfig::Silence { .. } => "silence",
        }
    }

    /// Kind of track the input produces.
    pub const fn track_type(&self) -> TrackType {
        match self {
            InputConfig::Image { .. } => TrackType::Video,
            InputConfig::Wav { .. } | InputConfig::Tone { .. } | InputConfig::Silence { .. } => {
                TrackType::Audio
            }
        }
    }

    /// File the input reads, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            InputConfig::Wav { path } | InputConfig::Image { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Factory parameters for the loader registry.
    pub fn loader_params(&self) -> Params {
        let mut params = Params::new();
        let mut set = |key: &str, value: String| {
            params.insert(key.to_owned(), value);
        };
        match self {
            InputConfig::Wav { path } => set("path", path.display().to_string()),
            InputConfig::Image {
                path,
                duration_us,
                frame_rate,
            } => {
                set("path", path.display().to_string());
                set("duration_us", duration_us.to_string());
                set("frame_rate", frame_rate.to_string());
            }
            InputConfig::Tone {
                frequency_hz,
                duration_us,
                sample_rate,
                channel_count,
            } => {
                set("frequency_hz", frequency_hz.to_string());
                set("duration_us", duration_us.to_string());
                set("sample_rate", sample_rate.to_string());
                set("channel_count", channel_count.to_string());
            }
            InputConfig::Silence {
                duration_us,
                sample_rate,
                channel_count,
            } => {
                set("duration_us", duration_us.to_string());
                set("sample_rate", sample_rate.to_string());
                set("channel_count", channel_count.to_string());
            }
        }
        params
    }

    fn path_mut(&mut self) -> Option<&mut PathBuf> {
        match self {
            InputConfig::Wav { path } | InputConfig::Image { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Where and how the export is written.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputConfig {
    /// Output file. Required for audio inputs; for image inputs a JSON
    /// summary of the muxed track is written here instead of stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Final sample width for audio: 16 (signed PCM) or 32 (float PCM).
    /// Unset keeps whatever the chain produces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bits_per_sample: Option<u16>,
}

/// One export job: an input, a processing chain, and an output.
///
/// # TOML Format
///
/// ```toml
/// name = "Tone to WAV"
/// retry_interval_ms = 10
/// chunk_frames = 1024
///
/// [input]
/// type = "tone"
/// frequency_hz = 440.0
/// duration_us = 2000000
/// sample_rate = 44100
///
/// [output]
/// path = "tone.wav"
/// bits_per_sample = 16
///
/// [[processors]]
/// type = "gain"
/// params = { db = "-6" }
///
/// [[processors]]
/// type = "!channel-map"
/// params = { map = "0" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportConfig {
    /// Name of the export.
    pub name: String,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Delay before re-offering a sample the sink refused.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Frames read from an audio source per chunk.
    #[serde(default = "default_chunk_frames")]
    pub chunk_frames: usize,

    /// The asset to read.
    pub input: InputConfig,

    /// Output destination.
    #[serde(default)]
    pub output: OutputConfig,

    /// Audio processing stages, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub processors: Vec<ProcessorConfig>,
}

impl ExportConfig {
    /// Create a configuration with default output and no processors.
    pub fn new(name: impl Into<String>, input: InputConfig) -> Self {
        Self {
            name: name.into(),
            description: None,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            chunk_frames: DEFAULT_CHUNK_FRAMES,
            input,
            output: OutputConfig::default(),
            processors: Vec::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append a processing stage.
    pub fn with_processor(mut self, processor: ProcessorConfig) -> Self {
        self.processors.push(processor);
        self
    }

    /// Set the output file.
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output.path = Some(path.into());
        self
    }

    /// Set the final sample width.
    pub fn with_bits_per_sample(mut self, bits: u16) -> Self {
        self.output.bits_per_sample = Some(bits);
        self
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
    }

    /// Convert the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check the configuration against the built-in registries.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_config(self)
    }

    /// Make relative input and output paths relative to `base` instead of
    /// the working directory.
    pub fn resolve_relative_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        if let Some(path) = self.input.path_mut() {
            resolve(path);
        }
        if let Some(path) = self.output.path.as_mut() {
            resolve(path);
        }
    }

    /// Loader options derived from the retry and chunk settings.
    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            retry_interval: Duration::from_millis(self.retry_interval_ms),
            chunk_frames: self.chunk_frames,
        }
    }

    /// Processors that are not bypassed.
    pub fn active_processors(&self) -> impl Iterator<Item = &ProcessorConfig> {
        self.processors.iter().filter(|p| !p.is_bypassed())
    }

    /// Build the processing chain: every active processor in order, then
    /// the re-encoding stage requested by `output.bits_per_sample`.
    pub fn build_chain(&self, registry: &ProcessorRegistry) -> Result<ProcessingChain, ConfigError> {
        let mut chain = ProcessingChain::new();
        for processor in self.active_processors() {
            chain.push(registry.create(processor.canonical_type(), &processor.params)?);
        }
        if let Some(bits) = self.output.bits_per_sample {
            let id = output_stage(bits)?;
            chain.push(registry.create(id, &Params::new())?);
        }
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TONE_EXPORT: &str = r#"
        name = "Tone"

        [input]
        type = "tone"
        duration_us = 500000
        sample_rate = 8000

        [output]
        path = "out/tone.wav"
        bits_per_sample = 16

        [[processors]]
        type = "gain"
        params = { db = "-6" }

        [[processors]]
        type = "!channel-map"
        params = { map = "0" }
    "#;

    #[test]
    fn test_parse_applies_defaults() {
        let config = ExportConfig::from_toml_str(TONE_EXPORT).unwrap();
        assert_eq!(config.retry_interval_ms, 10);
        assert_eq!(config.chunk_frames, 1024);
        assert_eq!(
            config.input,
            InputConfig::Tone {
                frequency_hz: 440.0,
                duration_us: 500_000,
                sample_rate: 8000,
                channel_count: 2,
            }
        );
        assert_eq!(config.processors.len(), 2);
        assert!(config.processors[1].is_bypassed());
    }

    #[test]
    fn test_unknown_input_type_rejected() {
        let text = "name = \"x\"\n[input]\ntype = \"mp4\"\npath = \"a.mp4\"\n";
        assert!(matches!(
            ExportConfig::from_toml_str(text),
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("export.toml");
        let config = ExportConfig::from_toml_str(TONE_EXPORT)
            .unwrap()
            .with_description("round trip");
        config.save(&path).unwrap();
        assert_eq!(ExportConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ExportConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_build_chain_skips_bypassed_and_appends_output_stage() {
        let config = ExportConfig::from_toml_str(TONE_EXPORT).unwrap();
        let chain = config.build_chain(&ProcessorRegistry::new()).unwrap();
        assert_eq!(chain.stage_names(), vec!["gain", "to-int16"]);
    }

    #[test]
    fn test_build_chain_rejects_odd_sample_width() {
        let config = ExportConfig::new(
            "odd",
            InputConfig::Silence {
                duration_us: 1000,
                sample_rate: 8000,
                channel_count: 1,
            },
        )
        .with_bits_per_sample(12);
        assert!(matches!(
            config.build_chain(&ProcessorRegistry::new()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_resolve_relative_paths() {
        let mut config = ExportConfig::new(
            "img",
            InputConfig::Image {
                path: PathBuf::from("cover.png"),
                duration_us: 1_000_000,
                frame_rate: 30.0,
            },
        )
        .with_output_path("/abs/summary.json");
        config.resolve_relative_paths(Path::new("/configs"));
        assert_eq!(config.input.path(), Some(Path::new("/configs/cover.png")));
        assert_eq!(config.output.path.as_deref(), Some(Path::new("/abs/summary.json")));
    }

    #[test]
    fn test_loader_params_and_options() {
        let config = ExportConfig::from_toml_str(TONE_EXPORT).unwrap();
        assert_eq!(config.input.tag(), "tone");
        assert_eq!(config.input.track_type(), TrackType::Audio);
        let params = config.input.loader_params();
        assert_eq!(params["duration_us"], "500000");
        assert_eq!(params["channel_count"], "2");
        assert_eq!(config.loader_options().retry_interval, Duration::from_millis(10));
    }
}
