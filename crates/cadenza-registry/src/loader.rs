use std::sync::Arc;

use cadenza_core::{ProcessingChain, TrackType};
use cadenza_export::{
    AssetLoader, AssetLoaderListener, AudioAssetLoader, FileBitmapLoader, ImageAssetLoader,
    LoaderOptions, SilenceSource, ToneSource, WavSource,
};

use crate::{Params, RegistryError, invalid, optional, required};

/// Describes an asset loader in the registry.
#[derive(Debug, Clone)]
pub struct LoaderDescriptor {
    /// Capability tag the loader is registered under.
    pub tag: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Brief description.
    pub description: &'static str,
    /// Kind of track the loader produces.
    pub track: TrackType,
    /// Accepted parameter names.
    pub params: &'static [&'static str],
}

/// Everything a loader factory needs besides its parameters.
pub struct LoaderSetup {
    /// Receives the loader's notifications.
    pub listener: Arc<dyn AssetLoaderListener>,
    /// Audio processing applied by audio loaders. Must be empty for video
    /// loaders.
    pub chain: ProcessingChain,
    /// Retry interval and chunk size.
    pub options: LoaderOptions,
}

type LoaderFactory =
    fn(&str, &Params, LoaderSetup) -> Result<Box<dyn AssetLoader>, RegistryError>;

struct RegistryEntry {
    descriptor: LoaderDescriptor,
    factory: LoaderFactory,
}

/// Registry mapping capability tags to [`AssetLoader`] factories.
pub struct AssetLoaderRegistry {
    entries: Vec<RegistryEntry>,
}

impl Default for AssetLoaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

const DEFAULT_SAMPLE_RATE: u32 = 48000;
const DEFAULT_CHANNELS: u16 = 2;

impl AssetLoaderRegistry {
    /// Create a registry with all built-in loaders registered.
    pub fn new() -> Self {
        let mut registry = Self {
            entries: Vec::with_capacity(4),
        };
        registry.register_builtin_loaders();
        registry
    }

    fn register_builtin_loaders(&mut self) {
        self.register(
            LoaderDescriptor {
                tag: "image",
                name: "Still Image",
                description: "PNG or JPEG shown as video frames at a constant rate",
                track: TrackType::Video,
                params: &["path", "duration_us", "frame_rate"],
            },
            |tag, params, setup| {
                if !setup.chain.is_empty() {
                    return Err(invalid(
                        tag,
                        "processors",
                        &setup.chain.len().to_string(),
                        "image loaders take no audio processors",
                    ));
                }
                let path: String = required(tag, params, "path")?;
                let duration_us: u64 = required(tag, params, "duration_us")?;
                let frame_rate: f32 = optional(tag, params, "frame_rate", 30.0)?;
                if !(frame_rate.is_finite() && frame_rate > 0.0) {
                    return Err(invalid(
                        tag,
                        "frame_rate",
                        &frame_rate.to_string(),
                        "must be positive",
                    ));
                }
                Ok(Box::new(ImageAssetLoader::new(
                    Box::new(FileBitmapLoader::new(path)),
                    duration_us,
                    frame_rate,
                    setup.listener,
                    setup.options,
                )))
            },
        );

        self.register(
            LoaderDescriptor {
                tag: "wav",
                name: "WAV File",
                description: "PCM audio read from a WAV file",
                track: TrackType::Audio,
                params: &["path"],
            },
            |tag, params, setup| {
                let path: String = required(tag, params, "path")?;
                let source = WavSource::open(&path)?;
                Ok(Box::new(AudioAssetLoader::new(
                    Box::new(source),
                    setup.chain,
                    setup.listener,
                    setup.options,
                )))
            },
        );

        self.register(
            LoaderDescriptor {
                tag: "tone",
                name: "Sine Tone",
                description: "Synthetic sine tone in float PCM",
                track: TrackType::Audio,
                params: &["frequency_hz", "duration_us", "sample_rate", "channel_count"],
            },
            |tag, params, setup| {
                let frequency_hz: f64 = optional(tag, params, "frequency_hz", 440.0)?;
                let duration_us: u64 = required(tag, params, "duration_us")?;
                let (sample_rate, channel_count) = audio_layout(tag, params)?;
                if !(frequency_hz.is_finite() && frequency_hz > 0.0) {
                    return Err(invalid(
                        tag,
                        "frequency_hz",
                        &frequency_hz.to_string(),
                        "must be positive",
                    ));
                }
                let source = ToneSource::new(frequency_hz, duration_us, sample_rate, channel_count);
                Ok(Box::new(AudioAssetLoader::new(
                    Box::new(source),
                    setup.chain,
                    setup.listener,
                    setup.options,
                )))
            },
        );

        self.register(
            LoaderDescriptor {
                tag: "silence",
                name: "Silence",
                description: "Digital silence in 16-bit PCM",
                track: TrackType::Audio,
                params: &["duration_us", "sample_rate", "channel_count"],
            },
            |tag, params, setup| {
                let duration_us: u64 = required(tag, params, "duration_us")?;
                let (sample_rate, channel_count) = audio_layout(tag, params)?;
                let source = SilenceSource::new(duration_us, sample_rate, channel_count);
                Ok(Box::new(AudioAssetLoader::new(
                    Box::new(source),
                    setup.chain,
                    setup.listener,
                    setup.options,
                )))
            },
        );
    }

    fn register(&mut self, descriptor: LoaderDescriptor, factory: LoaderFactory) {
        self.entries.push(RegistryEntry {
            descriptor,
            factory,
        });
    }

    /// Returns descriptors for all registered loaders.
    pub fn all_loaders(&self) -> Vec<&LoaderDescriptor> {
        self.entries.iter().map(|e| &e.descriptor).collect()
    }

    /// Get a descriptor by capability tag.
    pub fn get(&self, tag: &str) -> Option<&LoaderDescriptor> {
        self.entries
            .iter()
            .find(|e| e.descriptor.tag == tag)
            .map(|e| &e.descriptor)
    }

    /// Build the loader registered under `tag`.
    pub fn create(
        &self,
        tag: &str,
        params: &Params,
        setup: LoaderSetup,
    ) -> Result<Box<dyn AssetLoader>, RegistryError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.descriptor.tag == tag)
            .ok_or_else(|| RegistryError::UnknownLoader(tag.to_owned()))?;
        (entry.factory)(tag, params, setup)
    }

    /// Returns the number of registered loaders.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no loaders are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn audio_layout(tag: &str, params: &Params) -> Result<(u32, u16), RegistryError> {
    let sample_rate: u32 = optional(tag, params, "sample_rate", DEFAULT_SAMPLE_RATE)?;
    let channel_count: u16 = optional(tag, params, "channel_count", DEFAULT_CHANNELS)?;
    if sample_rate == 0 {
        return Err(invalid(tag, "sample_rate", "0", "must be positive"));
    }
    if channel_count == 0 {
        return Err(invalid(tag, "channel_count", "0", "must be positive"));
    }
    Ok((sample_rate, channel_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_export::{ErrorCode, ExportSession, MemoryMuxer};
    use std::time::Duration;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn setup(listener: Arc<dyn AssetLoaderListener>) -> LoaderSetup {
        LoaderSetup {
            listener,
            chain: ProcessingChain::new(),
            options: LoaderOptions::default(),
        }
    }

    #[test]
    fn test_registry_creation() {
        let registry = AssetLoaderRegistry::new();
        assert_eq!(registry.len(), 4);
        let tags: Vec<_> = registry.all_loaders().iter().map(|d| d.tag).collect();
        assert_eq!(tags, vec!["image", "wav", "tone", "silence"]);
    }

    #[test]
    fn test_get_loader() {
        let registry = AssetLoaderRegistry::new();
        assert_eq!(registry.get("image").unwrap().track, TrackType::Video);
        assert_eq!(registry.get("wav").unwrap().track, TrackType::Audio);
        assert!(registry.get("mp4").is_none());
    }

    #[test]
    fn test_tone_loader_runs() {
        let registry = AssetLoaderRegistry::new();
        let session = ExportSession::new(MemoryMuxer::new());
        let mut loader = registry
            .create(
                "tone",
                &params(&[("duration_us", "10000"), ("sample_rate", "8000")]),
                setup(session.clone()),
            )
            .unwrap();
        loader.start();
        session.wait(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn test_missing_wav_is_export_error() {
        let registry = AssetLoaderRegistry::new();
        let session = ExportSession::new(MemoryMuxer::new());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.wav");
        let result = registry.create(
            "wav",
            &params(&[("path", path.to_str().unwrap())]),
            setup(session),
        );
        match result {
            Err(RegistryError::Export(err)) => assert_eq!(err.code(), ErrorCode::IoFileNotFound),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("missing file accepted"),
        }
    }

    #[test]
    fn test_bad_params_rejected() {
        let registry = AssetLoaderRegistry::new();
        let session = ExportSession::new(MemoryMuxer::new());
        let bad = [
            ("silence", params(&[("duration_us", "1000"), ("channel_count", "0")])),
            ("tone", params(&[("sample_rate", "8000")])),
            (
                "image",
                params(&[("path", "a.png"), ("duration_us", "1"), ("frame_rate", "0")]),
            ),
        ];
        for (tag, p) in bad {
            assert!(
                registry.create(tag, &p, setup(session.clone())).is_err(),
                "{tag} accepted {p:?}"
            );
        }
        assert!(matches!(
            registry.create("mp4", &Params::new(), setup(session)),
            Err(RegistryError::UnknownLoader(_))
        ));
    }
}
