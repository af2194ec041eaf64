use cadenza_core::AudioProcessor;
use cadenza_core::processors::{Gain, channel_mapping, gain, resampler, to_float_pcm, to_int16_pcm};

use crate::{Params, RegistryError, invalid, optional, required};

/// What a processor changes about the audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorCategory {
    /// Sample values (gain).
    Level,
    /// Sample encoding.
    Format,
    /// Channel layout.
    Channels,
    /// Sample rate.
    Rate,
}

impl ProcessorCategory {
    /// Returns a human-readable name for the category.
    pub const fn name(&self) -> &'static str {
        match self {
            ProcessorCategory::Level => "Level",
            ProcessorCategory::Format => "Format",
            ProcessorCategory::Channels => "Channels",
            ProcessorCategory::Rate => "Rate",
        }
    }

    /// Returns a description of the category.
    pub const fn description(&self) -> &'static str {
        match self {
            ProcessorCategory::Level => "Scale sample values",
            ProcessorCategory::Format => "Re-encode samples without changing their values",
            ProcessorCategory::Channels => "Drop, duplicate, or reorder channels",
            ProcessorCategory::Rate => "Change the sample rate",
        }
    }
}

/// Describes a processor in the registry.
#[derive(Debug, Clone)]
pub struct ProcessorDescriptor {
    /// Unique identifier (lowercase, no spaces).
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Brief description.
    pub description: &'static str,
    /// Category for organization.
    pub category: ProcessorCategory,
    /// Accepted parameter names.
    pub params: &'static [&'static str],
}

type ProcessorFactory = fn(&str, &Params) -> Result<Box<dyn AudioProcessor>, RegistryError>;

struct RegistryEntry {
    descriptor: ProcessorDescriptor,
    factory: ProcessorFactory,
}

/// Registry of every built-in [`AudioProcessor`].
pub struct ProcessorRegistry {
    entries: Vec<RegistryEntry>,
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorRegistry {
    /// Create a registry with all built-in processors registered.
    pub fn new() -> Self {
        let mut registry = Self {
            entries: Vec::with_capacity(5),
        };
        registry.register_builtin_processors();
        registry
    }

    fn register_builtin_processors(&mut self) {
        self.register(
            ProcessorDescriptor {
                id: "gain",
                name: "Gain",
                description: "Linear gain on 16-bit or float PCM; inactive at unity",
                category: ProcessorCategory::Level,
                params: &["factor", "db"],
            },
            |id, params| {
                let factor = match params.get("db") {
                    Some(_) => Gain::from_db(required(id, params, "db")?).factor(),
                    None => optional(id, params, "factor", 1.0f32)?,
                };
                if !factor.is_finite() || factor < 0.0 {
                    return Err(invalid(
                        id,
                        "factor",
                        &factor.to_string(),
                        "must be finite and non-negative",
                    ));
                }
                Ok(Box::new(gain(factor)))
            },
        );

        self.register(
            ProcessorDescriptor {
                id: "to-int16",
                name: "To 16-bit PCM",
                description: "Re-encode any PCM input as signed 16-bit",
                category: ProcessorCategory::Format,
                params: &[],
            },
            |_, _| Ok(Box::new(to_int16_pcm())),
        );

        self.register(
            ProcessorDescriptor {
                id: "to-float",
                name: "To float PCM",
                description: "Re-encode any PCM input as 32-bit float",
                category: ProcessorCategory::Format,
                params: &[],
            },
            |_, _| Ok(Box::new(to_float_pcm())),
        );

        self.register(
            ProcessorDescriptor {
                id: "channel-map",
                name: "Channel Map",
                description: "Build output channels from input channel indices",
                category: ProcessorCategory::Channels,
                params: &["map"],
            },
            |id, params| {
                let raw: String = required(id, params, "map")?;
                let map = raw
                    .split(',')
                    .map(|c| c.trim().parse::<usize>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|err| invalid(id, "map", &raw, err))?;
                if map.is_empty() {
                    return Err(invalid(id, "map", &raw, "needs at least one channel"));
                }
                Ok(Box::new(channel_mapping(map)))
            },
        );

        self.register(
            ProcessorDescriptor {
                id: "resample",
                name: "Resample",
                description: "Linear-interpolation resampler on 16-bit or float PCM",
                category: ProcessorCategory::Rate,
                params: &["rate"],
            },
            |id, params| {
                let rate: u32 = required(id, params, "rate")?;
                if rate == 0 {
                    return Err(invalid(id, "rate", "0", "must be positive"));
                }
                Ok(Box::new(resampler(rate)))
            },
        );
    }

    fn register(&mut self, descriptor: ProcessorDescriptor, factory: ProcessorFactory) {
        self.entries.push(RegistryEntry {
            descriptor,
            factory,
        });
    }

    /// Returns descriptors for all registered processors.
    pub fn all_processors(&self) -> Vec<&ProcessorDescriptor> {
        self.entries.iter().map(|e| &e.descriptor).collect()
    }

    /// Returns descriptors for processors in a specific category.
    pub fn in_category(&self, category: ProcessorCategory) -> Vec<&ProcessorDescriptor> {
        self.entries
            .iter()
            .filter(|e| e.descriptor.category == category)
            .map(|e| &e.descriptor)
            .collect()
    }

    /// Get a descriptor by processor id.
    pub fn get(&self, id: &str) -> Option<&ProcessorDescriptor> {
        self.entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| &e.descriptor)
    }

    /// Build a processor by id.
    pub fn create(
        &self,
        id: &str,
        params: &Params,
    ) -> Result<Box<dyn AudioProcessor>, RegistryError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .ok_or_else(|| RegistryError::UnknownProcessor(id.to_owned()))?;
        (entry.factory)(id, params)
    }

    /// Returns the number of registered processors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no processors are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
