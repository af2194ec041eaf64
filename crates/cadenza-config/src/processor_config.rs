//! Processor configuration entries.

use serde::{Deserialize, Serialize};

use cadenza_registry::Params;

/// Configuration for one stage of the processing chain.
///
/// A stage can be bypassed either with `bypassed = true` or by prefixing its
/// type with `!` (e.g. `!gain`). Bypassed stages are validated but never
/// built.
///
/// # Example
///
/// ```rust
/// use cadenza_config::ProcessorConfig;
///
/// let config = ProcessorConfig::new("!resample").with_param("rate", "44100");
/// assert_eq!(config.canonical_type(), "resample");
/// assert!(config.is_bypassed());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Processor id as listed by the processor registry.
    #[serde(rename = "type")]
    pub processor_type: String,

    /// Whether the stage is skipped.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bypassed: bool,

    /// Processor parameters, passed verbatim to the factory.
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,
}

impl ProcessorConfig {
    /// Create a stage configuration. A leading `!` marks it bypassed.
    pub fn new(processor_type: impl Into<String>) -> Self {
        let raw = processor_type.into();
        let (processor_type, bypassed) = match raw.strip_prefix('!') {
            Some(stripped) => (stripped.to_owned(), true),
            None => (raw, false),
        };
        Self {
            processor_type,
            bypassed,
            params: Params::new(),
        }
    }

    /// Add a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set whether the stage is bypassed.
    pub fn with_bypass(mut self, bypassed: bool) -> Self {
        self.bypassed = bypassed;
        self
    }

    /// Get a parameter value.
    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Processor id without the bypass prefix.
    pub fn canonical_type(&self) -> &str {
        self.processor_type
            .strip_prefix('!')
            .unwrap_or(&self.processor_type)
    }

    /// True if the stage is bypassed by flag or by prefix.
    pub fn is_bypassed(&self) -> bool {
        self.bypassed || self.processor_type.starts_with('!')
    }

    /// Type string for display, with `!` if bypassed.
    pub fn display_type(&self) -> String {
        if self.is_bypassed() {
            format!("!{}", self.canonical_type())
        } else {
            self.canonical_type().to_owned()
        }
    }
}
