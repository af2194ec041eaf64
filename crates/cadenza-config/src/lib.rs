//! Export configuration for cadenza.
//!
//! An export is described by a TOML file naming an input asset, an ordered
//! list of audio processors, and an output destination. This crate parses
//! and saves those files, validates them against the built-in registries,
//! and turns them into the pieces an export needs.
//!
//! # Example
//!
//! ```rust,no_run
//! use cadenza_config::{ExportConfig, InputConfig, ProcessorConfig};
//! use cadenza_registry::ProcessorRegistry;
//!
//! let config = ExportConfig::new(
//!     "Quiet tone",
//!     InputConfig::Tone {
//!         frequency_hz: 440.0,
//!         duration_us: 2_000_000,
//!         sample_rate: 44100,
//!         channel_count: 2,
//!     },
//! )
//! .with_processor(ProcessorConfig::new("gain").with_param("db", "-12"))
//! .with_output_path("quiet.wav")
//! .with_bits_per_sample(16);
//!
//! config.validate().unwrap();
//! let chain = config.build_chain(&ProcessorRegistry::new()).unwrap();
//! assert_eq!(chain.stage_names(), vec!["gain", "to-int16"]);
//!
//! config.save(cadenza_config::user_configs_dir().join("quiet.toml")).unwrap();
//! ```

mod error;
mod export_config;
mod processor_config;

/// Platform-specific paths for saved configurations.
pub mod paths;

/// Configuration validation.
pub mod validation;

pub use error::ConfigError;
pub use export_config::{ExportConfig, InputConfig, OutputConfig};
pub use paths::{
    config_name_from_path, ensure_user_configs_dir, find_config, list_configs_in_dir,
    list_user_configs, user_config_dir, user_configs_dir,
};
pub use processor_config::ProcessorConfig;
pub use validation::{ConfigValidator, ValidationError, ValidationResult, validate_config};
