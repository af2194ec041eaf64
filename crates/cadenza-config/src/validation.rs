//! Export configuration validation.
//!
//! Processor stages are checked against the processor registry by building
//! each one, so parameter rules live in exactly one place. Input and output
//! settings are checked field by field.
//!
//! # Example
//!
//! ```rust
//! use cadenza_config::{ConfigValidator, ProcessorConfig};
//!
//! let validator = ConfigValidator::new();
//! validator
//!     .validate_processor(&ProcessorConfig::new("gain").with_param("db", "-3"))
//!     .expect("gain should accept db");
//! assert!(validator.validate_processor(&ProcessorConfig::new("reverb")).is_err());
//! ```

use cadenza_core::TrackType;
use cadenza_registry::ProcessorRegistry;
use thiserror::Error;

use crate::export_config::{ExportConfig, InputConfig};
use crate::processor_config::ProcessorConfig;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Unknown processor id.
    #[error("unknown processor: {0}")]
    UnknownProcessor(String),

    /// Parameter the processor does not accept.
    #[error("unknown parameter '{param}' for processor '{processor}'")]
    UnknownParameter {
        /// Processor id.
        processor: String,
        /// Unrecognized parameter name.
        param: String,
    },

    /// The processor rejected its parameters.
    #[error("invalid parameters for processor '{processor}': {reason}")]
    InvalidParameter {
        /// Processor id.
        processor: String,
        /// Factory error message.
        reason: String,
    },

    /// An input field is out of range.
    #[error("invalid input {field}: {reason}")]
    InvalidInput {
        /// Field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The output section cannot be honoured.
    #[error("invalid output: {0}")]
    InvalidOutput(String),

    /// Audio processors configured for a video input.
    #[error("{0} input takes no audio processors")]
    ProcessorsOnVideo(&'static str),

    /// Retry interval of zero would spin.
    #[error("retry_interval_ms must be positive")]
    ZeroRetryInterval,

    /// Chunk size of zero would never make progress.
    #[error("chunk_frames must be positive")]
    ZeroChunkFrames,

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Processor id of the stage that re-encodes to `bits` per sample.
pub fn output_stage(bits: u16) -> ValidationResult<&'static str> {
    match bits {
        16 => Ok("to-int16"),
        32 => Ok("to-float"),
        other => Err(ValidationError::InvalidOutput(format!(
            "bits_per_sample {other} is not supported (use 16 or 32)"
        ))),
    }
}

/// Validator for export configurations.
pub struct ConfigValidator {
    registry: ProcessorRegistry,
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator {
    /// Create a validator over the built-in processors.
    pub fn new() -> Self {
        Self {
            registry: ProcessorRegistry::new(),
        }
    }

    /// Validate one processing stage, bypassed or not.
    pub fn validate_processor(&self, config: &ProcessorConfig) -> ValidationResult<()> {
        let id = config.canonical_type();
        let descriptor = self
            .registry
            .get(id)
            .ok_or_else(|| ValidationError::UnknownProcessor(id.to_owned()))?;

        if let Some(param) = config
            .params
            .keys()
            .find(|key| !descriptor.params.contains(&key.as_str()))
        {
            return Err(ValidationError::UnknownParameter {
                processor: id.to_owned(),
                param: param.clone(),
            });
        }

        self.registry
            .create(id, &config.params)
            .map(drop)
            .map_err(|err| ValidationError::InvalidParameter {
                processor: id.to_owned(),
                reason: err.to_string(),
            })
    }

    /// Validate the input section.
    pub fn validate_input(&self, input: &InputConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();
        match *input {
            InputConfig::Wav { ref path } | InputConfig::Image { ref path, .. }
                if path.as_os_str().is_empty() =>
            {
                errors.push(invalid_input("path", "must not be empty"));
            }
            _ => {}
        }
        match *input {
            InputConfig::Wav { .. } => {}
            InputConfig::Image {
                duration_us,
                frame_rate,
                ..
            } => {
                check_duration(duration_us, &mut errors);
                if !(frame_rate.is_finite() && frame_rate > 0.0) {
                    errors.push(invalid_input("frame_rate", "must be positive"));
                }
            }
            InputConfig::Tone {
                frequency_hz,
                duration_us,
                sample_rate,
                channel_count,
            } => {
                if !(frequency_hz.is_finite() && frequency_hz > 0.0) {
                    errors.push(invalid_input("frequency_hz", "must be positive"));
                }
                check_duration(duration_us, &mut errors);
                check_layout(sample_rate, channel_count, &mut errors);
            }
            InputConfig::Silence {
                duration_us,
                sample_rate,
                channel_count,
            } => {
                check_duration(duration_us, &mut errors);
                check_layout(sample_rate, channel_count, &mut errors);
            }
        }
        collect(errors)
    }

    /// Validate a whole configuration, reporting every problem found.
    pub fn validate(&self, config: &ExportConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(err) = self.validate_input(&config.input) {
            flatten_into(err, &mut errors);
        }

        for processor in &config.processors {
            if let Err(err) = self.validate_processor(processor) {
                errors.push(err);
            }
        }

        match config.input.track_type() {
            TrackType::Video => {
                if !config.processors.is_empty() {
                    errors.push(ValidationError::ProcessorsOnVideo(config.input.tag()));
                }
                if config.output.bits_per_sample.is_some() {
                    errors.push(ValidationError::InvalidOutput(
                        "bits_per_sample applies to audio inputs only".into(),
                    ));
                }
            }
            TrackType::Audio => {
                if config.output.path.is_none() {
                    errors.push(ValidationError::InvalidOutput(
                        "audio exports need an output path".into(),
                    ));
                }
                if let Some(bits) = config.output.bits_per_sample
                    && let Err(err) = output_stage(bits)
                {
                    errors.push(err);
                }
            }
        }

        if config.retry_interval_ms == 0 {
            errors.push(ValidationError::ZeroRetryInterval);
        }
        if config.chunk_frames == 0 {
            errors.push(ValidationError::ZeroChunkFrames);
        }

        collect(errors)
    }
}

/// Validate a configuration with a fresh [`ConfigValidator`].
pub fn validate_config(config: &ExportConfig) -> ValidationResult<()> {
    ConfigValidator::new().validate(config)
}

fn invalid_input(field: &'static str, reason: &str) -> ValidationError {
    ValidationError::InvalidInput {
        field,
        reason: reason.to_owned(),
    }
}

fn check_duration(duration_us: u64, errors: &mut Vec<ValidationError>) {
    if duration_us == 0 {
        errors.push(invalid_input("duration_us", "must be positive"));
    }
}

fn check_layout(sample_rate: u32, channel_count: u16, errors: &mut Vec<ValidationError>) {
    if sample_rate == 0 {
        errors.push(invalid_input("sample_rate", "must be positive"));
    }
    if channel_count == 0 {
        errors.push(invalid_input("channel_count", "must be positive"));
    }
}

fn flatten_into(err: ValidationError, errors: &mut Vec<ValidationError>) {
    match err {
        ValidationError::Multiple(inner) => errors.extend(inner),
        single => errors.push(single),
    }
}

fn collect(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn tone() -> InputConfig {
        InputConfig::Tone {
            frequency_hz: 440.0,
            duration_us: 10_000,
            sample_rate: 8000,
            channel_count: 1,
        }
    }

    #[test]
    fn test_valid_audio_config() {
        let config = ExportConfig::new("ok", tone())
            .with_output_path("out.wav")
            .with_processor(ProcessorConfig::new("gain").with_param("factor", "0.5"))
            .with_bits_per_sample(16);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_unknown_processor() {
        let validator = ConfigValidator::new();
        assert_eq!(
            validator.validate_processor(&ProcessorConfig::new("!flanger")),
            Err(ValidationError::UnknownProcessor("flanger".into()))
        );
    }

    #[test]
    fn test_unknown_parameter() {
        let validator = ConfigValidator::new();
        let err = validator
            .validate_processor(&ProcessorConfig::new("resample").with_param("ratio", "2"))
            .unwrap_err();
        assert!(matches!(err, ValidationError::UnknownParameter { ref param, .. } if param == "ratio"));
    }

    #[test]
    fn test_bypassed_processor_still_checked() {
        let validator = ConfigValidator::new();
        let err = validator
            .validate_processor(&ProcessorConfig::new("!resample").with_param("rate", "0"))
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidParameter { .. }));
    }

    #[test]
    fn test_image_rules() {
        let config = ExportConfig::new(
            "img",
            InputConfig::Image {
                path: PathBuf::from("a.png"),
                duration_us: 1_000_000,
                frame_rate: 0.0,
            },
        )
        .with_processor(ProcessorConfig::new("gain"));
        let Err(ValidationError::Multiple(errors)) = config.validate() else {
            panic!("expected several errors");
        };
        assert!(errors.contains(&ValidationError::ProcessorsOnVideo("image")));
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::InvalidInput { field: "frame_rate", .. }))
        );
    }

    #[test]
    fn test_audio_needs_output_path() {
        let config = ExportConfig::new("no-out", tone());
        assert!(matches!(config.validate(), Err(ValidationError::InvalidOutput(_))));
    }

    #[test]
    fn test_zero_retry_and_chunk() {
        let mut config = ExportConfig::new("zero", tone()).with_output_path("o.wav");
        config.retry_interval_ms = 0;
        config.chunk_frames = 0;
        assert_eq!(
            config.validate(),
            Err(ValidationError::Multiple(vec![
                ValidationError::ZeroRetryInterval,
                ValidationError::ZeroChunkFrames,
            ]))
        );
    }

    #[test]
    fn test_output_stage() {
        assert_eq!(output_stage(16), Ok("to-int16"));
        assert_eq!(output_stage(32), Ok("to-float"));
        assert!(output_stage(24).is_err());
    }
}
