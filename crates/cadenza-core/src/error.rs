//! Error types for format negotiation.

use crate::format::AudioFormat;
use thiserror::Error;

/// A stage cannot represent the requested input configuration.
///
/// This is a configuration error: the caller recovers by skipping the stage or
/// choosing another one. It always carries the exact format that was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unhandled input format: {format}{}", reason_suffix(.reason))]
pub struct UnhandledAudioFormatError {
    /// The rejected input format.
    pub format: AudioFormat,
    /// Short static reason, if the stage gave one.
    pub reason: Option<&'static str>,
}

impl UnhandledAudioFormatError {
    /// Create an error for `format`.
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            reason: None,
        }
    }

    /// Create an error for `format` with a reason.
    pub fn with_reason(format: AudioFormat, reason: &'static str) -> Self {
        Self {
            format,
            reason: Some(reason),
        }
    }
}

fn reason_suffix(reason: &Option<&'static str>) -> String {
    reason.map(|r| format!(" ({r})")).unwrap_or_default()
}

/// A stream position was negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("stream position offset must be non-negative, got {0} us")]
pub struct NegativePositionError(pub i64);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Encoding;

    #[test]
    fn message_includes_format() {
        let err = UnhandledAudioFormatError::new(AudioFormat::new(44100, 2, Encoding::Aac));
        assert_eq!(err.to_string(), "unhandled input format: 44100 Hz, 2 ch, aac");
    }

    #[test]
    fn message_includes_reason() {
        let err = UnhandledAudioFormatError::with_reason(
            AudioFormat::new(44100, 2, Encoding::Aac),
            "not PCM",
        );
        assert!(err.to_string().ends_with("(not PCM)"));
    }
}
