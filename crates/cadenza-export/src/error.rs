//! Export error taxonomy.
//!
//! Every runtime failure reaching
//! [`AssetLoaderListener::on_error`](crate::AssetLoaderListener::on_error)
//! is an [`ExportError`]. Callers branch on its [`ErrorCode`]; the message is
//! diagnostic only.

use std::fmt;
use std::io;

/// Stable error codes, grouped by thousand.
///
/// | Range | Group |
/// |-------|-------|
/// | 1xxx | miscellaneous |
/// | 2xxx | input/output |
/// | 3xxx | decoding |
/// | 6xxx | audio processing |
/// | 7xxx | muxing |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// Cause unknown.
    Unspecified = 1000,
    /// An internal consistency check failed.
    FailedRuntimeCheck = 1001,
    /// Input/output failure with no more specific code.
    IoUnspecified = 2000,
    /// The input file does not exist.
    IoFileNotFound = 2005,
    /// A read started past the end of the resource.
    IoReadPositionOutOfRange = 2008,
    /// Decoding the input failed.
    DecodingFailed = 3002,
    /// The input format is recognised but cannot be decoded.
    DecodingFormatUnsupported = 3003,
    /// The input's media type is not supported at all.
    UnsupportedFormat = 3004,
    /// No processing chain accepts the decoded audio format.
    AudioProcessingFailed = 6001,
    /// Writing the output container failed.
    MuxingFailed = 7001,
}

impl ErrorCode {
    const ALL: [ErrorCode; 10] = [
        ErrorCode::Unspecified,
        ErrorCode::FailedRuntimeCheck,
        ErrorCode::IoUnspecified,
        ErrorCode::IoFileNotFound,
        ErrorCode::IoReadPositionOutOfRange,
        ErrorCode::DecodingFailed,
        ErrorCode::DecodingFormatUnsupported,
        ErrorCode::UnsupportedFormat,
        ErrorCode::AudioProcessingFailed,
        ErrorCode::MuxingFailed,
    ];

    /// Numeric value.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Look up a code by numeric value.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Stable tag, e.g. `ERROR_CODE_IO_FILE_NOT_FOUND`.
    pub const fn name(self) -> &'static str {
        match self {
            ErrorCode::Unspecified => "ERROR_CODE_UNSPECIFIED",
            ErrorCode::FailedRuntimeCheck => "ERROR_CODE_FAILED_RUNTIME_CHECK",
            ErrorCode::IoUnspecified => "ERROR_CODE_IO_UNSPECIFIED",
            ErrorCode::IoFileNotFound => "ERROR_CODE_IO_FILE_NOT_FOUND",
            ErrorCode::IoReadPositionOutOfRange => "ERROR_CODE_IO_READ_POSITION_OUT_OF_RANGE",
            ErrorCode::DecodingFailed => "ERROR_CODE_DECODING_FAILED",
            ErrorCode::DecodingFormatUnsupported => "ERROR_CODE_DECODING_FORMAT_UNSUPPORTED",
            ErrorCode::UnsupportedFormat => "ERROR_CODE_UNSUPPORTED_FORMAT",
            ErrorCode::AudioProcessingFailed => "ERROR_CODE_AUDIO_PROCESSING_FAILED",
            ErrorCode::MuxingFailed => "ERROR_CODE_MUXING_FAILED",
        }
    }

    /// Whether the code belongs to the input/output group.
    pub const fn is_io(self) -> bool {
        matches!(self.code(), 2000..3000)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A runtime failure during export.
#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ExportError {
    code: ErrorCode,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ExportError {
    /// Error with a code and diagnostic message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Failure with no better classification.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unspecified, message)
    }

    /// Classify an I/O error.
    pub fn io(err: io::Error) -> Self {
        let code = match err.kind() {
            io::ErrorKind::NotFound => ErrorCode::IoFileNotFound,
            io::ErrorKind::UnexpectedEof => ErrorCode::IoReadPositionOutOfRange,
            _ => ErrorCode::IoUnspecified,
        };
        Self::new(code, err.to_string()).with_source(err)
    }

    /// Failure inside the output container writer.
    pub fn muxing(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MuxingFailed, message)
    }

    /// Stable code to branch on.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Diagnostic message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<io::Error> for ExportError {
    fn from(err: io::Error) -> Self {
        Self::io(err)
    }
}

impl From<hound::Error> for ExportError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(io) => Self::io(io),
            hound::Error::Unsupported => {
                Self::new(ErrorCode::DecodingFormatUnsupported, "unsupported WAV layout")
            }
            other => Self::new(ErrorCode::DecodingFailed, other.to_string()).with_source(other),
        }
    }
}

impl From<image::ImageError> for ExportError {
    fn from(err: image::ImageError) -> Self {
        use image::ImageError;
        match err {
            ImageError::IoError(io) => Self::io(io),
            ImageError::Unsupported(_) => {
                Self::new(ErrorCode::DecodingFormatUnsupported, err.to_string()).with_source(err)
            }
            ImageError::Decoding(_) => {
                Self::new(ErrorCode::DecodingFailed, err.to_string()).with_source(err)
            }
            other => Self::new(ErrorCode::Unspecified, other.to_string()).with_source(other),
        }
    }
}
