//! Flush-time repositioning metadata.

use crate::error::NegativePositionError;

/// Metadata handed to [`AudioProcessor::flush`](crate::AudioProcessor::flush).
///
/// `position_offset_us` is the stream position at which new input resumes
/// after the flush. It is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StreamMetadata {
    position_offset_us: u64,
}

impl StreamMetadata {
    /// Metadata for a stream that resumes at position zero.
    pub const DEFAULT: StreamMetadata = StreamMetadata {
        position_offset_us: 0,
    };

    /// Create metadata for a stream resuming at `position_offset_us`.
    ///
    /// # Panics
    ///
    /// Panics if `position_offset_us` is negative.
    pub fn new(position_offset_us: i64) -> Self {
        match Self::try_new(position_offset_us) {
            Ok(metadata) => metadata,
            Err(err) => panic!("{err}"),
        }
    }

    /// Fallible variant of [`StreamMetadata::new`].
    pub fn try_new(position_offset_us: i64) -> Result<Self, NegativePositionError> {
        u64::try_from(position_offset_us)
            .map(|position_offset_us| Self { position_offset_us })
            .map_err(|_| NegativePositionError(position_offset_us))
    }

    /// Stream position, in microseconds, at which input resumes.
    pub fn position_offset_us(&self) -> u64 {
        self.position_offset_us
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_zero_and_positive() {
        assert_eq!(StreamMetadata::new(0), StreamMetadata::DEFAULT);
        assert_eq!(StreamMetadata::new(1_500_000).position_offset_us(), 1_500_000);
    }

    #[test]
    #[should_panic]
    fn rejects_negative() {
        let _ = StreamMetadata::new(-1);
    }

    #[test]
    fn try_new_reports_value() {
        let err = StreamMetadata::try_new(-42).unwrap_err();
        assert_eq!(err.0, -42);
    }
}
