//! Evenly spaced presentation timestamps for frames synthesized from a still
//! image.

/// Iterator over `round(duration * frame_rate)` timestamps spaced
/// `1 / frame_rate` seconds apart.
///
/// Cloning yields an independent iterator at the same position, which is how a
/// sink keeps the timestamps of a frame it accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantRateTimestamps {
    start_us: u64,
    frame_rate: f32,
    count: usize,
    index: usize,
}

impl ConstantRateTimestamps {
    /// Timestamps covering `duration_us` at `frame_rate` frames per second,
    /// starting at zero.
    ///
    /// # Panics
    ///
    /// Panics if `frame_rate` is not a positive finite number.
    pub fn new(duration_us: u64, frame_rate: f32) -> Self {
        Self::starting_at(0, duration_us, frame_rate)
    }

    /// Like [`new`](Self::new), offset by `start_us`.
    pub fn starting_at(start_us: u64, duration_us: u64, frame_rate: f32) -> Self {
        assert!(
            frame_rate.is_finite() && frame_rate > 0.0,
            "frame rate must be positive, got {frame_rate}"
        );
        let count = (duration_us as f64 * f64::from(frame_rate) / 1_000_000.0).round() as usize;
        Self {
            start_us,
            frame_rate,
            count,
            index: 0,
        }
    }

    /// Frame rate in frames per second.
    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    /// Total number of timestamps, consumed or not.
    pub fn total(&self) -> usize {
        self.count
    }

    /// Timestamp of frame `index`.
    pub fn timestamp_at(&self, index: usize) -> u64 {
        let offset = (index as f64 * 1_000_000.0 / f64::from(self.frame_rate)).round() as u64;
        self.start_us + offset
    }

    /// Timestamp of the final frame, if there is one.
    pub fn last_timestamp_us(&self) -> Option<u64> {
        self.count.checked_sub(1).map(|i| self.timestamp_at(i))
    }
}

impl Iterator for ConstantRateTimestamps {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.index >= self.count {
            return None;
        }
        let ts = self.timestamp_at(self.index);
        self.index += 1;
        Some(ts)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.count - self.index;
        (left, Some(left))
    }
}

impl ExactSizeIterator for ConstantRateTimestamps {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_seconds_at_thirty_fps() {
        let ts: Vec<u64> = ConstantRateTimestamps::new(5_000_000, 30.0).collect();
        assert_eq!(ts.len(), 150);
        assert_eq!(ts[0], 0);
        assert_eq!(ts[1], 33_333);
        assert_eq!(ts[3], 100_000);
        assert_eq!(*ts.last().unwrap(), 4_966_667);
    }

    #[test]
    fn count_rounds_to_nearest() {
        assert_eq!(ConstantRateTimestamps::new(1_016_000, 30.0).len(), 30);
        assert_eq!(ConstantRateTimestamps::new(1_017_000, 30.0).len(), 31);
        assert_eq!(ConstantRateTimestamps::new(0, 30.0).len(), 0);
    }

    #[test]
    fn clone_is_independent() {
        let mut a = ConstantRateTimestamps::starting_at(1_000, 1_000_000, 10.0);
        a.next();
        let b = a.clone();
        assert_eq!(a.count(), 9);
        assert_eq!(b.last_timestamp_us(), Some(901_000));
        assert_eq!(b.len(), 9);
    }

    #[test]
    #[should_panic(expected = "frame rate must be positive")]
    fn zero_frame_rate_panics() {
        let _ = ConstantRateTimestamps::new(1_000_000, 0.0);
    }
}
