//! Readable output buffer shared by processors and the chain.

/// Bytes a stage has produced and a downstream reader has not yet consumed.
///
/// A stage appends through [`OutputBuffer::write`]; readers look at
/// [`OutputBuffer::remaining`] and report how much they took with
/// [`OutputBuffer::consume`]. Consumed bytes are compacted away lazily, so the
/// backing allocation is reused across calls.
#[derive(Debug, Default, Clone)]
pub struct OutputBuffer {
    data: Vec<u8>,
    read: usize,
}

impl OutputBuffer {
    /// An empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Unread bytes.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.read..]
    }

    /// Whether any unread bytes are left.
    pub fn has_remaining(&self) -> bool {
        self.read < self.data.len()
    }

    /// Number of unread bytes.
    pub fn len(&self) -> usize {
        self.data.len() - self.read
    }

    /// Whether there are no unread bytes.
    pub fn is_empty(&self) -> bool {
        !self.has_remaining()
    }

    /// Mark `count` unread bytes as consumed.
    ///
    /// # Panics
    ///
    /// Panics if `count` exceeds the unread length.
    pub fn consume(&mut self, count: usize) {
        assert!(
            count <= self.len(),
            "consumed {count} bytes but only {} remain",
            self.len()
        );
        self.read += count;
        if self.read == self.data.len() {
            self.data.clear();
            self.read = 0;
        }
    }

    /// Take every unread byte out of the buffer.
    pub fn take(&mut self) -> Vec<u8> {
        let out = self.data.split_off(self.read);
        self.data.clear();
        self.read = 0;
        out
    }

    /// Vector to append new output to.
    ///
    /// Already consumed bytes are discarded first.
    pub fn write(&mut self) -> &mut Vec<u8> {
        if self.read > 0 {
            self.data.drain(..self.read);
            self.read = 0;
        }
        &mut self.data
    }

    /// Drop all buffered bytes, keeping the allocation.
    pub fn clear(&mut self) {
        self.data.clear();
        self.read = 0;
    }

    /// Drop all buffered bytes and the allocation.
    pub fn release(&mut self) {
        self.data = Vec::new();
        self.read = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_consume() {
        let mut buffer = OutputBuffer::new();
        buffer.write().extend_from_slice(&[1, 2, 3, 4]);
        assert_eq!(buffer.remaining(), &[1, 2, 3, 4]);

        buffer.consume(3);
        assert_eq!(buffer.remaining(), &[4]);
        buffer.write().push(5);
        assert_eq!(buffer.remaining(), &[4, 5]);

        buffer.consume(2);
        assert!(buffer.is_empty());
    }

    #[test]
    fn take_returns_unread_only() {
        let mut buffer = OutputBuffer::new();
        buffer.write().extend_from_slice(&[9, 8, 7]);
        buffer.consume(1);
        assert_eq!(buffer.take(), vec![8, 7]);
        assert!(buffer.is_empty());
    }

    #[test]
    #[should_panic]
    fn over_consume_panics() {
        let mut buffer = OutputBuffer::new();
        buffer.write().push(1);
        buffer.consume(2);
    }
}
