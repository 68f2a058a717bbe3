//! FIFO receive buffer consumed by parse and validate.

use bytes::{Buf, BytesMut};

/// Bytes waiting to be parsed or validated, consumed from the front.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffer {
    value: BytesMut,
}

impl Buffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no bytes remain.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Number of bytes remaining.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// Remove and return the front byte.
    pub fn pop(&mut self) -> Option<u8> {
        if self.value.is_empty() {
            return None;
        }
        Some(self.value.get_u8())
    }

    /// Append bytes to the back.
    pub fn push(&mut self, bytes: &[u8]) {
        self.value.extend_from_slice(bytes);
    }

    /// View the remaining bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.value
    }
}

impl From<&[u8]> for Buffer {
    fn from(bytes: &[u8]) -> Self {
        Self {
            value: BytesMut::from(bytes),
        }
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from(bytes.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_front() {
        let mut buffer = Buffer::from(vec![1, 2, 3]);
        assert_eq!(buffer.pop(), Some(1));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.as_slice(), &[2, 3]);
    }

    #[test]
    fn test_pop_empty() {
        let mut buffer = Buffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.pop(), None);
    }

    #[test]
    fn test_push_appends() {
        let mut buffer = Buffer::new();
        buffer.push(&[]);
        buffer.push(&[9, 8]);
        buffer.push(&[7]);
        assert_eq!(buffer.as_slice(), &[9, 8, 7]);
    }
}
