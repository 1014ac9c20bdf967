use bytes::BytesMut;

use crate::error::{FrameError, Result};

/// Default rolling buffer capacity: 64 KiB, several maximum-size frames.
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// Fixed-capacity byte accumulator between the transport and the decoder.
///
/// Bytes are appended at the write cursor and consumed from the read
/// cursor. [`compact`](Self::compact) moves the unread tail back to offset 0,
/// which the decoder does once per ingestion call.
#[derive(Debug)]
pub struct RollingBuffer {
    storage: BytesMut,
    read: usize,
    capacity: usize,
}

impl RollingBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: BytesMut::with_capacity(capacity),
            read: 0,
            capacity,
        }
    }

    /// Append bytes at the write cursor.
    ///
    /// Fails without appending anything if the write cursor would pass the
    /// capacity.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        if self.storage.len() + bytes.len() > self.capacity {
            return Err(FrameError::BufferOverflow {
                incoming: bytes.len(),
                buffered: self.remaining(),
                capacity: self.capacity,
            });
        }
        self.storage.extend_from_slice(bytes);
        Ok(())
    }

    /// Bytes available to read.
    pub fn remaining(&self) -> usize {
        self.storage.len() - self.read
    }

    /// Mark `n` unread bytes as consumed. Stops at the write cursor.
    pub fn advance(&mut self, n: usize) {
        self.read += n.min(self.remaining());
    }

    /// Unread bytes, without consuming them.
    pub fn unread(&self) -> &[u8] {
        &self.storage[self.read..]
    }

    /// Shift unread bytes to offset 0.
    pub fn compact(&mut self) {
        if self.read == 0 {
            return;
        }
        let end = self.storage.len();
        self.storage.copy_within(self.read..end, 0);
        self.storage.truncate(end - self.read);
        self.read = 0;
    }

    /// Drop every buffered byte.
    pub fn clear(&mut self) {
        self.storage.clear();
        self.read = 0;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

impl Default for RollingBuffer {
    fn default() -> Self {
        Self::new()
    }
}
