//! Frame checksum: an 8-bit wrapping sum seeded with the second header byte.

use crate::codec::{HEADER, INFO_SIZE};

/// Seed value of every frame checksum (the `0xFF` header byte).
pub const CHECKSUM_SEED: u8 = HEADER[1];

/// Incremental checksum accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksum(u8);

impl Checksum {
    /// A freshly seeded accumulator.
    pub const fn new() -> Self {
        Self(CHECKSUM_SEED)
    }

    /// Reseed for a new frame.
    pub fn reset(&mut self) {
        self.0 = CHECKSUM_SEED;
    }

    pub fn add(&mut self, byte: u8) {
        self.0 = self.0.wrapping_add(byte);
    }

    pub fn add_slice(&mut self, bytes: &[u8]) {
        self.0 = bytes.iter().fold(self.0, |acc, &b| acc.wrapping_add(b));
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Whether the received trailer byte agrees with the accumulated sum.
    pub fn matches(self, received: u8) -> bool {
        self.0 == received
    }
}

impl Default for Checksum {
    fn default() -> Self {
        Self::new()
    }
}

/// Checksum of a complete frame body: length field, info block and pixels.
pub fn frame_checksum(len: u16, info: &[u8; INFO_SIZE], pixels: &[u8]) -> u8 {
    let mut sum = Checksum::new();
    sum.add_slice(&len.to_le_bytes());
    sum.add_slice(info);
    sum.add_slice(pixels);
    sum.value()
}
