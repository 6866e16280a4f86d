//! Whole-file checksums, hex-encoded MD5 as the store reports them.

use md5::{Digest, Md5};

/// Incremental checksum over a byte stream.
#[derive(Clone, Default)]
pub struct Checksum {
    hasher: Md5,
}

impl Checksum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Consumes the accumulator and returns the lowercase hex digest.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// Computes the checksum of `data`.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut checksum = Checksum::new();
    checksum.update(data);
    checksum.finish()
}
