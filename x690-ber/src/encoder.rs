//! Single-shot DER encoder
//!
//! Accumulates tag-length-value triplets into a byte buffer. The length is
//! always the minimal definite form; streaming indefinite output lives in
//! the generator module.

use crate::types::{Length, Tag};

/// Buffer-accumulating DER encoder.
pub struct DerEncoder {
    buffer: Vec<u8>,
}

impl DerEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new encoder with initial buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Write one tag-length-value triplet.
    pub fn write_encoded(&mut self, tag: Tag, contents: &[u8]) {
        self.buffer.extend_from_slice(&tag.encode());
        self.buffer
            .extend_from_slice(&Length::Definite(contents.len()).encode());
        self.buffer.extend_from_slice(contents);
    }

    /// Get the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Clear the encoder buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for DerEncoder {
    fn default() -> Self {
        Self::new()
    }
}
