//! Append-only byte sink

use uuid::Uuid;

use super::zigzag_encode;

/// Growable output buffer with typed writers.
///
/// Writes into a `Vec<u8>` cannot fail, so the writers return nothing.
#[derive(Debug, Default, Clone)]
pub struct StreamOutput {
    buf: Vec<u8>,
}

impl StreamOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u32_le(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// LEB128 unsigned 32-bit varint
    pub fn write_vint(&mut self, value: u32) {
        self.write_vlong(u64::from(value));
    }

    /// LEB128 unsigned 64-bit varint
    pub fn write_vlong(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.push((value as u8) | 0x80);
            value >>= 7;
        }
        self.buf.push(value as u8);
    }

    /// Zig-zag varint for signed 32-bit values
    pub fn write_zint(&mut self, value: i32) {
        self.write_vlong(zigzag_encode(i64::from(value)));
    }

    /// Zig-zag varint for signed 64-bit values
    pub fn write_zlong(&mut self, value: i64) {
        self.write_vlong(zigzag_encode(value));
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Length-prefixed UTF-8
    pub fn write_string(&mut self, value: &str) {
        self.write_vlong(value.len() as u64);
        self.buf.extend_from_slice(value.as_bytes());
    }

    pub fn write_uuid(&mut self, value: &Uuid) {
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Length-prefixed sequence, one call to `write_item` per element
    pub fn write_collection<T, F>(&mut self, items: &[T], mut write_item: F)
    where
        F: FnMut(&mut Self, &T),
    {
        self.write_vlong(items.len() as u64);
        for item in items {
            write_item(self, item);
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
