//! Cursor over received bytes

use uuid::Uuid;

use super::{zigzag_decode, MAX_VLONG_LEN};
use crate::errors::{EngineError, EngineResult};

/// Borrowing reader with typed accessors.
///
/// Every read is bounds checked; running off the end is a
/// serialization error, never a panic.
#[derive(Debug, Clone)]
pub struct StreamInput<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> StreamInput<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos == self.data.len()
    }

    /// Reads `len` raw bytes
    pub fn read_exact(&mut self, len: usize) -> EngineResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(EngineError::serialization(format!(
                "unexpected end of input: needed {} bytes at offset {}, {} remaining",
                len,
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> EngineResult<u8> {
        Ok(self.read_exact(1)?[0])
    }

    pub fn read_bool(&mut self) -> EngineResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(EngineError::serialization(format!(
                "invalid boolean byte {other:#04x}"
            ))),
        }
    }

    pub fn read_u32_le(&mut self) -> EngineResult<u32> {
        let bytes = self.read_exact(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_vint(&mut self) -> EngineResult<u32> {
        let value = self.read_vlong()?;
        u32::try_from(value)
            .map_err(|_| EngineError::serialization(format!("varint {value} overflows u32")))
    }

    pub fn read_vlong(&mut self) -> EngineResult<u64> {
        let mut result: u64 = 0;
        for index in 0..MAX_VLONG_LEN {
            let byte = self.read_u8()?;
            let bits = u64::from(byte & 0x7f);
            if index == MAX_VLONG_LEN - 1 && bits > 1 {
                return Err(EngineError::serialization("varint overflows u64"));
            }
            result |= bits << (7 * index);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(EngineError::serialization("varint longer than 10 bytes"))
    }

    pub fn read_zint(&mut self) -> EngineResult<i32> {
        let value = zigzag_decode(self.read_vlong()?);
        i32::try_from(value)
            .map_err(|_| EngineError::serialization(format!("zig-zag value {value} overflows i32")))
    }

    pub fn read_zlong(&mut self) -> EngineResult<i64> {
        Ok(zigzag_decode(self.read_vlong()?))
    }

    pub fn read_f32(&mut self) -> EngineResult<f32> {
        let bytes = self.read_exact(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_f64(&mut self) -> EngineResult<f64> {
        let bytes = self.read_exact(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(buf))
    }

    /// Reads a varint length and checks it against the bytes left
    pub fn read_len(&mut self) -> EngineResult<usize> {
        let len = self.read_vlong()?;
        let len = usize::try_from(len)
            .map_err(|_| EngineError::serialization(format!("length {len} overflows usize")))?;
        if len > self.remaining() {
            return Err(EngineError::serialization(format!(
                "declared length {} exceeds {} remaining bytes",
                len,
                self.remaining()
            )));
        }
        Ok(len)
    }

    pub fn read_string(&mut self) -> EngineResult<String> {
        let len = self.read_len()?;
        let bytes = self.read_exact(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| EngineError::serialization(format!("invalid UTF-8: {e}")))
    }

    pub fn read_uuid(&mut self) -> EngineResult<Uuid> {
        let bytes = self.read_exact(16)?;
        Uuid::from_slice(bytes).map_err(|e| EngineError::serialization(format!("invalid uuid: {e}")))
    }

    /// Reads a length-prefixed sequence written by `StreamOutput::write_collection`
    pub fn read_collection<T, F>(&mut self, mut read_item: F) -> EngineResult<Vec<T>>
    where
        F: FnMut(&mut Self) -> EngineResult<T>,
    {
        // every element occupies at least one byte
        let len = self.read_len()?;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(read_item(self)?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_input_is_error() {
        let mut input = StreamInput::new(&[1, 2]);
        assert!(matches!(
            input.read_f64(),
            Err(EngineError::Serialization(_))
        ));
    }

    #[test]
    fn test_unterminated_varint_is_error() {
        let mut input = StreamInput::new(&[0x80, 0x80]);
        assert!(input.read_vlong().is_err());
    }

    #[test]
    fn test_invalid_bool_byte() {
        let mut input = StreamInput::new(&[7]);
        assert!(input.read_bool().is_err());
    }

    #[test]
    fn test_string_length_beyond_input() {
        let mut input = StreamInput::new(&[10, b'a']);
        assert!(input.read_string().is_err());
    }

    #[test]
    fn test_invalid_utf8() {
        let mut input = StreamInput::new(&[2, 0xff, 0xfe]);
        assert!(input.read_string().is_err());
    }
}
