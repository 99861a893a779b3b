//! Binary stream primitives shared by every wire codec.
//!
//! Integers that are usually small use LEB128 variable-length encoding,
//! signed ones zig-zag mapped first. Floats are fixed-width little-endian.
//! Strings are a varint byte length followed by UTF-8.

mod input;
mod output;

pub use input::StreamInput;
pub use output::StreamOutput;

/// Maximum encoded length of a varint carrying a u32
pub const MAX_VINT_LEN: usize = 5;

/// Maximum encoded length of a varint carrying a u64
pub const MAX_VLONG_LEN: usize = 10;

/// Zig-zag maps a signed value onto an unsigned one so small magnitudes stay short
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`]
pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
