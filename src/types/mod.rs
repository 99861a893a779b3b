//! Logical types, runtime values and their wire streamers

mod data_type;
mod streamer;
mod value;

pub use data_type::DataType;
pub use streamer::{streamer_for, streamers_for, Streamer};
pub use value::Value;
