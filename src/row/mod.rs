//! Rows and buckets
//!
//! A bucket is the unit passed between projectors: either a materialized
//! list of rows with a known size, or a lazily produced stream whose size
//! is only known once drained.

mod bucket;

pub use bucket::{Bucket, RowIter};

use crate::types::Value;

/// A fixed-arity row of values
pub type Row = Vec<Value>;
