//! Function resolution
//!
//! Scalar functions are evaluated per row by the expression compiler;
//! aggregate functions live in [`crate::aggregation`] and are looked up here.

mod registry;
mod scalar;

pub use registry::{AggregateResolver, FunctionRegistry, ScalarResolver};
pub use scalar::{BuiltinScalar, ScalarFunction};
