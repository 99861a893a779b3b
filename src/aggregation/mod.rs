//! Aggregation engine
//!
//! Every aggregate follows the same contract:
//!
//! 1. `initial()` creates an empty state
//! 2. `iterate()` folds one row of arguments into a state, ignoring nulls
//! 3. `merge()` combines two partial states, consuming both
//! 4. `finalize()` turns a state into the result value, consuming it
//!
//! Merge is commutative and associative, so partial states may be combined
//! in whatever order they arrive from shards and nodes.

mod avg;
mod count;
mod minmax;
mod state;
mod sum;
mod variance;

use std::fmt;

pub use avg::AverageAggregation;
pub use count::CountAggregation;
pub use minmax::{ExtremeAggregation, ExtremeKind};
pub use state::{AggregationState, AverageState, CountState, ExtremeState, SumState, VarianceState};
pub use sum::SumAggregation;
pub use variance::VarianceAggregation;

use crate::errors::EngineResult;
use crate::symbol::FunctionInfo;
use crate::types::Value;

/// A resolved aggregate function
pub trait AggregateFunction: Send + Sync + fmt::Debug {
    /// Resolved signature, including the return type
    fn info(&self) -> &FunctionInfo;

    fn initial(&self) -> AggregationState;

    fn iterate(&self, state: &mut AggregationState, args: &[Value]) -> EngineResult<()>;

    fn merge(&self, a: AggregationState, b: AggregationState) -> EngineResult<AggregationState>;

    fn finalize(&self, state: AggregationState) -> EngineResult<Value>;
}
