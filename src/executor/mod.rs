//! Projector execution
//!
//! # Execution Flow
//!
//! 1. `ProjectorFactory` resolves every function of a projection list
//! 2. `ProjectorChain` checks the granularity order of the chain
//! 3. Each bucket runs through the projectors at the caller's granularity
//! 4. Projectors observe the `CancelFlag` once per row

mod aggregation;
mod cancel;
mod evaluator;
mod factory;
mod filter;
mod group;
mod order;
mod pipeline;
mod projector;
mod sorter;
mod topn;
mod write;

pub use aggregation::{AggregationProjector, Aggregator};
pub use cancel::CancelFlag;
pub use evaluator::Expression;
pub use factory::ProjectorFactory;
pub use filter::FilterProjector;
pub use group::GroupProjector;
pub use order::OrderProjector;
pub use pipeline::ProjectorChain;
pub use projector::Projector;
pub use sorter::{RowSorter, SortKey};
pub use topn::TopNProjector;
pub use write::{MemorySink, RowSink, WriteProjector};
