//! gridsql - distributed projection and aggregation engine
//!
//! - Typed symbol trees and projection plans with a binary wire form
//! - Projectors that filter, aggregate, group, sort and write row buckets
//! - Partial aggregation states merged across nodes
//! - Result transport with a context manager for out-of-order arrivals

pub mod aggregation;
pub mod cli;
pub mod config;
pub mod distributed;
pub mod errors;
pub mod executor;
pub mod functions;
pub mod observability;
pub mod projection;
pub mod row;
pub mod stream;
pub mod symbol;
pub mod types;

pub use config::EngineConfig;
pub use errors::{EngineError, EngineResult, ErrorCode};
