//! Distributed execution
//!
//! Producer nodes run a [`CollectPhase`] over their shards and stream the
//! rows to the merge node as [`DistributedResultRequest`]s. The merge node's
//! [`ContextManager`] routes each request to the [`MergeContext`] of its job,
//! which runs the [`MergePhase`] chain once every producer finished.

mod cluster;
mod context;
mod coordinator;
mod merge;
mod node;
mod plan;
mod request;
mod transport;

pub use cluster::{LocalCluster, MERGE_NODE};
pub use context::{ContextManager, Delivery};
pub use coordinator::{Coordinator, JobHandle};
pub use merge::{Acceptance, JobOutcome, MergeContext};
pub use node::NodeExecutor;
pub use plan::{CollectPhase, ExecutionPlan, MergePhase, NodeId};
pub use request::{
    compute_checksum, DistributedResultRequest, RequestHeader, ResultPayload, REQUEST_VERSION,
};
pub use transport::{spawn_receiver, LocalTransport, ResultTransport};
