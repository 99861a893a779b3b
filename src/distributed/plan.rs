//! Collect and merge phases of a distributed job

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult};
use crate::projection::Projection;
use crate::stream::{StreamInput, StreamOutput};
use crate::types::DataType;

/// Name of a node in the cluster
pub type NodeId = String;

/// Column types produced by the last projection, or `input` when there is none
fn chain_output_types(projections: &[Projection], input: &[DataType]) -> Vec<DataType> {
    match projections.last() {
        Some(last) => last.outputs().iter().map(|s| s.value_type()).collect(),
        None => input.to_vec(),
    }
}

/// Work each producer node runs over its local shards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectPhase {
    pub job_id: Uuid,
    /// Run once per shard at SHARD granularity
    #[serde(default)]
    pub shard_projections: Vec<Projection>,
    /// Run over the concatenated shard results at NODE granularity
    #[serde(default)]
    pub node_projections: Vec<Projection>,
    /// Row shape shipped to the merge node
    pub output_types: Vec<DataType>,
    /// Node running the matching merge phase
    pub merge_node: NodeId,
}

impl CollectPhase {
    pub fn write_to(&self, out: &mut StreamOutput) -> EngineResult<()> {
        out.write_uuid(&self.job_id);
        Projection::write_all(&self.shard_projections, out)?;
        Projection::write_all(&self.node_projections, out)?;
        out.write_collection(&self.output_types, |out, t| t.write_to(out));
        out.write_string(&self.merge_node);
        Ok(())
    }

    pub fn read_from(input: &mut StreamInput<'_>) -> EngineResult<Self> {
        Ok(Self {
            job_id: input.read_uuid()?,
            shard_projections: Projection::read_all(input)?,
            node_projections: Projection::read_all(input)?,
            output_types: input.read_collection(DataType::read_from)?,
            merge_node: input.read_string()?,
        })
    }
}

/// Work the merge node runs once every producer finished
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergePhase {
    pub job_id: Uuid,
    /// Row shape of incoming partial results
    pub input_types: Vec<DataType>,
    /// Run over all partial results at CLUSTER granularity
    #[serde(default)]
    pub projections: Vec<Projection>,
    /// Number of producers that must signal end of stream
    pub producers: usize,
}

impl MergePhase {
    pub fn validate(&self) -> EngineResult<()> {
        if self.producers == 0 {
            return Err(EngineError::invalid_plan(format!(
                "merge phase of job {} expects no producers",
                self.job_id
            )));
        }
        Ok(())
    }

    pub fn output_types(&self) -> Vec<DataType> {
        chain_output_types(&self.projections, &self.input_types)
    }

    pub fn write_to(&self, out: &mut StreamOutput) -> EngineResult<()> {
        out.write_uuid(&self.job_id);
        out.write_collection(&self.input_types, |out, t| t.write_to(out));
        Projection::write_all(&self.projections, out)?;
        out.write_vlong(self.producers as u64);
        Ok(())
    }

    pub fn read_from(input: &mut StreamInput<'_>) -> EngineResult<Self> {
        let job_id = input.read_uuid()?;
        let input_types = input.read_collection(DataType::read_from)?;
        let projections = Projection::read_all(input)?;
        let producers = usize::try_from(input.read_vlong()?)
            .map_err(|_| EngineError::serialization("producer count overflows usize"))?;
        Ok(Self {
            job_id,
            input_types,
            projections,
            producers,
        })
    }
}

/// Planner output for one query, before it is bound to a job and a cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Row shape of the raw shard rows
    pub input_types: Vec<DataType>,
    #[serde(default)]
    pub shard_projections: Vec<Projection>,
    #[serde(default)]
    pub node_projections: Vec<Projection>,
    #[serde(default)]
    pub merge_projections: Vec<Projection>,
}

impl ExecutionPlan {
    /// Row shape leaving each producer node
    pub fn intermediate_types(&self) -> Vec<DataType> {
        let shard = chain_output_types(&self.shard_projections, &self.input_types);
        chain_output_types(&self.node_projections, &shard)
    }

    /// Binds the plan to a job id, a merge node and a producer count
    pub fn phases(
        &self,
        job_id: Uuid,
        merge_node: impl Into<NodeId>,
        producers: usize,
    ) -> (CollectPhase, MergePhase) {
        let output_types = self.intermediate_types();
        let collect = CollectPhase {
            job_id,
            shard_projections: self.shard_projections.clone(),
            node_projections: self.node_projections.clone(),
            output_types: output_types.clone(),
            merge_node: merge_node.into(),
        };
        let merge = MergePhase {
            job_id,
            input_types: output_types,
            projections: self.merge_projections.clone(),
            producers,
        };
        (collect, merge)
    }
}
