//! Node-side execution of collect phases

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::plan::{CollectPhase, NodeId};
use super::request::DistributedResultRequest;
use super::transport::ResultTransport;
use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult};
use crate::executor::{CancelFlag, ProjectorChain, ProjectorFactory};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::projection::RowGranularity;
use crate::row::{Bucket, Row};

/// Runs collect phases over local shards and ships the results
pub struct NodeExecutor {
    node_id: NodeId,
    factory: Arc<ProjectorFactory>,
    transport: Arc<dyn ResultTransport>,
    metrics: Arc<MetricsRegistry>,
    shard_slots: Arc<Semaphore>,
    rows_per_request: usize,
}

impl NodeExecutor {
    pub fn new(
        node_id: impl Into<NodeId>,
        config: &EngineConfig,
        factory: Arc<ProjectorFactory>,
        transport: Arc<dyn ResultTransport>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            factory,
            transport,
            metrics,
            shard_slots: Arc::new(Semaphore::new(config.max_concurrent_shards)),
            rows_per_request: config.rows_per_request,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Runs `phase` over `shards` and sends the rows to the merge node as
    /// producer number `producer` of the job.
    ///
    /// A failing collect phase is reported to the merge node as a failure
    /// request before the error is returned. Returns the number of rows sent.
    pub async fn execute(
        &self,
        phase: &CollectPhase,
        producer: u32,
        shards: Vec<Bucket>,
        cancel: &CancelFlag,
    ) -> EngineResult<usize> {
        let job_id = phase.job_id.to_string();
        log_event_with_fields(
            Event::CollectStart,
            &[
                ("job_id", job_id.as_str()),
                ("node", self.node_id.as_str()),
                ("shards", shards.len().to_string().as_str()),
            ],
        );

        match self.collect(phase, shards, cancel).await {
            Ok(rows) => {
                let sent = rows.len();
                self.send_rows(phase, producer, rows)?;
                log_event_with_fields(
                    Event::CollectComplete,
                    &[
                        ("job_id", job_id.as_str()),
                        ("node", self.node_id.as_str()),
                        ("rows", sent.to_string().as_str()),
                    ],
                );
                Ok(sent)
            }
            Err(error) => {
                log_event_with_fields(
                    Event::CollectFailed,
                    &[
                        ("job_id", job_id.as_str()),
                        ("node", self.node_id.as_str()),
                        ("reason", error.to_string().as_str()),
                    ],
                );
                let failure = DistributedResultRequest::failure(phase.job_id, error.to_string())
                    .from_producer(producer, 0)
                    .encode(&phase.output_types)?;
                self.send(&phase.merge_node, failure)?;
                Err(error)
            }
        }
    }

    /// Shard chains in parallel on the blocking pool, then the node chain
    async fn collect(
        &self,
        phase: &CollectPhase,
        shards: Vec<Bucket>,
        cancel: &CancelFlag,
    ) -> EngineResult<Vec<Row>> {
        let mut tasks: Vec<JoinHandle<EngineResult<Vec<Row>>>> = Vec::with_capacity(shards.len());
        for shard in shards {
            // build per shard; projectors carry state
            let mut chain = ProjectorChain::build(&phase.shard_projections, &self.factory)?;
            let permit = Arc::clone(&self.shard_slots)
                .acquire_owned()
                .await
                .map_err(|e| EngineError::execution(format!("failed to acquire shard slot: {e}")))?;
            let cancel = cancel.clone();
            tasks.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                chain
                    .run(shard, RowGranularity::Shard, &cancel)?
                    .into_rows()
            }));
        }

        let mut shard_results = Vec::with_capacity(tasks.len());
        for task in tasks {
            let rows = task
                .await
                .map_err(|e| EngineError::execution(format!("shard task failed: {e}")))??;
            shard_results.push(Bucket::materialized(rows));
        }

        let mut node_chain = ProjectorChain::build(&phase.node_projections, &self.factory)?;
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            node_chain
                .run(Bucket::concat(shard_results), RowGranularity::Node, &cancel)?
                .into_rows()
        })
        .await
        .map_err(|e| EngineError::execution(format!("node task failed: {e}")))?
    }

    /// Splits rows into numbered requests of at most `rows_per_request`;
    /// the last one ends the stream
    fn send_rows(&self, phase: &CollectPhase, producer: u32, rows: Vec<Row>) -> EngineResult<()> {
        let mut rows = rows.into_iter().peekable();
        for sequence in 0u64.. {
            let chunk: Vec<Row> = rows.by_ref().take(self.rows_per_request).collect();
            let is_last = rows.peek().is_none();
            let payload = DistributedResultRequest::rows(phase.job_id, chunk.into(), is_last)
                .from_producer(producer, sequence)
                .encode(&phase.output_types)?;
            self.send(&phase.merge_node, payload)?;
            if is_last {
                break;
            }
        }
        Ok(())
    }

    fn send(&self, node: &NodeId, payload: Vec<u8>) -> EngineResult<()> {
        self.transport.send(node, payload)?;
        self.metrics.increment_requests_sent();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::distributed::request::{RequestHeader, ResultPayload};
    use crate::distributed::transport::LocalTransport;
    use crate::functions::FunctionRegistry;
    use crate::projection::{FilterProjection, Projection};
    use crate::symbol::Symbol;
    use crate::types::{DataType, Value};

    fn executor(rows_per_request: usize) -> (NodeExecutor, tokio::sync::mpsc::UnboundedReceiver<Vec<u8>>) {
        let transport = Arc::new(LocalTransport::new());
        let inbox = transport.bind("merge").unwrap();
        let config = EngineConfig {
            rows_per_request,
            ..EngineConfig::default()
        };
        let factory = Arc::new(ProjectorFactory::new(Arc::new(FunctionRegistry::new())));
        let node = NodeExecutor::new("n1", &config, factory, transport, Arc::new(MetricsRegistry::new()));
        (node, inbox)
    }

    fn phase(shard_projections: Vec<Projection>) -> CollectPhase {
        CollectPhase {
            job_id: Uuid::new_v4(),
            shard_projections,
            node_projections: vec![],
            output_types: vec![DataType::Long],
            merge_node: "merge".to_string(),
        }
    }

    fn shard(values: &[i64]) -> Bucket {
        values.iter().map(|v| vec![Value::Long(*v)]).collect::<Vec<_>>().into()
    }

    #[tokio::test]
    async fn test_rows_are_chunked() {
        let (node, mut inbox) = executor(2);
        let phase = phase(vec![]);
        let sent = node
            .execute(&phase, 2, vec![shard(&[1, 2, 3]), shard(&[4, 5])], &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(sent, 5);

        let mut values = Vec::new();
        let mut last_flags = Vec::new();
        let mut sequences = Vec::new();
        while let Ok(payload) = inbox.try_recv() {
            let request = DistributedResultRequest::decode(&payload, &[DataType::Long]).unwrap();
            assert_eq!(request.producer, 2);
            sequences.push(request.sequence);
            last_flags.push(request.is_last);
            if let ResultPayload::Rows(bucket) = request.payload {
                values.extend(bucket.into_rows().unwrap());
            }
        }
        assert_eq!(last_flags, vec![false, false, true]);
        assert_eq!(sequences, vec![0, 1, 2]);
        assert_eq!(values.len(), 5);
    }

    #[tokio::test]
    async fn test_empty_result_still_ends_stream() {
        let (node, mut inbox) = executor(10);
        let sent = node
            .execute(&phase(vec![]), 0, vec![], &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(sent, 0);
        let header = RequestHeader::peek(&inbox.try_recv().unwrap()).unwrap();
        assert!(header.is_last);
        assert!(inbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failure_is_reported_to_merge_node() {
        let (node, mut inbox) = executor(10);
        // filter at CLUSTER cannot run on a shard
        let filter = Projection::Filter(FilterProjection::new(
            Symbol::literal(true),
            vec![Symbol::reference(0, DataType::Long)],
        ));
        let err = node
            .execute(&phase(vec![filter]), 1, vec![shard(&[1])], &CancelFlag::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::GranularityViolation { .. }));

        let header = RequestHeader::peek(&inbox.try_recv().unwrap()).unwrap();
        assert!(header.is_failure);
        assert_eq!(header.producer, 1);
    }

    #[tokio::test]
    async fn test_cancelled_collect_fails() {
        let (node, _inbox) = executor(10);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let filter = Projection::Filter(
            FilterProjection::new(
                Symbol::literal(true),
                vec![Symbol::reference(0, DataType::Long)],
            )
            .with_granularity(RowGranularity::Shard),
        );
        let err = node
            .execute(&phase(vec![filter]), 0, vec![shard(&[1])], &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::Cancelled);
    }
}
