//! In-process cluster: one merge node plus simulated producer nodes

use std::sync::Arc;

use tokio::task::JoinHandle;
use uuid::Uuid;

use super::context::ContextManager;
use super::coordinator::Coordinator;
use super::node::NodeExecutor;
use super::plan::ExecutionPlan;
use super::transport::{spawn_receiver, LocalTransport, ResultTransport};
use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult};
use crate::executor::{CancelFlag, ProjectorFactory};
use crate::observability::MetricsRegistry;
use crate::row::{Bucket, Row};

/// Name of the merge node in a local cluster
pub const MERGE_NODE: &str = "merge";

/// Wires a context manager, coordinator and transport together in one process
pub struct LocalCluster {
    config: EngineConfig,
    factory: Arc<ProjectorFactory>,
    transport: Arc<LocalTransport>,
    coordinator: Coordinator,
    metrics: Arc<MetricsRegistry>,
    receiver: JoinHandle<()>,
}

impl LocalCluster {
    /// Must be called inside a tokio runtime
    pub fn new(config: EngineConfig, factory: Arc<ProjectorFactory>) -> EngineResult<Self> {
        config.validate()?;
        let metrics = Arc::new(MetricsRegistry::new());
        let manager = Arc::new(
            ContextManager::new(config.context_wait_timeout(), Arc::clone(&metrics))
                .with_retention(config.job_retention()),
        );
        let transport = Arc::new(LocalTransport::new());
        let inbox = transport.bind(MERGE_NODE)?;
        let receiver = spawn_receiver(Arc::clone(&manager), inbox);
        let coordinator = Coordinator::new(manager, Arc::clone(&factory), config.job_timeout());
        Ok(Self {
            config,
            factory,
            transport,
            coordinator,
            metrics,
            receiver,
        })
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Runs `plan` with one producer node per entry of `nodes`, each holding its shards
    pub async fn run(&self, plan: &ExecutionPlan, nodes: Vec<Vec<Bucket>>) -> EngineResult<Vec<Row>> {
        if u32::try_from(nodes.len()).is_err() {
            return Err(EngineError::invalid_plan("too many producer nodes"));
        }
        let job_id = Uuid::new_v4();
        let (collect, merge) = plan.phases(job_id, MERGE_NODE, nodes.len());
        let mut handle = self.coordinator.register(&merge)?;
        let collect = Arc::new(collect);
        let cancel = CancelFlag::new();

        let mut producers = Vec::with_capacity(nodes.len());
        for (index, shards) in nodes.into_iter().enumerate() {
            let executor = NodeExecutor::new(
                format!("node-{index}"),
                &self.config,
                Arc::clone(&self.factory),
                Arc::clone(&self.transport) as Arc<dyn ResultTransport>,
                Arc::clone(&self.metrics),
            );
            let producer = index as u32;
            let collect = Arc::clone(&collect);
            let cancel = cancel.clone();
            producers.push(tokio::spawn(async move {
                executor.execute(&collect, producer, shards, &cancel).await
            }));
        }

        let result = handle.result().await;
        if result.is_err() {
            cancel.cancel();
        }
        // producer errors already reached the merge node as failure requests
        for producer in producers {
            let _ = producer.await;
        }
        result
    }
}

impl Drop for LocalCluster {
    fn drop(&mut self) {
        self.receiver.abort();
    }
}
