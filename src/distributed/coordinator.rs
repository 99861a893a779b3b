//! Job registration on the merge node

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use uuid::Uuid;

use super::context::ContextManager;
use super::merge::{JobOutcome, MergeContext};
use super::plan::MergePhase;
use crate::errors::{EngineError, EngineResult};
use crate::executor::{ProjectorChain, ProjectorFactory};
use crate::row::Row;

/// Registers merge phases and hands out job handles
pub struct Coordinator {
    manager: Arc<ContextManager>,
    factory: Arc<ProjectorFactory>,
    job_timeout: Duration,
}

impl Coordinator {
    pub fn new(
        manager: Arc<ContextManager>,
        factory: Arc<ProjectorFactory>,
        job_timeout: Duration,
    ) -> Self {
        Self {
            manager,
            factory,
            job_timeout,
        }
    }

    /// Builds the merge chain and registers the job's merge context
    pub fn register(&self, phase: &MergePhase) -> EngineResult<JobHandle> {
        let chain = ProjectorChain::build(&phase.projections, &self.factory)?;
        let (sender, outcome) = oneshot::channel();
        let context = Arc::new(MergeContext::new(phase, chain, sender)?);
        self.manager.register(Arc::clone(&context))?;
        Ok(JobHandle {
            job_id: phase.job_id,
            context,
            outcome,
            manager: Arc::clone(&self.manager),
            timeout: self.job_timeout,
        })
    }
}

/// Caller's end of a registered job
pub struct JobHandle {
    job_id: Uuid,
    context: Arc<MergeContext>,
    outcome: oneshot::Receiver<JobOutcome>,
    manager: Arc<ContextManager>,
    timeout: Duration,
}

impl JobHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Producers that signalled end of stream so far
    pub fn finished_producers(&self) -> usize {
        self.context.finished_producers()
    }

    /// Waits for the merged rows, up to the job timeout.
    ///
    /// On timeout the job is cancelled so late results are discarded.
    pub async fn result(&mut self) -> EngineResult<Vec<Row>> {
        match tokio::time::timeout(self.timeout, &mut self.outcome).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(EngineError::execution(format!(
                "job {} ended without a result",
                self.job_id
            ))),
            Err(_) => {
                let error = EngineError::JobTimeout {
                    job_id: self.job_id,
                    finished: self.context.finished_producers(),
                    expected: self.context.expected_producers(),
                };
                self.manager.fail(self.job_id, error.clone());
                Err(error)
            }
        }
    }

    /// Aborts the job; `result()` then returns `Cancelled`
    pub fn cancel(&self) {
        self.manager.cancel(self.job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::request::DistributedResultRequest;
    use crate::functions::FunctionRegistry;
    use crate::observability::MetricsRegistry;
    use crate::types::{DataType, Value};

    fn coordinator(job_timeout_ms: u64) -> Coordinator {
        let manager = Arc::new(ContextManager::new(
            Duration::from_millis(500),
            Arc::new(MetricsRegistry::new()),
        ));
        let factory = Arc::new(ProjectorFactory::new(Arc::new(FunctionRegistry::new())));
        Coordinator::new(manager, factory, Duration::from_millis(job_timeout_ms))
    }

    fn phase(producers: usize) -> MergePhase {
        MergePhase {
            job_id: Uuid::new_v4(),
            input_types: vec![DataType::Long],
            projections: vec![],
            producers,
        }
    }

    #[tokio::test]
    async fn test_result_after_all_producers() {
        let coordinator = coordinator(1_000);
        let phase = phase(2);
        let mut handle = coordinator.register(&phase).unwrap();

        for (producer, value) in [(0u32, 1i64), (1, 2)] {
            let payload = DistributedResultRequest::rows(
                phase.job_id,
                vec![vec![Value::Long(value)]].into(),
                true,
            )
            .from_producer(producer, 0)
            .encode(&[DataType::Long])
            .unwrap();
            coordinator.manager.receive(payload).await.unwrap();
        }

        let rows = handle.result().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(handle.finished_producers(), 2);
    }

    #[tokio::test]
    async fn test_job_timeout_reports_progress() {
        let coordinator = coordinator(30);
        let mut handle = coordinator.register(&phase(3)).unwrap();
        let err = handle.result().await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::JobTimeout {
                finished: 0,
                expected: 3,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cancel() {
        let coordinator = coordinator(1_000);
        let mut handle = coordinator.register(&phase(1)).unwrap();
        handle.cancel();
        assert_eq!(handle.result().await, Err(EngineError::Cancelled));
    }
}
