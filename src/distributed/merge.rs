//! Merge context: collects partial results of one job and runs the final chain

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;
use uuid::Uuid;

use super::plan::MergePhase;
use super::request::{DistributedResultRequest, ResultPayload};
use crate::errors::{EngineError, EngineResult};
use crate::executor::{CancelFlag, ProjectorChain};
use crate::projection::RowGranularity;
use crate::row::{Bucket, Row};
use crate::types::DataType;

/// Final outcome of a job as seen by its handle
pub type JobOutcome = EngineResult<Vec<Row>>;

/// What a context did with an accepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// More producers are outstanding
    Pending,
    /// Every producer finished; the merge may run
    Ready,
    /// The job is merging, finished, or was cancelled
    Closed,
}

/// Requests seen from one producer; requests may arrive in any order
#[derive(Debug, Default)]
struct ProducerProgress {
    received: u64,
    /// Known once the end-of-stream request arrived
    expected: Option<u64>,
}

impl ProducerProgress {
    fn is_complete(&self) -> bool {
        self.expected == Some(self.received)
    }
}

struct MergeState {
    partials: Vec<Bucket>,
    producers: HashMap<u32, ProducerProgress>,
    finished_producers: usize,
    chain: Option<ProjectorChain>,
    outcome: Option<oneshot::Sender<JobOutcome>>,
    /// Every producer finished; no further requests are taken
    merging: bool,
    closed: bool,
}

/// Per-job receiving end of a distributed execution
pub struct MergeContext {
    job_id: Uuid,
    input_types: Vec<DataType>,
    expected_producers: usize,
    cancel: CancelFlag,
    state: Mutex<MergeState>,
}

impl MergeContext {
    pub fn new(
        phase: &MergePhase,
        chain: ProjectorChain,
        outcome: oneshot::Sender<JobOutcome>,
    ) -> EngineResult<Self> {
        phase.validate()?;
        Ok(Self {
            job_id: phase.job_id,
            input_types: phase.input_types.clone(),
            expected_producers: phase.producers,
            cancel: CancelFlag::new(),
            state: Mutex::new(MergeState {
                partials: Vec::new(),
                producers: HashMap::new(),
                finished_producers: 0,
                chain: Some(chain),
                outcome: Some(outcome),
                merging: false,
                closed: false,
            }),
        })
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Column types of incoming partial results
    pub fn input_types(&self) -> &[DataType] {
        &self.input_types
    }

    pub fn expected_producers(&self) -> usize {
        self.expected_producers
    }

    pub fn finished_producers(&self) -> usize {
        self.state().map(|s| s.finished_producers).unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.state().map(|s| s.closed).unwrap_or(true)
    }

    fn state(&self) -> EngineResult<MutexGuard<'_, MergeState>> {
        self.state
            .lock()
            .map_err(|_| EngineError::execution(format!("merge state of job {} poisoned", self.job_id)))
    }

    /// Adds one decoded request to the partial results.
    ///
    /// A producer finishes once its end-of-stream request and every request
    /// numbered before it arrived. `Ready` is returned exactly once, for the
    /// request that finishes the last producer. A failure payload is returned
    /// as a `Remote` error; the caller fails the job with it.
    pub fn accept(&self, request: DistributedResultRequest) -> EngineResult<Acceptance> {
        let mut state = self.state()?;
        if state.closed || state.merging {
            return Ok(Acceptance::Closed);
        }
        let bucket = match request.payload {
            ResultPayload::Failure(message) => return Err(EngineError::Remote(message)),
            ResultPayload::Rows(bucket) => bucket,
        };
        if request.producer as usize >= self.expected_producers {
            return Err(EngineError::execution(format!(
                "job {} received rows from producer {} of {}",
                self.job_id, request.producer, self.expected_producers
            )));
        }

        let progress = state.producers.entry(request.producer).or_default();
        if progress.is_complete() {
            return Err(EngineError::execution(format!(
                "job {} received request {} after producer {} finished",
                self.job_id, request.sequence, request.producer
            )));
        }
        progress.received += 1;
        if request.is_last {
            if progress.expected.is_some() {
                return Err(EngineError::execution(format!(
                    "job {} received a second end of stream from producer {}",
                    self.job_id, request.producer
                )));
            }
            progress.expected = Some(request.sequence.saturating_add(1));
        }
        if matches!(progress.expected, Some(expected) if progress.received > expected) {
            return Err(EngineError::execution(format!(
                "job {} received more requests from producer {} than it announced",
                self.job_id, request.producer
            )));
        }
        let finished = progress.is_complete();

        state.partials.push(bucket);
        if finished {
            state.finished_producers += 1;
            if state.finished_producers == self.expected_producers {
                state.merging = true;
                return Ok(Acceptance::Ready);
            }
        }
        Ok(Acceptance::Pending)
    }

    /// Runs the merge chain over all partial results at CLUSTER granularity.
    ///
    /// The chain is consumed; a second merge is an error.
    pub fn merge(&self, partial_results: Vec<Bucket>) -> EngineResult<Vec<Row>> {
        let chain = self.state()?.chain.take();
        let mut chain = chain.ok_or_else(|| {
            EngineError::execution(format!("job {} already merged", self.job_id))
        })?;
        chain
            .run(Bucket::concat(partial_results), RowGranularity::Cluster, &self.cancel)?
            .into_rows()
    }

    /// Merges everything received so far; [`MergeContext::publish`] hands
    /// the outcome to the job handle
    pub fn complete(&self) -> JobOutcome {
        let partials = {
            let mut state = self.state()?;
            if state.closed {
                return Err(EngineError::Cancelled);
            }
            std::mem::take(&mut state.partials)
        };
        self.merge(partials)
    }

    /// Fails the job unless it already finished
    pub fn fail(&self, error: EngineError) {
        self.cancel.cancel();
        self.publish(Err(error));
    }

    pub fn cancel(&self) {
        self.fail(EngineError::Cancelled);
    }

    /// Closes the context and delivers `outcome`; only the first call has effect
    pub fn publish(&self, outcome: JobOutcome) {
        if let Ok(mut state) = self.state() {
            if state.closed {
                return;
            }
            state.closed = true;
            state.partials.clear();
            if let Some(sender) = state.outcome.take() {
                // the handle may have been dropped
                let _ = sender.send(outcome);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::executor::ProjectorFactory;
    use crate::functions::FunctionRegistry;
    use crate::projection::{
        AggregateStep, Aggregation, AggregationProjection, Projection,
    };
    use crate::symbol::Symbol;
    use crate::types::Value;

    fn sum_phase(producers: usize) -> (MergePhase, ProjectorChain) {
        let registry = Arc::new(FunctionRegistry::new());
        let info = registry.aggregate_info("sum", &[DataType::Long]).unwrap();
        let phase = MergePhase {
            job_id: Uuid::new_v4(),
            input_types: vec![DataType::Long],
            projections: vec![Projection::Aggregation(AggregationProjection::new(
                vec![Aggregation::new(
                    info,
                    vec![Symbol::reference(0, DataType::Long)],
                    AggregateStep::Iter,
                    AggregateStep::Final,
                )],
                RowGranularity::Cluster,
            ))],
            producers,
        };
        let chain = ProjectorChain::build(&phase.projections, &ProjectorFactory::new(registry)).unwrap();
        (phase, chain)
    }

    fn rows(values: &[i64]) -> Bucket {
        values.iter().map(|v| vec![Value::Long(*v)]).collect::<Vec<_>>().into()
    }

    #[test]
    fn test_ready_after_every_producer_finished() {
        let (phase, chain) = sum_phase(2);
        let (tx, mut rx) = oneshot::channel();
        let context = MergeContext::new(&phase, chain, tx).unwrap();

        let id = phase.job_id;
        assert_eq!(
            context
                .accept(DistributedResultRequest::rows(id, rows(&[1, 2]), false).from_producer(0, 0))
                .unwrap(),
            Acceptance::Pending
        );
        assert_eq!(
            context
                .accept(DistributedResultRequest::rows(id, rows(&[3]), true).from_producer(0, 1))
                .unwrap(),
            Acceptance::Pending
        );
        assert_eq!(
            context
                .accept(DistributedResultRequest::rows(id, Bucket::empty(), true).from_producer(1, 0))
                .unwrap(),
            Acceptance::Ready
        );

        let result = context.complete().unwrap();
        assert_eq!(result, vec![vec![Value::Long(6)]]);
        context.publish(Ok(result.clone()));
        assert_eq!(rx.try_recv().unwrap().unwrap(), result);
        assert!(context.is_closed());
    }

    #[test]
    fn test_end_of_stream_before_earlier_requests() {
        let (phase, chain) = sum_phase(1);
        let (tx, _rx) = oneshot::channel();
        let context = MergeContext::new(&phase, chain, tx).unwrap();
        let id = phase.job_id;

        let last = DistributedResultRequest::rows(id, rows(&[3]), true).from_producer(0, 2);
        assert_eq!(context.accept(last).unwrap(), Acceptance::Pending);
        let first = DistributedResultRequest::rows(id, rows(&[1]), false).from_producer(0, 0);
        assert_eq!(context.accept(first).unwrap(), Acceptance::Pending);
        let second = DistributedResultRequest::rows(id, rows(&[2]), false).from_producer(0, 1);
        assert_eq!(context.accept(second).unwrap(), Acceptance::Ready);

        // nothing is taken once the merge may run
        let late = DistributedResultRequest::rows(id, rows(&[9]), false).from_producer(0, 3);
        assert_eq!(context.accept(late).unwrap(), Acceptance::Closed);
        assert_eq!(context.complete().unwrap(), vec![vec![Value::Long(6)]]);
    }

    #[test]
    fn test_unknown_producer_rejected() {
        let (phase, chain) = sum_phase(1);
        let (tx, _rx) = oneshot::channel();
        let context = MergeContext::new(&phase, chain, tx).unwrap();
        let request = DistributedResultRequest::rows(phase.job_id, rows(&[1]), true).from_producer(1, 0);
        assert!(matches!(context.accept(request), Err(EngineError::Execution(_))));
    }

    #[test]
    fn test_failure_payload_is_remote_error() {
        let (phase, chain) = sum_phase(1);
        let (tx, _rx) = oneshot::channel();
        let context = MergeContext::new(&phase, chain, tx).unwrap();
        let err = context
            .accept(DistributedResultRequest::failure(phase.job_id, "boom"))
            .unwrap_err();
        assert_eq!(err, EngineError::Remote("boom".to_string()));
    }

    #[test]
    fn test_cancelled_context_discards() {
        let (phase, chain) = sum_phase(1);
        let (tx, mut rx) = oneshot::channel();
        let context = MergeContext::new(&phase, chain, tx).unwrap();
        context.cancel();
        assert_eq!(rx.try_recv().unwrap(), Err(EngineError::Cancelled));
        assert_eq!(
            context
                .accept(DistributedResultRequest::rows(phase.job_id, rows(&[1]), true))
                .unwrap(),
            Acceptance::Closed
        );
    }

    #[test]
    fn test_merge_runs_once() {
        let (phase, chain) = sum_phase(1);
        let (tx, _rx) = oneshot::channel();
        let context = MergeContext::new(&phase, chain, tx).unwrap();
        assert_eq!(
            context.merge(vec![rows(&[4]), rows(&[5])]).unwrap(),
            vec![vec![Value::Long(9)]]
        );
        assert!(context.merge(vec![]).is_err());
    }
}
