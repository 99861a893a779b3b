//! Context manager
//!
//! Routes incoming result requests to the merge context of their job.
//! Requests may arrive before the job registers; they wait for the
//! registration up to the configured timeout. Every wait is independent,
//! so a job that never registers only ever times out its own requests.
//! Finished jobs and recorded timeouts are remembered for a bounded
//! retention window.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{timeout_at, Instant};
use uuid::Uuid;

use super::merge::{Acceptance, MergeContext};
use super::request::{DistributedResultRequest, RequestHeader, ResultPayload};
use crate::errors::{EngineError, EngineResult};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};

/// What happened to one incoming request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Added to the job's partial results
    Delivered,
    /// Finished the job; the merge ran
    Completed,
    /// The job had already finished or been cancelled
    Discarded,
}

enum Lookup {
    Active(Arc<MergeContext>),
    Finished,
    Unknown,
}

/// Default window for remembering finished jobs and recorded timeouts
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60);

#[derive(Default)]
struct Registry {
    active: HashMap<Uuid, Arc<MergeContext>>,
    /// Retirement time of every finished job
    finished: HashMap<Uuid, Instant>,
    /// Errors recorded for jobs that had not registered yet
    pending_failures: HashMap<Uuid, (EngineError, Instant)>,
}

impl Registry {
    fn prune(&mut self, now: Instant, retention: Duration) {
        self.finished
            .retain(|_, retired| now.duration_since(*retired) < retention);
        self.pending_failures
            .retain(|_, (_, recorded)| now.duration_since(*recorded) < retention);
    }

    fn finish(&mut self, job_id: Uuid, retention: Duration) {
        let now = Instant::now();
        self.prune(now, retention);
        self.finished.insert(job_id, now);
    }
}

/// Registration table of merge contexts on one node
pub struct ContextManager {
    registry: Mutex<Registry>,
    registrations: watch::Sender<u64>,
    wait_timeout: Duration,
    retention: Duration,
    metrics: Arc<MetricsRegistry>,
}

impl ContextManager {
    pub fn new(wait_timeout: Duration, metrics: Arc<MetricsRegistry>) -> Self {
        let (registrations, _) = watch::channel(0);
        Self {
            registry: Mutex::new(Registry::default()),
            registrations,
            wait_timeout,
            retention: DEFAULT_RETENTION,
            metrics,
        }
    }

    /// Sets how long finished jobs and recorded timeouts are remembered
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    fn registry(&self) -> EngineResult<MutexGuard<'_, Registry>> {
        self.registry
            .lock()
            .map_err(|_| EngineError::execution("context registry poisoned"))
    }

    /// Makes a merge context visible to incoming requests and wakes waiters.
    ///
    /// A failure recorded while the job was unregistered fails the context
    /// right away.
    pub fn register(&self, context: Arc<MergeContext>) -> EngineResult<()> {
        let job_id = context.job_id();
        {
            let mut registry = self.registry()?;
            registry.prune(Instant::now(), self.retention);
            if registry.active.contains_key(&job_id) || registry.finished.contains_key(&job_id) {
                return Err(EngineError::invalid_plan(format!(
                    "job {job_id} is already registered"
                )));
            }
            if let Some((error, _)) = registry.pending_failures.remove(&job_id) {
                registry.finish(job_id, self.retention);
                drop(registry);
                self.registrations.send_modify(|generation| *generation += 1);
                self.metrics.increment_jobs_failed();
                log_event_with_fields(
                    Event::JobFailed,
                    &[("job_id", job_id.to_string().as_str()), ("reason", error.to_string().as_str())],
                );
                context.fail(error);
                return Ok(());
            }
            registry.active.insert(job_id, context);
        }
        self.registrations.send_modify(|generation| *generation += 1);
        log_event_with_fields(Event::JobRegistered, &[("job_id", job_id.to_string().as_str())]);
        Ok(())
    }

    /// Number of jobs currently accepting results
    pub fn active_jobs(&self) -> usize {
        self.registry().map(|r| r.active.len()).unwrap_or(0)
    }

    /// Active, finished and timed-out jobs the manager still remembers
    pub fn tracked_jobs(&self) -> usize {
        self.registry()
            .map(|r| r.active.len() + r.finished.len() + r.pending_failures.len())
            .unwrap_or(0)
    }

    fn lookup(&self, job_id: Uuid) -> EngineResult<Lookup> {
        let registry = self.registry()?;
        Ok(if let Some(context) = registry.active.get(&job_id) {
            Lookup::Active(Arc::clone(context))
        } else if registry.finished.contains_key(&job_id) {
            Lookup::Finished
        } else {
            Lookup::Unknown
        })
    }

    /// Waits until the job registers, finishes, or the timeout elapses
    async fn wait_for_context(&self, job_id: Uuid) -> EngineResult<Option<Arc<MergeContext>>> {
        let mut changes = self.registrations.subscribe();
        let deadline = Instant::now() + self.wait_timeout;
        let mut deferred = false;
        loop {
            match self.lookup(job_id)? {
                Lookup::Active(context) => {
                    if deferred {
                        log_event_with_fields(
                            Event::ResultDelivered,
                            &[("job_id", job_id.to_string().as_str()), ("deferred", "true")],
                        );
                    }
                    return Ok(Some(context));
                }
                Lookup::Finished => return Ok(None),
                Lookup::Unknown => {}
            }
            if !deferred {
                deferred = true;
                self.metrics.increment_results_deferred();
                log_event_with_fields(Event::ResultDeferred, &[("job_id", job_id.to_string().as_str())]);
            }
            match timeout_at(deadline, changes.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) | Err(_) => break,
            }
        }

        let waited_ms = self.wait_timeout.as_millis() as u64;
        let error = EngineError::ContextTimeout { job_id, waited_ms };
        {
            // the check and the record share one guard so a racing
            // registration either is seen here or sees the failure
            let mut registry = self.registry()?;
            if let Some(context) = registry.active.get(&job_id) {
                return Ok(Some(Arc::clone(context)));
            }
            if registry.finished.contains_key(&job_id) {
                return Ok(None);
            }
            let now = Instant::now();
            registry.prune(now, self.retention);
            registry.pending_failures.insert(job_id, (error.clone(), now));
        }
        self.metrics.increment_context_timeouts();
        log_event_with_fields(
            Event::ContextTimeout,
            &[
                ("job_id", job_id.to_string().as_str()),
                ("waited_ms", waited_ms.to_string().as_str()),
            ],
        );
        Err(error)
    }

    /// Handles one encoded result request
    pub async fn receive(&self, payload: Vec<u8>) -> EngineResult<Delivery> {
        self.metrics.increment_requests_received();
        let header = match RequestHeader::peek(&payload) {
            Ok(header) => header,
            Err(error) => {
                self.metrics.increment_malformed_payloads();
                log_event_with_fields(
                    Event::MalformedPayload,
                    &[("reason", error.to_string().as_str())],
                );
                return Err(error);
            }
        };
        let job_id = header.job_id;

        let context = match self.wait_for_context(job_id).await? {
            Some(context) => context,
            None => return Ok(self.discard(job_id)),
        };

        let request = match DistributedResultRequest::decode(&payload, context.input_types()) {
            Ok(request) => request,
            Err(error) => {
                self.metrics.increment_malformed_payloads();
                log_event_with_fields(
                    Event::MalformedPayload,
                    &[("job_id", job_id.to_string().as_str()), ("reason", error.to_string().as_str())],
                );
                self.fail(job_id, error.clone());
                return Err(error);
            }
        };
        if let ResultPayload::Rows(bucket) = &request.payload {
            self.metrics
                .add_rows_received(bucket.size().unwrap_or(0) as u64);
        }

        match context.accept(request) {
            Ok(Acceptance::Pending) => Ok(Delivery::Delivered),
            Ok(Acceptance::Closed) => Ok(self.discard(job_id)),
            Ok(Acceptance::Ready) => {
                self.complete(context).await;
                Ok(Delivery::Completed)
            }
            Err(EngineError::Remote(message)) => {
                self.fail(job_id, EngineError::Remote(message));
                Ok(Delivery::Completed)
            }
            Err(error) => {
                self.fail(job_id, error.clone());
                Err(error)
            }
        }
    }

    fn discard(&self, job_id: Uuid) -> Delivery {
        self.metrics.increment_results_discarded();
        log_event_with_fields(Event::ResultDiscarded, &[("job_id", job_id.to_string().as_str())]);
        Delivery::Discarded
    }

    /// Runs the merge on the blocking pool, retires the job, then publishes
    async fn complete(&self, context: Arc<MergeContext>) {
        let job_id = context.job_id();
        let merging = Arc::clone(&context);
        let outcome = tokio::task::spawn_blocking(move || merging.complete())
            .await
            .unwrap_or_else(|join_error| {
                Err(EngineError::execution(format!("merge task failed: {join_error}")))
            });
        self.retire(job_id);
        match &outcome {
            Ok(rows) => {
                self.metrics.increment_jobs_completed();
                log_event_with_fields(
                    Event::JobCompleted,
                    &[("job_id", job_id.to_string().as_str()), ("rows", rows.len().to_string().as_str())],
                );
            }
            Err(error) => {
                self.metrics.increment_jobs_failed();
                log_event_with_fields(
                    Event::JobFailed,
                    &[("job_id", job_id.to_string().as_str()), ("reason", error.to_string().as_str())],
                );
            }
        }
        context.publish(outcome);
    }

    /// Fails an active job; later results for it are discarded
    pub fn fail(&self, job_id: Uuid, error: EngineError) {
        if let Some(context) = self.retire(job_id) {
            self.metrics.increment_jobs_failed();
            log_event_with_fields(
                Event::JobFailed,
                &[("job_id", job_id.to_string().as_str()), ("reason", error.to_string().as_str())],
            );
            context.fail(error);
        }
    }

    /// Cancels an active job; later results for it are discarded
    pub fn cancel(&self, job_id: Uuid) {
        if let Some(context) = self.retire(job_id) {
            log_event_with_fields(Event::JobCancelled, &[("job_id", job_id.to_string().as_str())]);
            context.cancel();
        }
    }

    fn retire(&self, job_id: Uuid) -> Option<Arc<MergeContext>> {
        let mut registry = self.registry().ok()?;
        let context = registry.active.remove(&job_id);
        registry.finish(job_id, self.retention);
        context
    }
}
