//! Quota-aware request scheduler.
//!
//! Each resource class gets its own lane: a bounded FIFO queue drained by a
//! single consumer task. A consumer runs one operation at a time through the
//! retry loop, so a class waiting for its quota window to reset never blocks
//! the other classes. A panicking action fails only its own operation.
//!
//! Lanes for `core`, `search` and `graphql` live as long as the scheduler.
//! Lanes for any other class name are retired as soon as they run dry and
//! are recreated on the next submission.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{oneshot, Notify};

use crate::core::{
    build_audit_event, run_async, run_blocking, ApiOperation, AuditAction, AuditSink,
    BackoffPolicy, BlockingOperation, QuotaRecord, QuotaTracker, ResponseCache, RetryDriver,
    ThrottleError,
};
use crate::infra::queue::InMemoryQueue;
use crate::util::serde::{OperationId, ResourceClass};

/// Default bound on queued operations per resource class.
pub const DEFAULT_MAX_QUEUE_DEPTH: usize = 1000;

/// Abstraction for queue backends holding pending operations.
pub trait OperationQueue<J> {
    /// Enqueue a job if space permits.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::QueueFull`] when the queue is at its depth limit.
    fn enqueue(&mut self, job: J) -> Result<(), ThrottleError>;
    /// Dequeue the oldest job.
    fn dequeue(&mut self) -> Option<J>;
    /// Remove and return every queued job, oldest first.
    fn drain(&mut self) -> Vec<J>;
    /// Maximum depth allowed for this queue.
    fn max_depth(&self) -> usize;
    /// Current depth.
    fn len(&self) -> usize;
    /// Whether nothing is queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Abstraction for spawning lane consumers on a runtime.
pub trait Spawn {
    /// Spawn an async task that returns a future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Scheduler construction options beyond the shared components.
#[derive(Clone, Default)]
pub struct SchedulerOptions {
    /// Per-class queue bound. Zero means [`DEFAULT_MAX_QUEUE_DEPTH`].
    pub max_queue_depth: usize,
    /// Sink for lifecycle events.
    pub audit: Option<Arc<dyn AuditSink>>,
}

impl fmt::Debug for SchedulerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerOptions")
            .field("max_queue_depth", &self.max_queue_depth)
            .field("audit", &self.audit.is_some())
            .finish()
    }
}

/// Statistics about scheduler throughput.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Operations accepted, queued or blocking.
    pub submitted: u64,
    /// Operations resolved with a value.
    pub completed: u64,
    /// Operations resolved with a terminal error.
    pub failed: u64,
    /// Backoff retries across all operations.
    pub retries: u64,
    /// Cached submissions answered without a call.
    pub cache_hits: u64,
    /// Submissions refused because a queue was full.
    pub rejected: u64,
}

/// Internal counters for scheduler statistics (thread-safe).
#[derive(Debug, Default)]
struct SchedulerCounters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
    cache_hits: AtomicU64,
    rejected: AtomicU64,
}

impl SchedulerCounters {
    fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
type OnSuccess<T> = Box<dyn FnOnce(&T) + Send + 'static>;
type Job = Box<dyn Dispatch>;

/// A queued operation with its result type erased.
trait Dispatch: Send {
    fn id(&self) -> OperationId;
    fn run(self: Box<Self>, shared: Arc<Shared>) -> BoxFuture;
    fn reject(self: Box<Self>, err: ThrottleError);
}

struct QueuedOperation<T, O> {
    id: OperationId,
    resource_class: ResourceClass,
    action: O,
    result_tx: oneshot::Sender<Result<T, ThrottleError>>,
    on_success: Option<OnSuccess<T>>,
}

impl<T, O> Dispatch for QueuedOperation<T, O>
where
    T: Send + 'static,
    O: ApiOperation<T>,
{
    fn id(&self) -> OperationId {
        self.id
    }

    fn run(self: Box<Self>, shared: Arc<Shared>) -> BoxFuture {
        Box::pin(async move {
            let Self {
                id,
                resource_class,
                mut action,
                result_tx,
                on_success,
            } = *self;
            shared.record_audit(id, &resource_class, AuditAction::Start, None);
            tracing::debug!(operation_id = id, resource_class = %resource_class, "executing operation");

            let mut driver = shared.driver(id, resource_class.clone());
            let outcome = AssertUnwindSafe(run_async(&mut driver, &mut action))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    let message = panic_message(&*payload);
                    tracing::error!(
                        operation_id = id,
                        resource_class = %resource_class,
                        panic = %message,
                        "operation panicked"
                    );
                    Err(ThrottleError::Panicked {
                        operation_id: id,
                        resource_class: resource_class.clone(),
                        message,
                    })
                });
            if let (Ok(value), Some(hook)) = (&outcome, on_success) {
                if std::panic::catch_unwind(AssertUnwindSafe(|| hook(value))).is_err() {
                    tracing::warn!(operation_id = id, "result hook panicked, value not cached");
                }
            }
            shared.finish(id, &resource_class, driver.retries(), &outcome);

            if result_tx.send(outcome).is_err() {
                tracing::debug!(
                    operation_id = id,
                    resource_class = %resource_class,
                    "caller stopped waiting, result discarded"
                );
            }
        })
    }

    fn reject(self: Box<Self>, err: ThrottleError) {
        let _ = self.result_tx.send(Err(err));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|msg| (*msg).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// One resource class: its queue and the signal that wakes its consumer.
struct Lane {
    resource_class: ResourceClass,
    queue: Mutex<InMemoryQueue<Job>>,
    notify: Notify,
}

/// State shared between the scheduler handle and its lane consumers.
struct Shared {
    tracker: Arc<QuotaTracker>,
    cache: Arc<ResponseCache<Value>>,
    policy: BackoffPolicy,
    counters: SchedulerCounters,
    audit: Option<Arc<dyn AuditSink>>,
    lanes: Mutex<HashMap<ResourceClass, Arc<Lane>>>,
    max_queue_depth: usize,
    shutdown: AtomicBool,
    next_id: AtomicU64,
}

impl Shared {
    fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn next_id(&self) -> OperationId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn driver(&self, id: OperationId, resource_class: ResourceClass) -> RetryDriver {
        RetryDriver::new(
            Arc::clone(&self.tracker),
            self.policy.clone(),
            id,
            resource_class,
        )
        .with_audit(self.audit.clone())
    }

    fn record_audit(
        &self,
        id: OperationId,
        resource_class: &ResourceClass,
        action: AuditAction,
        detail: Option<String>,
    ) {
        if let Some(sink) = &self.audit {
            sink.record(build_audit_event(id, resource_class, action, detail));
        }
    }

    fn finish<T>(
        &self,
        id: OperationId,
        resource_class: &ResourceClass,
        retries: u32,
        outcome: &Result<T, ThrottleError>,
    ) {
        self.counters
            .retries
            .fetch_add(u64::from(retries), Ordering::Relaxed);
        match outcome {
            Ok(_) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    operation_id = id,
                    resource_class = %resource_class,
                    retries,
                    "operation completed"
                );
                self.record_audit(
                    id,
                    resource_class,
                    AuditAction::Complete,
                    Some(format!("attempts={}", retries + 1)),
                );
            }
            Err(err) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                self.record_audit(id, resource_class, AuditAction::Fail, Some(err.to_string()));
            }
        }
    }

    /// Flip the shutdown flag and wake every consumer. Returns `None` if
    /// already closed, otherwise the number of lanes.
    fn close(&self) -> Option<usize> {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return None;
        }
        let lanes: Vec<Arc<Lane>> = self.lanes.lock().values().cloned().collect();
        for lane in &lanes {
            self.drain_lane(lane);
            lane.notify.notify_one();
        }
        Some(lanes.len())
    }

    /// Unregister `lane` if it is idle and not one of the builtin classes.
    /// Returns whether its consumer should exit.
    fn retire_if_idle(&self, lane: &Arc<Lane>) -> bool {
        if lane.resource_class.is_builtin() {
            return false;
        }
        let mut lanes = self.lanes.lock();
        if !lane.queue.lock().is_empty() {
            return false;
        }
        if lanes
            .get(&lane.resource_class)
            .is_some_and(|current| Arc::ptr_eq(current, lane))
        {
            lanes.remove(&lane.resource_class);
        }
        true
    }

    /// Resolve every queued job on `lane` with [`ThrottleError::Shutdown`].
    fn drain_lane(&self, lane: &Lane) {
        let jobs = lane.queue.lock().drain();
        if jobs.is_empty() {
            return;
        }
        tracing::warn!(
            resource_class = %lane.resource_class,
            dropped = jobs.len(),
            "rejecting queued operations on shutdown"
        );
        for job in jobs {
            self.record_audit(
                job.id(),
                &lane.resource_class,
                AuditAction::Reject,
                Some("scheduler shut down".into()),
            );
            job.reject(ThrottleError::Shutdown);
        }
    }
}

/// Drain one lane until the scheduler shuts down.
async fn consume(shared: Arc<Shared>, lane: Arc<Lane>) {
    tracing::info!(resource_class = %lane.resource_class, "lane consumer started");
    loop {
        let next = lane.queue.lock().dequeue();
        match next {
            Some(job) if shared.is_shut_down() => job.reject(ThrottleError::Shutdown),
            Some(job) => {
                let id = job.id();
                let run = AssertUnwindSafe(job.run(Arc::clone(&shared)));
                if run.catch_unwind().await.is_err() {
                    tracing::error!(
                        operation_id = id,
                        resource_class = %lane.resource_class,
                        "panic while finishing operation"
                    );
                }
            }
            None if shared.is_shut_down() => break,
            None if shared.retire_if_idle(&lane) => {
                tracing::debug!(resource_class = %lane.resource_class, "idle lane retired");
                return;
            }
            None => lane.notify.notified().await,
        }
    }
    tracing::info!(resource_class = %lane.resource_class, "lane consumer stopped");
}

/// Handle to the eventual result of a queued operation.
#[derive(Debug)]
pub struct OperationHandle<T> {
    id: OperationId,
    resource_class: ResourceClass,
    rx: oneshot::Receiver<Result<T, ThrottleError>>,
}

impl<T> OperationHandle<T> {
    fn resolved(
        id: OperationId,
        resource_class: ResourceClass,
        result: Result<T, ThrottleError>,
    ) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self {
            id,
            resource_class,
            rx,
        }
    }

    /// Identifier assigned at submission.
    #[must_use]
    pub const fn id(&self) -> OperationId {
        self.id
    }

    /// Resource class the operation was queued on.
    #[must_use]
    pub const fn resource_class(&self) -> &ResourceClass {
        &self.resource_class
    }

    /// Wait for the operation to resolve.
    ///
    /// # Errors
    ///
    /// Returns the operation's terminal error, [`ThrottleError::Shutdown`] if
    /// it was dropped from the queue, or [`ThrottleError::Cancelled`] if the
    /// scheduler went away without resolving it.
    pub async fn wait(self) -> Result<T, ThrottleError> {
        self.rx.await.unwrap_or(Err(ThrottleError::Cancelled))
    }

    /// Wait at most `timeout`. On expiry the caller detaches: the operation
    /// keeps its place and still runs, but its result is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::Timeout`] on expiry, otherwise as [`Self::wait`].
    pub async fn wait_timeout(self, timeout: Duration) -> Result<T, ThrottleError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .unwrap_or(Err(ThrottleError::Timeout))
    }
}

/// Serializes calls per resource class against a shared quota tracker,
/// retrying retryable failures with backoff.
pub struct RequestScheduler<S> {
    shared: Arc<Shared>,
    spawner: S,
}

impl<S> fmt::Debug for RequestScheduler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestScheduler")
            .field("lanes", &self.shared.lanes.lock().len())
            .field("max_queue_depth", &self.shared.max_queue_depth)
            .field("shut_down", &self.shared.is_shut_down())
            .finish_non_exhaustive()
    }
}

impl<S> RequestScheduler<S>
where
    S: Spawn,
{
    /// Create a scheduler with default options.
    pub fn new(
        tracker: Arc<QuotaTracker>,
        cache: Arc<ResponseCache<Value>>,
        policy: BackoffPolicy,
        spawner: S,
    ) -> Self {
        Self::with_options(tracker, cache, policy, spawner, SchedulerOptions::default())
    }

    /// Create a scheduler with explicit options.
    pub fn with_options(
        tracker: Arc<QuotaTracker>,
        cache: Arc<ResponseCache<Value>>,
        policy: BackoffPolicy,
        spawner: S,
        options: SchedulerOptions,
    ) -> Self {
        let max_queue_depth = if options.max_queue_depth == 0 {
            DEFAULT_MAX_QUEUE_DEPTH
        } else {
            options.max_queue_depth
        };
        tracing::info!(
            max_queue_depth,
            max_retries = policy.max_retries(),
            "request scheduler started"
        );
        Self {
            shared: Arc::new(Shared {
                tracker,
                cache,
                policy,
                counters: SchedulerCounters::default(),
                audit: options.audit,
                lanes: Mutex::new(HashMap::new()),
                max_queue_depth,
                shutdown: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
            }),
            spawner,
        }
    }

    /// Queue `action` on `resource_class` and return a handle to its result.
    ///
    /// Operations on the same class start in submission order.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::QueueFull`] when the class's queue is at its
    /// bound and [`ThrottleError::Shutdown`] after [`Self::shutdown`].
    pub fn submit<T, O>(
        &self,
        resource_class: impl Into<ResourceClass>,
        action: O,
    ) -> Result<OperationHandle<T>, ThrottleError>
    where
        T: Send + 'static,
        O: ApiOperation<T>,
    {
        self.enqueue(resource_class.into(), action, None)
    }

    /// Like [`Self::submit`], but answered from the response cache when a
    /// live entry exists under `key`. Successful results are written back.
    ///
    /// `force_refresh` skips the read and always queues the call.
    ///
    /// # Errors
    ///
    /// Same as [`Self::submit`].
    pub fn submit_cached<T, O>(
        &self,
        resource_class: impl Into<ResourceClass>,
        key: impl Into<String>,
        force_refresh: bool,
        action: O,
    ) -> Result<OperationHandle<T>, ThrottleError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        O: ApiOperation<T>,
    {
        let resource_class = resource_class.into();
        let key = key.into();
        if force_refresh {
            tracing::debug!(key = %key, "force refresh, bypassing cache");
        } else if let Some(cached) = self.shared.cache.get(&key) {
            match serde_json::from_value::<T>(cached) {
                Ok(value) => {
                    let id = self.shared.next_id();
                    self.shared.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(operation_id = id, key = %key, "cache hit");
                    self.shared
                        .record_audit(id, &resource_class, AuditAction::CacheHit, Some(key));
                    return Ok(OperationHandle::resolved(id, resource_class, Ok(value)));
                }
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "cached value did not decode, refreshing");
                }
            }
        }

        let cache = Arc::clone(&self.shared.cache);
        let on_success: OnSuccess<T> = Box::new(move |value: &T| match serde_json::to_value(value) {
            Ok(encoded) => cache.set(key, encoded),
            Err(err) => tracing::warn!(key = %key, error = %err, "result not cacheable"),
        });
        self.enqueue(resource_class, action, Some(on_success))
    }

    /// Run `action` on the calling thread with the same wait, retry and
    /// backoff rules as queued operations.
    ///
    /// Sleeps block the thread, so call this from blocking contexts only
    /// (e.g. `tokio::task::spawn_blocking`). Bypasses the class queue.
    ///
    /// # Errors
    ///
    /// Returns the terminal error of the retry loop, or
    /// [`ThrottleError::Shutdown`] after [`Self::shutdown`].
    pub fn execute_sync<T, O>(
        &self,
        resource_class: impl Into<ResourceClass>,
        mut action: O,
    ) -> Result<T, ThrottleError>
    where
        O: BlockingOperation<T>,
    {
        if self.shared.is_shut_down() {
            return Err(ThrottleError::Shutdown);
        }
        let resource_class = resource_class.into();
        let id = self.shared.next_id();
        self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        self.shared
            .record_audit(id, &resource_class, AuditAction::Start, Some("blocking".into()));

        let mut driver = self.shared.driver(id, resource_class.clone());
        let outcome = run_blocking(&mut driver, &mut action);
        self.shared
            .finish(id, &resource_class, driver.retries(), &outcome);
        outcome
    }

    /// Latest quota record for `resource_class`.
    #[must_use]
    pub fn status(&self, resource_class: &str) -> Option<QuotaRecord> {
        self.shared.tracker.status(resource_class)
    }

    /// One-line summary of every known quota.
    #[must_use]
    pub fn format_status(&self) -> String {
        self.shared.tracker.format_status()
    }

    /// Shared quota tracker.
    #[must_use]
    pub fn tracker(&self) -> &Arc<QuotaTracker> {
        &self.shared.tracker
    }

    /// Shared response cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<ResponseCache<Value>> {
        &self.shared.cache
    }

    /// Retry policy applied to every operation.
    #[must_use]
    pub fn policy(&self) -> &BackoffPolicy {
        &self.shared.policy
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.shared.counters.snapshot()
    }

    /// Operations waiting on `resource_class`, excluding the one in flight.
    #[must_use]
    pub fn queue_depth(&self, resource_class: &str) -> usize {
        let lane = self.shared.lanes.lock().get(resource_class).cloned();
        lane.map_or(0, |lane| lane.queue.lock().len())
    }

    /// Queue depth of every class seen so far.
    #[must_use]
    pub fn queue_depths(&self) -> BTreeMap<ResourceClass, usize> {
        let lanes: Vec<Arc<Lane>> = self.shared.lanes.lock().values().cloned().collect();
        lanes
            .into_iter()
            .map(|lane| {
                let depth = lane.queue.lock().len();
                (lane.resource_class.clone(), depth)
            })
            .collect()
    }

    /// Whether [`Self::shutdown`] has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shared.is_shut_down()
    }

    /// Stop accepting work, resolve queued operations with
    /// [`ThrottleError::Shutdown`], and stop the lane consumers once their
    /// in-flight operation finishes.
    pub fn shutdown(&self) {
        if let Some(lanes) = self.shared.close() {
            tracing::info!(lanes, "request scheduler shut down");
        }
    }

    fn enqueue<T, O>(
        &self,
        resource_class: ResourceClass,
        action: O,
        on_success: Option<OnSuccess<T>>,
    ) -> Result<OperationHandle<T>, ThrottleError>
    where
        T: Send + 'static,
        O: ApiOperation<T>,
    {
        if self.shared.is_shut_down() {
            return Err(ThrottleError::Shutdown);
        }
        let id = self.shared.next_id();
        let (result_tx, rx) = oneshot::channel();
        let job: Job = Box::new(QueuedOperation {
            id,
            resource_class: resource_class.clone(),
            action,
            result_tx,
            on_success,
        });

        self.shared
            .record_audit(id, &resource_class, AuditAction::Submit, None);
        let (lane, enqueued) = self.push(&resource_class, job);
        let depth = match enqueued {
            Ok(depth) => depth,
            Err(err) => {
                self.shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    operation_id = id,
                    resource_class = %resource_class,
                    max_queue_depth = self.shared.max_queue_depth,
                    "operation rejected: queue full"
                );
                self.shared
                    .record_audit(id, &resource_class, AuditAction::Reject, Some(err.to_string()));
                return Err(err);
            }
        };

        self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(operation_id = id, resource_class = %resource_class, depth, "operation queued");

        // A shutdown racing this submission may already have drained the lane.
        if self.shared.is_shut_down() {
            self.shared.drain_lane(&lane);
        }
        lane.notify.notify_one();

        Ok(OperationHandle {
            id,
            resource_class,
            rx,
        })
    }

    /// Push `job` onto the lane for `resource_class`, starting the lane's
    /// consumer on first use. Lookup and push share the lanes lock so a
    /// retiring lane never receives work.
    fn push(
        &self,
        resource_class: &ResourceClass,
        job: Job,
    ) -> (Arc<Lane>, Result<usize, ThrottleError>) {
        let (lane, created, enqueued) = {
            let mut lanes = self.shared.lanes.lock();
            let (lane, created) = if let Some(lane) = lanes.get(resource_class) {
                (Arc::clone(lane), false)
            } else {
                let lane = Arc::new(Lane {
                    resource_class: resource_class.clone(),
                    queue: Mutex::new(InMemoryQueue::new(self.shared.max_queue_depth)),
                    notify: Notify::new(),
                });
                lanes.insert(resource_class.clone(), Arc::clone(&lane));
                (lane, true)
            };
            let enqueued = {
                let mut queue = lane.queue.lock();
                queue.enqueue(job).map(|()| queue.len())
            };
            (lane, created, enqueued)
        };
        if created {
            self.spawner
                .spawn(consume(Arc::clone(&self.shared), Arc::clone(&lane)));
        }
        (lane, enqueued)
    }
}

impl<S> Drop for RequestScheduler<S> {
    fn drop(&mut self) {
        self.shared.close();
    }
}
