//! The one-at-a-time job queue.
//!
//! [`QueueManager`] accepts install/remove requests, turns each into a
//! [`Job`], and runs jobs strictly in acceptance order. The next job only
//! starts from the completion callback of the previous one, so at most one
//! job is ever running. Failed jobs are kept in a separate log; nothing is
//! retried.
//!
//! All state transitions happen under a single mutex. Each transition also
//! appends its side effects (notifier publishes, job launches) to an outbox
//! under that lock. The outbox is drained outside the lock by one caller at a
//! time, so effects happen in transition order whichever thread caused them,
//! and a notifier may call back into the queue without deadlocking.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::backend::{Backends, Operation};
use crate::events::{Completion, Notifier, Payload, QUEUE_CHANNEL, QueueEvent};
use crate::job::{Job, JobCallbacks, JobId, JobOutcome, JobSummary, JobTask};
use crate::package::Package;
use crate::process::Spawner;

/// Whether a job is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Busy,
}

/// Side effect of a state transition, applied once the lock is released.
enum Effect {
    Publish { channel: String, payload: Payload },
    Launch(JobTask),
}

struct QueueState {
    /// Head is the running job while the scheduler is busy
    pending: VecDeque<Job>,
    failures: Vec<JobSummary>,
    scheduler: SchedulerState,
    outbox: VecDeque<Effect>,
    /// Someone is applying the outbox
    draining: bool,
}

impl QueueState {
    fn publish_queue(&mut self, event: QueueEvent) {
        self.outbox.push_back(Effect::Publish {
            channel: QUEUE_CHANNEL.to_string(),
            payload: Payload::Queue(event),
        });
    }

    /// Start the head job if there is one, otherwise go idle. The only
    /// place a job becomes running.
    fn advance(&mut self) {
        let Some(head) = self.pending.front_mut() else {
            self.scheduler = SchedulerState::Idle;
            tracing::debug!("queue empty");
            self.publish_queue(QueueEvent::Idle);
            return;
        };
        self.scheduler = SchedulerState::Busy;
        // Only `None` if the head was already started, which only happens here.
        if let Some(task) = head.start() {
            let job = head.summary();
            tracing::debug!(job = %job.id, package = %job.package.id, "job started");
            self.publish_queue(QueueEvent::Started { job });
            self.outbox.push_back(Effect::Launch(task));
        }
    }

    /// Claim the outbox. Returns false if another caller is already draining
    /// it; that caller will apply whatever was just queued.
    fn claim_outbox(&mut self) -> bool {
        if self.draining || self.outbox.is_empty() {
            return false;
        }
        self.draining = true;
        true
    }

    fn is_settled(&self) -> bool {
        self.scheduler == SchedulerState::Idle && !self.draining && self.outbox.is_empty()
    }
}

struct Inner {
    state: Mutex<QueueState>,
    backends: Backends,
    spawner: Arc<dyn Spawner>,
    notifier: Arc<dyn Notifier>,
    runtime: Handle,
    next_id: AtomicU64,
    /// Bumped every time the outbox has been fully applied
    settled_tx: watch::Sender<SchedulerState>,
}

/// Serializes package operations into jobs executed one at a time.
///
/// Cloning is cheap; all clones share the same queue.
#[derive(Clone)]
pub struct QueueManager {
    inner: Arc<Inner>,
}

impl QueueManager {
    /// Create a queue whose jobs run on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(backends: Backends, spawner: Arc<dyn Spawner>, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_runtime(backends, spawner, notifier, Handle::current())
    }

    /// Create a queue whose jobs run on `runtime`.
    pub fn with_runtime(
        backends: Backends,
        spawner: Arc<dyn Spawner>,
        notifier: Arc<dyn Notifier>,
        runtime: Handle,
    ) -> Self {
        let (settled_tx, _) = watch::channel(SchedulerState::Idle);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    failures: Vec::new(),
                    scheduler: SchedulerState::Idle,
                    outbox: VecDeque::new(),
                    draining: false,
                }),
                backends,
                spawner,
                notifier,
                runtime,
                next_id: AtomicU64::new(1),
                settled_tx,
            }),
        }
    }

    /// Queue an install of `package`.
    ///
    /// Packages whose format has no backend are logged and skipped: nothing
    /// is queued and no event is published.
    pub fn request_install(&self, package: Arc<Package>) {
        self.request(package, Operation::Install);
    }

    /// Queue a removal of `package`. Unsupported formats are skipped as for
    /// [`request_install`](Self::request_install).
    pub fn request_uninstall(&self, package: Arc<Package>) {
        self.request(package, Operation::Remove);
    }

    fn request(&self, package: Arc<Package>, operation: Operation) {
        let Some(backend) = self.inner.backends.for_package(&package) else {
            tracing::warn!(
                package = %package.id,
                format = %package.format,
                "cannot {} {} packages yet; request skipped",
                operation,
                package.format
            );
            return;
        };

        let id = JobId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let job = Job::new(
            id,
            package,
            operation,
            backend,
            self.inner.spawner.clone(),
            self.callbacks(),
        );
        let accepted = job.summary();
        tracing::debug!(job = %id, package = %accepted.package.id, %operation, kind = %accepted.kind, "job queued");

        let drain = {
            let mut state = self.lock();
            state.pending.push_back(job);
            state.publish_queue(QueueEvent::Accepted { job: accepted });
            if state.scheduler == SchedulerState::Idle {
                state.advance();
            }
            state.claim_outbox()
        };
        if drain {
            self.drain_outbox();
        }
    }

    /// Completion callback for the running job.
    ///
    /// Removes the head job, records it in the failure log if it failed,
    /// publishes the completion on the package's channel, then starts the
    /// next job (or goes idle).
    pub fn on_job_finished(&self, outcome: JobOutcome) {
        let drain = {
            let mut state = self.lock();
            let head_matches = state
                .pending
                .front()
                .is_some_and(|head| head.id() == outcome.job_id);
            if state.scheduler != SchedulerState::Busy || !head_matches {
                tracing::error!(
                    job = %outcome.job_id,
                    package = %outcome.package.id,
                    "completion does not belong to the running job; ignored"
                );
                return;
            }

            let Some(mut job) = state.pending.pop_front() else {
                return;
            };
            job.finish(outcome.success, outcome.exit_code);
            let finished = job.summary();
            if outcome.success {
                tracing::info!(job = %finished.id, package = %finished.package.id, operation = %finished.operation, "job succeeded");
            } else {
                tracing::info!(job = %finished.id, package = %finished.package.id, operation = %finished.operation, exit_code = outcome.exit_code, "job failed");
                state.failures.push(finished);
            }

            state.outbox.push_back(Effect::Publish {
                channel: outcome.package.completion_channel().to_string(),
                payload: Payload::Completed(Completion {
                    package: outcome.package.clone(),
                    success: outcome.success,
                    exit_code: outcome.exit_code,
                }),
            });
            state.advance();
            state.claim_outbox()
        };
        if drain {
            self.drain_outbox();
        }
    }

    /// Progress callback for the running job. Never touches queue state.
    pub fn on_job_progress(&self, package: &Package, text: String) {
        self.inner
            .notifier
            .publish(&package.progress_channel(), Payload::Progress(text));
    }

    /// Current scheduler state.
    pub fn state(&self) -> SchedulerState {
        self.lock().scheduler
    }

    /// Snapshot of the pending queue, head first. While busy the head is
    /// the running job.
    pub fn pending(&self) -> Vec<JobSummary> {
        self.lock().pending.iter().map(Job::summary).collect()
    }

    /// The running job, if any.
    pub fn running(&self) -> Option<JobSummary> {
        let state = self.lock();
        match state.scheduler {
            SchedulerState::Busy => state.pending.front().map(Job::summary),
            SchedulerState::Idle => None,
        }
    }

    /// Failed jobs in the order they failed.
    pub fn failures(&self) -> Vec<JobSummary> {
        self.lock().failures.clone()
    }

    /// Wait until no job is running or pending and every event has been
    /// published.
    pub async fn idle(&self) {
        let mut rx = self.inner.settled_tx.subscribe();
        loop {
            if self.lock().is_settled() {
                return;
            }
            // The sender lives as long as `self`, so this cannot fail.
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Apply queued effects in order until the outbox is empty.
    fn drain_outbox(&self) {
        loop {
            let effect = {
                let mut state = self.lock();
                match state.outbox.pop_front() {
                    Some(effect) => effect,
                    None => {
                        state.draining = false;
                        self.inner.settled_tx.send_replace(state.scheduler);
                        return;
                    }
                }
            };
            match effect {
                Effect::Publish { channel, payload } => {
                    self.inner.notifier.publish(&channel, payload);
                }
                Effect::Launch(task) => task.spawn(&self.inner.runtime),
            }
        }
    }

    fn callbacks(&self) -> JobCallbacks {
        let progress_queue: Weak<Inner> = Arc::downgrade(&self.inner);
        let finished_queue = progress_queue.clone();
        JobCallbacks::new(
            move |package, text| {
                if let Some(inner) = progress_queue.upgrade() {
                    QueueManager { inner }.on_job_progress(package, text);
                }
            },
            move |outcome| {
                if let Some(inner) = finished_queue.upgrade() {
                    QueueManager { inner }.on_job_finished(outcome);
                }
            },
        )
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // State is only mutated in short non-panicking sections.
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
