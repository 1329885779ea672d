use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;

use crate::backend::{Backend, BackendKind, Operation};
use crate::package::Package;
use crate::process::{NO_EXIT_CODE, ProcessEvent, Spawner};

/// Identifier assigned to each accepted request, in acceptance order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Read-only snapshot of a job, handed out to observers.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub id: JobId,
    pub package: Arc<Package>,
    pub operation: Operation,
    pub kind: BackendKind,
    pub status: JobStatus,
    /// Set once the job has finished
    pub exit_code: Option<i32>,
}

/// What a job reports exactly once when it terminates.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub package: Arc<Package>,
    pub success: bool,
    pub exit_code: i32,
}

type ProgressFn = dyn Fn(&Arc<Package>, String) + Send + Sync;
type FinishedFn = dyn Fn(JobOutcome) + Send + Sync;

/// Progress and completion hooks injected into every job.
#[derive(Clone)]
pub struct JobCallbacks {
    on_progress: Arc<ProgressFn>,
    on_finished: Arc<FinishedFn>,
}

impl JobCallbacks {
    pub fn new(
        on_progress: impl Fn(&Arc<Package>, String) + Send + Sync + 'static,
        on_finished: impl Fn(JobOutcome) + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_progress: Arc::new(on_progress),
            on_finished: Arc::new(on_finished),
        }
    }

    fn progress(&self, package: &Arc<Package>, text: String) {
        (self.on_progress)(package, text)
    }

    fn finished(&self, outcome: JobOutcome) {
        (self.on_finished)(outcome)
    }
}

/// One queued install or removal.
pub struct Job {
    id: JobId,
    package: Arc<Package>,
    operation: Operation,
    status: JobStatus,
    exit_code: Option<i32>,
    backend: Arc<dyn Backend>,
    spawner: Arc<dyn Spawner>,
    callbacks: JobCallbacks,
}

impl Job {
    pub fn new(
        id: JobId,
        package: Arc<Package>,
        operation: Operation,
        backend: Arc<dyn Backend>,
        spawner: Arc<dyn Spawner>,
        callbacks: JobCallbacks,
    ) -> Self {
        Self {
            id,
            package,
            operation,
            status: JobStatus::Pending,
            exit_code: None,
            backend,
            spawner,
            callbacks,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn package(&self) -> &Arc<Package> {
        &self.package
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            package: self.package.clone(),
            operation: self.operation,
            kind: self.kind(),
            status: self.status,
            exit_code: self.exit_code,
        }
    }

    /// Move the job to running and return the task that performs it.
    ///
    /// The state change happens here, the work happens when the returned
    /// task is spawned. Returns `None` if the job was already started.
    pub fn start(&mut self) -> Option<JobTask> {
        if self.status != JobStatus::Pending {
            tracing::error!(job = %self.id, status = ?self.status, "job started twice");
            return None;
        }
        self.status = JobStatus::Running;
        Some(JobTask {
            id: self.id,
            package: self.package.clone(),
            operation: self.operation,
            backend: self.backend.clone(),
            spawner: self.spawner.clone(),
            callbacks: self.callbacks.clone(),
        })
    }

    /// Record the terminal state reported by the job's task.
    pub(crate) fn finish(&mut self, success: bool, exit_code: i32) {
        self.status = if success {
            JobStatus::Succeeded
        } else {
            JobStatus::Failed
        };
        self.exit_code = Some(exit_code);
    }
}

/// The asynchronous half of a started job.
pub struct JobTask {
    id: JobId,
    package: Arc<Package>,
    operation: Operation,
    backend: Arc<dyn Backend>,
    spawner: Arc<dyn Spawner>,
    callbacks: JobCallbacks,
}

impl JobTask {
    /// Run the job on `runtime`. The completion callback fires exactly once,
    /// after every progress callback, whatever happens inside the backend.
    pub fn spawn(self, runtime: &Handle) {
        runtime.spawn(async move {
            let JobTask {
                id,
                package,
                operation,
                backend,
                spawner,
                callbacks,
            } = self;

            let inner = tokio::spawn(execute(
                package.clone(),
                operation,
                backend,
                spawner,
                callbacks.clone(),
            ));

            let (success, exit_code) = match inner.await {
                Ok(result) => result,
                Err(e) => {
                    callbacks.progress(&package, format!("ERROR: job aborted: {}", e));
                    (false, NO_EXIT_CODE)
                }
            };

            callbacks.finished(JobOutcome {
                job_id: id,
                package,
                success,
                exit_code,
            });
        });
    }
}

/// Prepare, spawn and follow the backend command, returning `(success, exit_code)`.
async fn execute(
    package: Arc<Package>,
    operation: Operation,
    backend: Arc<dyn Backend>,
    spawner: Arc<dyn Spawner>,
    callbacks: JobCallbacks,
) -> (bool, i32) {
    let progress = |text: String| callbacks.progress(&package, text);

    let invocation = match backend.prepare(operation, &package).await {
        Ok(invocation) => invocation,
        Err(e) => {
            progress(format!("ERROR: {}", e));
            return (false, NO_EXIT_CODE);
        }
    };

    progress(format!("$ {}", invocation));

    let mut handle = match spawner.spawn(&invocation) {
        Ok(handle) => handle,
        Err(e) => {
            progress(format!("ERROR: failed to start {}: {}", invocation.program, e));
            return (false, NO_EXIT_CODE);
        }
    };

    while let Some(event) = handle.recv().await {
        match event {
            ProcessEvent::Output { line, .. } => {
                let line = line.trim_end();
                if !line.is_empty() {
                    progress(line.to_string());
                }
            }
            ProcessEvent::Exited(Some(code)) => return (code == 0, code),
            ProcessEvent::Exited(None) => {
                progress("ERROR: process was terminated by a signal".to_string());
                return (false, NO_EXIT_CODE);
            }
            ProcessEvent::Failed(e) => {
                progress(format!("ERROR: {}", e));
                return (false, NO_EXIT_CODE);
            }
        }
    }

    progress("ERROR: process output ended without an exit status".to_string());
    (false, NO_EXIT_CODE)
}
