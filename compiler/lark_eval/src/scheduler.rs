//! Task scheduler: one OS thread per spawned evaluator.
//!
//! A task's outcome is published once into its slot and observed by any
//! number of [`TaskHandle`] clones. Cancellation is a flag the evaluator
//! polls at statement boundaries; the slot mutex orders it against
//! completion, so a task that finished before `cancel` keeps its result
//! and one that finishes after always reports `CancelledError`.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use lark_value::{cancelled, internal, EvalError, Value};
use parking_lot::{Condvar, Mutex};

/// Identifier of a spawned task, unique within its scheduler.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Cooperative cancellation flag shared by a task and its handles.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn request(&self) {
        self.0.store(true, Ordering::Release);
    }
}

pub type TaskOutcome = Result<Value, EvalError>;

struct TaskSlot {
    outcome: Mutex<Option<TaskOutcome>>,
    finished: Condvar,
    cancel: CancelToken,
}

impl TaskSlot {
    fn complete(&self, result: TaskOutcome) {
        let mut outcome = self.outcome.lock();
        let result = if self.cancel.is_cancelled() {
            Err(cancelled())
        } else {
            result
        };
        *outcome = Some(result);
        self.finished.notify_all();
    }
}

/// Handle to a spawned task. Clones refer to the same task.
#[derive(Clone)]
pub struct TaskHandle {
    id: TaskId,
    slot: Arc<TaskSlot>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Block until the task finishes. Every call, from any thread, sees
    /// the same outcome.
    pub fn join(&self) -> TaskOutcome {
        let mut outcome = self.slot.outcome.lock();
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            self.slot.finished.wait(&mut outcome);
        }
    }

    /// Like [`join`](Self::join), but gives up after `timeout`, returning
    /// `None` while the task is still running.
    pub fn join_timeout(&self, timeout: Duration) -> Option<TaskOutcome> {
        let deadline = Instant::now() + timeout;
        let mut outcome = self.slot.outcome.lock();
        loop {
            if let Some(result) = outcome.as_ref() {
                return Some(result.clone());
            }
            if self
                .slot
                .finished
                .wait_until(&mut outcome, deadline)
                .timed_out()
            {
                return outcome.as_ref().cloned();
            }
        }
    }

    /// Ask the task to stop at its next statement boundary. Returns `false`
    /// if it had already finished, in which case its outcome stands.
    pub fn cancel(&self) -> bool {
        let outcome = self.slot.outcome.lock();
        if outcome.is_some() {
            return false;
        }
        self.slot.cancel.request();
        tracing::debug!(task = %self.id, "cancellation requested");
        true
    }

    pub fn is_finished(&self) -> bool {
        self.slot.outcome.lock().is_some()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.slot.cancel.is_cancelled()
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Starts worker threads and tracks the live ones.
pub struct Scheduler {
    next_id: AtomicU64,
    live: Arc<DashMap<TaskId, TaskHandle>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            next_id: AtomicU64::new(1),
            live: Arc::new(DashMap::new()),
        }
    }

    /// Number of tasks that have not finished.
    pub fn active(&self) -> usize {
        self.live.len()
    }

    /// Request cancellation of every live task. Returns how many were
    /// still running.
    pub fn cancel_all(&self) -> usize {
        let handles: Vec<TaskHandle> = self.live.iter().map(|e| e.value().clone()).collect();
        handles.iter().filter(|h| h.cancel()).count()
    }

    /// Run `body` on a new worker thread named `lark-worker-<id>`.
    ///
    /// A panic in `body` completes the task with an `InternalError`. The
    /// task leaves the live table before its outcome is published, so a
    /// joiner never sees it counted as active.
    pub fn start<F>(&self, stack_size: Option<usize>, body: F) -> Result<TaskHandle, EvalError>
    where
        F: FnOnce(&CancelToken) -> TaskOutcome + Send + 'static,
    {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handle = TaskHandle {
            id,
            slot: Arc::new(TaskSlot {
                outcome: Mutex::new(None),
                finished: Condvar::new(),
                cancel: CancelToken::new(),
            }),
        };

        let mut builder = std::thread::Builder::new().name(format!("lark-worker-{}", id.0));
        if let Some(size) = stack_size {
            builder = builder.stack_size(size);
        }

        self.live.insert(id, handle.clone());
        let live = Arc::clone(&self.live);
        let worker = handle.clone();

        let spawned = builder.spawn(move || {
            let _span = tracing::debug_span!("task", id = worker.id.0).entered();
            tracing::debug!("task started");
            let result = panic::catch_unwind(AssertUnwindSafe(|| body(&worker.slot.cancel)))
                .unwrap_or_else(|_| {
                    tracing::error!("task panicked");
                    Err(internal("worker thread panicked"))
                });
            live.remove(&worker.id);
            worker.slot.complete(result);
            tracing::debug!("task finished");
        });

        match spawned {
            Ok(_detached) => Ok(handle),
            Err(e) => {
                self.live.remove(&id);
                Err(internal(format!("could not start worker thread: {e}")))
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
