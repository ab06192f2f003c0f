//! ---
//! gp_section: "05-concurrency-dispatch"
//! gp_subsection: "module"
//! gp_type: "source"
//! gp_scope: "code"
//! gp_description: "Logical threads and the cooperative worker-pool scheduler."
//! gp_version: "v0.0.0-prealpha"
//! gp_owner: "tbd"
//! ---
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::errors::{DispatchError, Result};
use crate::scheduler::{LogicalThreadScheduler, SchedulerShared};
use crate::stats::ThreadStatistics;

/// One queued unit of work. Errors are routed to the owning logical
/// thread's fault observers; they never unwind into the worker pool.
pub type Action = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

type FaultObserver = Arc<dyn Fn(&anyhow::Error) + Send + Sync>;

// Queues, activation state, and the running flag share one mutex so the
// push/claim/complete transitions stay atomic with respect to each other.
struct ThreadCore {
    queues: Vec<VecDeque<Action>>,
    active_priority: usize,
    running: bool,
}

pub(crate) struct ThreadInner {
    priority_levels: usize,
    core: Mutex<ThreadCore>,
    locals: Mutex<HashMap<String, Box<dyn Any + Send>>>,
    observers: RwLock<Vec<FaultObserver>>,
    statistics: Mutex<ThreadStatistics>,
}

pub(crate) enum Activation {
    /// The thread must be queued to the scheduler at this priority.
    Signal(usize),
    /// The thread is already queued or running; no wake-up needed.
    AlreadyPending,
}

impl ThreadInner {
    fn queue_index(&self, priority: usize) -> usize {
        self.priority_levels - priority
    }

    /// Enqueue an action and decide whether the scheduler needs a signal.
    /// Redundant wake-ups collapse here: a thread running, or already
    /// queued at an urgency at or above `priority`, is left alone.
    pub(crate) fn enqueue(&self, priority: usize, action: Action) -> Activation {
        let mut core = self.core.lock();
        let index = self.queue_index(priority);
        core.queues[index].push_back(action);
        if core.running || core.active_priority >= priority {
            Activation::AlreadyPending
        } else {
            core.active_priority = priority;
            Activation::Signal(priority)
        }
    }

    /// Attempt to take ownership of the thread popped from a ready bucket.
    /// Entries left behind by a priority escalation are stale and yield
    /// `None`; an emptied thread deactivates instead of claiming.
    pub(crate) fn claim(&self, bucket_priority: usize) -> Option<(Action, usize)> {
        let mut core = self.core.lock();
        if core.running || core.active_priority != bucket_priority {
            return None;
        }
        for index in 0..core.queues.len() {
            if let Some(action) = core.queues[index].pop_front() {
                core.running = true;
                return Some((action, self.priority_levels - index));
            }
        }
        core.active_priority = 0;
        None
    }

    /// Finish one scheduling quantum: either hand back the priority the
    /// thread should be requeued at, or deactivate it. During shutdown the
    /// remaining actions are discarded so waiting completion handles
    /// resolve.
    pub(crate) fn complete(&self, shutting_down: bool) -> Option<usize> {
        let mut core = self.core.lock();
        core.running = false;
        if shutting_down {
            for queue in &mut core.queues {
                queue.clear();
            }
            core.active_priority = 0;
            return None;
        }
        for index in 0..core.queues.len() {
            if !core.queues[index].is_empty() {
                let priority = self.priority_levels - index;
                core.active_priority = priority;
                return Some(priority);
            }
        }
        core.active_priority = 0;
        None
    }

    /// Drop all queued actions; called for ready threads at shutdown.
    pub(crate) fn discard_queued(&self) {
        let mut core = self.core.lock();
        for queue in &mut core.queues {
            queue.clear();
        }
        if !core.running {
            core.active_priority = 0;
        }
    }

    pub(crate) fn notify_fault(&self, error: &anyhow::Error) {
        let observers = self.observers.read();
        if observers.is_empty() {
            debug!(error = %error, "unobserved logical thread fault");
            return;
        }
        for observer in observers.iter() {
            observer(error);
        }
    }

    pub(crate) fn record_execution(&self, elapsed: std::time::Duration) {
        self.statistics.lock().record(elapsed);
    }
}

/// A serialized unit of execution: a multi-priority action queue drained
/// cooperatively by the scheduler's worker pool.
///
/// At most one physical worker executes a given logical thread's actions
/// at any instant, so state touched only from actions on one logical
/// thread needs no further synchronization. Handles are cheap to clone
/// and all refer to the same underlying thread.
#[derive(Clone)]
pub struct LogicalThread {
    inner: Arc<ThreadInner>,
    shared: Arc<SchedulerShared>,
}

impl LogicalThread {
    /// Create an idle logical thread bound to `scheduler`.
    pub fn new(scheduler: &LogicalThreadScheduler) -> Self {
        let shared = scheduler.shared();
        let priority_levels = shared.priority_levels();
        Self {
            inner: Arc::new(ThreadInner {
                priority_levels,
                core: Mutex::new(ThreadCore {
                    queues: (0..priority_levels).map(|_| VecDeque::new()).collect(),
                    active_priority: 0,
                    running: false,
                }),
                locals: Mutex::new(HashMap::new()),
                observers: RwLock::new(Vec::new()),
                statistics: Mutex::new(ThreadStatistics::default()),
            }),
            shared,
        }
    }

    /// Number of distinct priorities; valid push priorities are
    /// `1..=priority_levels`, higher numbers dispatched first.
    pub fn priority_levels(&self) -> usize {
        self.inner.priority_levels
    }

    /// Queue an action at the lowest urgency.
    pub fn push<F>(&self, action: F) -> Result<()>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.push_at(1, action)
    }

    /// Queue an action at an explicit priority. Priorities outside
    /// `1..=priority_levels` are rejected, never clamped: clamping would
    /// silently corrupt scheduling intent.
    pub fn push_at<F>(&self, priority: usize, action: F) -> Result<()>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        if priority < 1 || priority > self.inner.priority_levels {
            return Err(DispatchError::InvalidPriority {
                priority,
                levels: self.inner.priority_levels,
            });
        }
        if self.shared.is_shut_down() {
            return Err(DispatchError::SchedulerShutdown);
        }
        match self.inner.enqueue(priority, Box::new(action)) {
            Activation::Signal(priority) => self.shared.queue_ready(self.inner.clone(), priority),
            Activation::AlreadyPending => Ok(()),
        }
    }

    /// Discard queued actions that have not started. An action already
    /// pulled by a worker always runs to completion.
    pub fn clear(&self) {
        let mut core = self.inner.core.lock();
        for queue in &mut core.queues {
            queue.clear();
        }
    }

    /// Whether any queued actions remain.
    pub fn has_actions(&self) -> bool {
        let core = self.inner.core.lock();
        core.queues.iter().any(|queue| !queue.is_empty())
    }

    /// Highest priority with a queued action, if any.
    pub fn next_priority(&self) -> Option<usize> {
        let core = self.inner.core.lock();
        core.queues
            .iter()
            .position(|queue| !queue.is_empty())
            .map(|index| self.inner.priority_levels - index)
    }

    /// Priority the thread was last activated at; 0 while idle.
    pub fn active_priority(&self) -> usize {
        self.inner.core.lock().active_priority
    }

    /// Store a value in the logical-thread-local map. Actions running on
    /// this thread can share state through it without synchronization
    /// because they never overlap.
    pub fn set_local<T: Send + 'static>(&self, key: impl Into<String>, value: T) {
        self.inner.locals.lock().insert(key.into(), Box::new(value));
    }

    /// Read a logical-thread-local value by key.
    pub fn local<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        self.inner
            .locals
            .lock()
            .get(key)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    /// Remove a logical-thread-local value; returns whether it existed.
    pub fn remove_local(&self, key: &str) -> bool {
        self.inner.locals.lock().remove(key).is_some()
    }

    /// Register a fault observer. With no observers registered, action
    /// errors are traced at debug level and otherwise discarded.
    pub fn on_fault<F>(&self, observer: F)
    where
        F: Fn(&anyhow::Error) + Send + Sync + 'static,
    {
        self.inner.observers.write().push(Arc::new(observer));
    }

    /// Swap the accumulated statistics for a zeroed block and return the
    /// previous window.
    pub fn sample_statistics(&self) -> ThreadStatistics {
        std::mem::take(&mut *self.inner.statistics.lock())
    }

    /// Snapshot the accumulated statistics without resetting them.
    pub fn statistics(&self) -> ThreadStatistics {
        self.inner.statistics.lock().clone()
    }
}

impl std::fmt::Debug for LogicalThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.inner.core.lock();
        f.debug_struct("LogicalThread")
            .field("priority_levels", &self.inner.priority_levels)
            .field("active_priority", &core.active_priority)
            .field("running", &core.running)
            .finish()
    }
}
