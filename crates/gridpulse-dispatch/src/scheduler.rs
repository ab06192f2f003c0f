//! ---
//! gp_section: "05-concurrency-dispatch"
//! gp_subsection: "module"
//! gp_type: "source"
//! gp_scope: "code"
//! gp_description: "Logical threads and the cooperative worker-pool scheduler."
//! gp_version: "v0.0.0-prealpha"
//! gp_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use gridpulse_common::config::DispatchConfig;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace};

use crate::errors::{DispatchError, Result};
use crate::thread::ThreadInner;

struct ReadyState {
    // Index 0 is the highest urgency, mirroring the per-thread queues.
    buckets: Vec<VecDeque<Arc<ThreadInner>>>,
}

pub(crate) struct SchedulerShared {
    priority_levels: usize,
    max_workers: usize,
    state: Mutex<ReadyState>,
    available: Condvar,
    shutdown: AtomicBool,
    busy_workers: AtomicUsize,
}

impl SchedulerShared {
    pub(crate) fn priority_levels(&self) -> usize {
        self.priority_levels
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Insert a logical thread into the ready bucket for `priority` and
    /// wake one parked worker.
    pub(crate) fn queue_ready(&self, thread: Arc<ThreadInner>, priority: usize) -> Result<()> {
        let mut state = self.state.lock();
        if self.is_shut_down() {
            return Err(DispatchError::SchedulerShutdown);
        }
        let index = self.priority_levels - priority;
        state.buckets[index].push_back(thread);
        self.available.notify_one();
        Ok(())
    }

    fn pop_ready(state: &mut ReadyState, priority_levels: usize) -> Option<(Arc<ThreadInner>, usize)> {
        for index in 0..state.buckets.len() {
            if let Some(thread) = state.buckets[index].pop_front() {
                return Some((thread, priority_levels - index));
            }
        }
        None
    }
}

fn panic_error(payload: Box<dyn std::any::Any + Send>) -> anyhow::Error {
    if let Some(message) = payload.downcast_ref::<&str>() {
        anyhow::anyhow!("action panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        anyhow::anyhow!("action panicked: {message}")
    } else {
        anyhow::anyhow!("action panicked")
    }
}

fn worker_loop(shared: Arc<SchedulerShared>, worker: usize) {
    loop {
        let popped = {
            let mut state = shared.state.lock();
            loop {
                if shared.is_shut_down() {
                    debug!(worker, "dispatch worker stopping");
                    return;
                }
                if let Some(entry) = SchedulerShared::pop_ready(&mut state, shared.priority_levels)
                {
                    break entry;
                }
                shared.available.wait(&mut state);
            }
        };

        let (thread, bucket_priority) = popped;
        // Stale entries (left behind by a priority escalation, or raced by
        // another worker) fail the claim and are simply skipped.
        let Some((action, priority)) = thread.claim(bucket_priority) else {
            continue;
        };

        shared.busy_workers.fetch_add(1, Ordering::AcqRel);
        let started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(action));
        let elapsed = started.elapsed();
        thread.record_execution(elapsed);
        shared.busy_workers.fetch_sub(1, Ordering::AcqRel);

        match outcome {
            Ok(Ok(())) => {
                trace!(worker, priority, elapsed_us = elapsed.as_micros() as u64, "action executed");
            }
            Ok(Err(error)) => thread.notify_fault(&error),
            Err(payload) => thread.notify_fault(&panic_error(payload)),
        }

        // One action per pass is the fairness quantum: re-evaluate
        // readiness before this thread may run again.
        let shutting_down = shared.is_shut_down();
        if let Some(next) = thread.complete(shutting_down) {
            let mut state = shared.state.lock();
            let index = shared.priority_levels - next;
            state.buckets[index].push_back(thread);
            shared.available.notify_one();
        }
    }
}

/// Worker-pool dispatcher that drains ready [`LogicalThread`]s highest
/// priority first, one action per scheduling pass.
///
/// [`LogicalThread`]: crate::LogicalThread
pub struct LogicalThreadScheduler {
    shared: Arc<SchedulerShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl LogicalThreadScheduler {
    /// Start a scheduler with the given sizing. Both `priority_levels`
    /// and `max_workers` must be at least 1.
    pub fn new(config: &DispatchConfig) -> Result<Self> {
        if config.priority_levels == 0 {
            return Err(DispatchError::InvalidConfiguration(
                "priority_levels must be at least 1".into(),
            ));
        }
        if config.max_workers == 0 {
            return Err(DispatchError::InvalidConfiguration(
                "max_workers must be at least 1".into(),
            ));
        }

        let shared = Arc::new(SchedulerShared {
            priority_levels: config.priority_levels,
            max_workers: config.max_workers,
            state: Mutex::new(ReadyState {
                buckets: (0..config.priority_levels)
                    .map(|_| VecDeque::new())
                    .collect(),
            }),
            available: Condvar::new(),
            shutdown: AtomicBool::new(false),
            busy_workers: AtomicUsize::new(0),
        });

        let mut workers = Vec::with_capacity(config.max_workers);
        for worker in 0..config.max_workers {
            let shared_clone = shared.clone();
            let handle = std::thread::Builder::new()
                .name(format!("gridpulse-dispatch-{worker}"))
                .spawn(move || worker_loop(shared_clone, worker))?;
            workers.push(handle);
        }

        info!(
            priority_levels = config.priority_levels,
            max_workers = config.max_workers,
            "logical thread scheduler started"
        );

        Ok(Self {
            shared,
            workers: Mutex::new(workers),
        })
    }

    /// Start a scheduler with the default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(&DispatchConfig::default())
    }

    pub fn priority_levels(&self) -> usize {
        self.shared.priority_levels
    }

    pub fn max_workers(&self) -> usize {
        self.shared.max_workers
    }

    /// Workers currently executing an action; never exceeds
    /// [`max_workers`](Self::max_workers).
    pub fn busy_workers(&self) -> usize {
        self.shared.busy_workers.load(Ordering::Acquire)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.is_shut_down()
    }

    pub(crate) fn shared(&self) -> Arc<SchedulerShared> {
        self.shared.clone()
    }

    /// Stop the pool: queued-but-unstarted actions are discarded (their
    /// completion handles resolve as dropped), in-flight actions run to
    /// completion, and all workers are joined. Subsequent pushes fail
    /// with [`DispatchError::SchedulerShutdown`]. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            if self.shared.shutdown.swap(true, Ordering::AcqRel) {
                return;
            }
            for bucket in &mut state.buckets {
                for thread in bucket.drain(..) {
                    thread.discard_queued();
                }
            }
            self.shared.available.notify_all();
        }

        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            let _ = handle.join();
        }
        info!("logical thread scheduler stopped");
    }
}

impl Drop for LogicalThreadScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for LogicalThreadScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicalThreadScheduler")
            .field("priority_levels", &self.shared.priority_levels)
            .field("max_workers", &self.shared.max_workers)
            .field("shutdown", &self.is_shut_down())
            .finish()
    }
}
