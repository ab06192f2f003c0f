//! ---
//! gp_section: "05-concurrency-dispatch"
//! gp_subsection: "module"
//! gp_type: "source"
//! gp_scope: "code"
//! gp_description: "Logical threads and the cooperative worker-pool scheduler."
//! gp_version: "v0.0.0-prealpha"
//! gp_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::errors::{DispatchError, Result};
use crate::thread::LogicalThread;

enum Slot<T> {
    Pending,
    Done(Result<T>),
}

struct CompletionShared<T> {
    slot: Mutex<Slot<T>>,
    done: Condvar,
}

/// Waitable handle for a continuation submitted to a logical thread.
///
/// Resolves once the action ran; if the action failed, panicked, or was
/// discarded (thread cleared, scheduler shut down), the handle resolves
/// with the corresponding error instead of blocking forever.
pub struct CompletionHandle<T> {
    shared: Arc<CompletionShared<T>>,
}

impl<T> CompletionHandle<T> {
    /// Block until the continuation resolves.
    pub fn wait(self) -> Result<T> {
        let mut slot = self.shared.slot.lock();
        while matches!(*slot, Slot::Pending) {
            self.shared.done.wait(&mut slot);
        }
        match std::mem::replace(&mut *slot, Slot::Pending) {
            Slot::Done(result) => result,
            Slot::Pending => unreachable!("guarded by the wait loop"),
        }
    }

    /// Block for at most `timeout`; `None` means the continuation has not
    /// resolved yet (the handle is consumed either way).
    pub fn wait_for(self, timeout: Duration) -> Option<Result<T>> {
        let mut slot = self.shared.slot.lock();
        if matches!(*slot, Slot::Pending) {
            let deadline = std::time::Instant::now() + timeout;
            while matches!(*slot, Slot::Pending) {
                if self.shared.done.wait_until(&mut slot, deadline).timed_out() {
                    return None;
                }
            }
        }
        match std::mem::replace(&mut *slot, Slot::Pending) {
            Slot::Done(result) => Some(result),
            Slot::Pending => unreachable!("guarded by the wait loop"),
        }
    }

    /// Whether the continuation has resolved.
    pub fn is_complete(&self) -> bool {
        !matches!(*self.shared.slot.lock(), Slot::Pending)
    }
}

struct CompletionSender<T> {
    shared: Arc<CompletionShared<T>>,
    sent: bool,
}

impl<T> CompletionSender<T> {
    fn send(&mut self, result: Result<T>) {
        let mut slot = self.shared.slot.lock();
        *slot = Slot::Done(result);
        self.sent = true;
        self.shared.done.notify_all();
    }
}

impl<T> Drop for CompletionSender<T> {
    fn drop(&mut self) {
        if self.sent {
            return;
        }
        let mut slot = self.shared.slot.lock();
        if matches!(*slot, Slot::Pending) {
            *slot = Slot::Done(Err(DispatchError::ActionDropped));
            self.shared.done.notify_all();
        }
    }
}

fn completion_channel<T>() -> (CompletionSender<T>, CompletionHandle<T>) {
    let shared = Arc::new(CompletionShared {
        slot: Mutex::new(Slot::Pending),
        done: Condvar::new(),
    });
    (
        CompletionSender {
            shared: shared.clone(),
            sent: false,
        },
        CompletionHandle { shared },
    )
}

impl LogicalThread {
    /// Submit a continuation to run on this logical thread at `priority`
    /// and return a handle that resolves with its result.
    ///
    /// The continuation is an ordinary queued action, so the
    /// single-active-action ordering of the logical thread holds across
    /// the suspension boundary. A failing continuation resolves the
    /// handle with [`DispatchError::ActionFailed`] and is also delivered
    /// to the thread's fault observers.
    pub fn run_on<T, F>(&self, priority: usize, task: F) -> Result<CompletionHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let (mut sender, handle) = completion_channel();
        self.push_at(priority, move || match task() {
            Ok(value) => {
                sender.send(Ok(value));
                Ok(())
            }
            Err(error) => {
                sender.send(Err(DispatchError::ActionFailed(format!("{error:#}"))));
                Err(error)
            }
        })?;
        Ok(handle)
    }

    /// Fire-and-forget hop onto this logical thread: queue the
    /// continuation at `priority` and return immediately. The hop is
    /// always asynchronous, even when the caller already runs on this
    /// logical thread.
    pub fn yield_to<F>(&self, priority: usize, task: F) -> Result<()>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.push_at(priority, task)
    }
}
