//! Deferred task queue and the any-thread dispatcher handle

use crate::error::{BridgeError, Result};
use crate::event::Event;
use crate::registry::CallbackHandle;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

/// Returns true when called on the engine thread.
pub type ThreadCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Predicate that recognises the calling thread as the engine thread.
pub fn engine_thread_check() -> ThreadCheck {
    let engine = thread::current().id();
    Arc::new(move || thread::current().id() == engine)
}

/// An event waiting for the next drain.
#[derive(Debug, Clone)]
pub struct DeferredTask {
    /// Enqueue order; strictly increasing per queue.
    pub seq: u64,
    pub target: CallbackHandle,
    pub event: Event,
    /// Release `target` once the task has run or been abandoned.
    pub delete_ref: bool,
}

#[derive(Default)]
struct QueueState {
    tasks: Vec<DeferredTask>,
    next_seq: u64,
}

/// FIFO shared between producer threads and the engine thread.
///
/// One lock guards both enqueue and the drain swap. It is never held while
/// a callback runs.
#[derive(Default)]
pub struct DispatchQueue {
    state: Mutex<QueueState>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // A producer that panicked mid-push leaves the Vec intact
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a task and return its sequence number.
    pub fn push(&self, target: CallbackHandle, event: Event, delete_ref: bool) -> u64 {
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.tasks.push(DeferredTask {
            seq,
            target,
            event,
            delete_ref,
        });
        seq
    }

    /// Everything queued so far, oldest first. Later pushes land in a
    /// fresh queue.
    pub fn take_all(&self) -> Vec<DeferredTask> {
        std::mem::take(&mut self.lock().tasks)
    }

    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cloneable, thread-safe entry point for native code that wants to
/// notify a script listener.
///
/// Every dispatch through this handle is deferred to the next
/// `ScriptBridge::execute_tasks`, whichever thread it comes from.
#[derive(Clone)]
pub struct EventDispatcher {
    queue: Arc<DispatchQueue>,
    is_engine_thread: ThreadCheck,
}

impl EventDispatcher {
    pub fn new(queue: Arc<DispatchQueue>, is_engine_thread: ThreadCheck) -> Self {
        Self {
            queue,
            is_engine_thread,
        }
    }

    pub fn new_event(&self, name: &str) -> Event {
        Event::new(name)
    }

    pub fn new_legacy_event(&self, name: &str) -> Event {
        Event::legacy(name)
    }

    pub fn is_engine_thread(&self) -> bool {
        (self.is_engine_thread)()
    }

    pub fn queue(&self) -> &Arc<DispatchQueue> {
        &self.queue
    }

    /// Queue `event` for `target`. A nil target is dropped and yields
    /// `None`; otherwise the task's sequence number is returned.
    ///
    /// `delete_ref` through a weak alias is `NotOwner` and queues nothing.
    pub fn dispatch_event(
        &self,
        target: impl Into<Option<CallbackHandle>>,
        event: Event,
        delete_ref: bool,
    ) -> Result<Option<u64>> {
        let Some(target) = target.into() else {
            tracing::trace!(event = event.name(), "dispatch to nil listener dropped");
            return Ok(None);
        };
        check_release(target, delete_ref)?;
        let seq = self.queue.push(target, event, delete_ref);
        tracing::trace!(%target, seq, "event deferred");
        Ok(Some(seq))
    }
}

/// Only an owning handle may ask for its release.
pub(crate) fn check_release(target: CallbackHandle, delete_ref: bool) -> Result<()> {
    if delete_ref && target.is_alias() {
        return Err(BridgeError::NotOwner { handle: target });
    }
    Ok(())
}
