//! Engine-side half of the bridge

use super::invoker::Invoker;
use super::queue::{check_release, engine_thread_check, DeferredTask, DispatchQueue, EventDispatcher, ThreadCheck};
use crate::error::{BridgeError, Result};
use crate::event::Event;
use crate::marshal::Marshaller;
use crate::native::{Hashtable, NativeValue};
use crate::registry::{CallbackHandle, CallbackRegistry};
use crate::value::Value;
use std::sync::Arc;
use tether_metrics::{Counter, DrainTimer};

/// Drains kept for the rolling drain-time average
const DRAIN_HISTORY: usize = 120;

/// What `ScriptBridge::dispatch_event` did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Delivered synchronously.
    Invoked,
    /// Queued with this sequence number.
    Deferred(u64),
    /// The target was nil; nothing happened.
    Nil,
}

/// Outcome of one `execute_tasks` call.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DrainReport {
    pub invoked: usize,
    /// Tasks whose target, or a handle in their payload, had been released
    /// before the drain reached them.
    pub skipped: usize,
    /// Tasks whose callable raised or could not be marshalled.
    pub failed: usize,
    /// `delete_ref` releases performed.
    pub released: usize,
    /// Sequence number and error of every task that did not run cleanly.
    pub errors: Vec<(u64, BridgeError)>,
}

impl DrainReport {
    pub fn total(&self) -> usize {
        self.invoked + self.skipped + self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Owns the callback registry and the engine end of the dispatch queue.
///
/// Lives on the engine thread for the whole embedding session; hand
/// [`ScriptBridge::dispatcher`] clones to any other thread that needs to
/// raise events.
pub struct ScriptBridge {
    registry: CallbackRegistry,
    dispatcher: EventDispatcher,
    counter: Counter,
    drain_timer: DrainTimer,
}

impl ScriptBridge {
    pub fn new(is_engine_thread: ThreadCheck) -> Self {
        Self {
            registry: CallbackRegistry::new(),
            dispatcher: EventDispatcher::new(Arc::new(DispatchQueue::new()), is_engine_thread),
            counter: Counter::new(),
            drain_timer: DrainTimer::new(DRAIN_HISTORY),
        }
    }

    /// Bridge whose engine thread is the calling thread.
    pub fn for_current_thread() -> Self {
        Self::new(engine_thread_check())
    }

    /// Handle for producers on other threads.
    pub fn dispatcher(&self) -> EventDispatcher {
        self.dispatcher.clone()
    }

    pub fn registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut CallbackRegistry {
        &mut self.registry
    }

    pub fn new_ref(&mut self, value: Value) -> CallbackHandle {
        self.registry.new_ref(value)
    }

    pub fn delete_ref_if_not_nil(&mut self, handle: Option<CallbackHandle>) -> Result<()> {
        self.registry.delete_ref_if_not_nil(handle)
    }

    pub fn push_value(&self, value: &NativeValue) -> Result<Value> {
        Marshaller::new(&self.registry).push_value(value)
    }

    pub fn push_hashtable(&self, map: &Hashtable) -> Result<Value> {
        Marshaller::new(&self.registry).push_hashtable(map)
    }

    /// Tasks waiting for the next drain.
    pub fn pending(&self) -> usize {
        self.dispatcher.queue().len()
    }

    pub fn counter(&self) -> &Counter {
        &self.counter
    }

    pub fn drain_timer(&self) -> &DrainTimer {
        &self.drain_timer
    }

    /// Deliver `event` to `target`.
    ///
    /// On the engine thread the listener runs before this returns and, with
    /// `delete_ref`, the handle is released right after. Anywhere else the
    /// event is queued. The caller must not release a `delete_ref` handle
    /// itself; asking for it through a weak alias is `NotOwner` and nothing
    /// runs.
    pub fn dispatch_event(
        &mut self,
        invoker: &mut dyn Invoker,
        target: impl Into<Option<CallbackHandle>>,
        event: Event,
        delete_ref: bool,
    ) -> Result<Dispatch> {
        let Some(target) = target.into() else {
            return Ok(Dispatch::Nil);
        };

        check_release(target, delete_ref)?;

        if !self.dispatcher.is_engine_thread() {
            let seq = self.dispatcher.queue().push(target, event, delete_ref);
            return Ok(Dispatch::Deferred(seq));
        }

        let (outcome, _) = self.deliver(invoker, target, &event, delete_ref);
        outcome?;
        self.counter.increment("invoked", 1);
        Ok(Dispatch::Invoked)
    }

    /// Run every task queued before this call, oldest first.
    ///
    /// A failing task is logged and recorded in the report; the drain goes
    /// on with the next one. A task whose payload carries a released handle
    /// is skipped like one whose target was released: the listener does not
    /// run. Tasks queued while draining wait for the next call.
    pub fn execute_tasks(&mut self, invoker: &mut dyn Invoker) -> Result<DrainReport> {
        if !self.dispatcher.is_engine_thread() {
            return Err(BridgeError::WrongThread {
                operation: "execute_tasks",
            });
        }

        self.drain_timer.begin();
        let tasks = self.dispatcher.queue().take_all();
        self.counter.increment("deferred", tasks.len());
        let mut report = DrainReport::default();

        for DeferredTask {
            seq,
            target,
            event,
            delete_ref,
        } in tasks
        {
            let (outcome, released) = self.deliver(invoker, target, &event, delete_ref);
            if released {
                report.released += 1;
            }
            match outcome {
                Ok(()) => report.invoked += 1,
                Err(err @ BridgeError::StaleHandle { handle }) => {
                    if handle == target {
                        tracing::warn!(seq, %target, "skipping deferred event: {err}");
                    } else {
                        tracing::warn!(
                            seq,
                            %target,
                            payload = %handle,
                            "skipping deferred event, payload handle was released"
                        );
                    }
                    report.skipped += 1;
                    report.errors.push((seq, err));
                }
                Err(err) => {
                    tracing::warn!(seq, %target, event = event.name(), "deferred event failed: {err}");
                    report.failed += 1;
                    report.errors.push((seq, err));
                }
            }
        }

        self.drain_timer.end(report.total());
        self.counter.increment("invoked", report.invoked);
        self.counter.increment("skipped", report.skipped);
        self.counter.increment("failed", report.failed);

        tether_metrics::metrics! {
            if report.total() > 0 {
                tracing::trace!(
                    tasks = report.total(),
                    drain_ms = self.drain_timer.last_drain_ms(),
                    avg_drain_ms = self.drain_timer.drain_time_ms(),
                    "drained dispatch queue"
                );
            }
        }
        Ok(report)
    }

    /// Marshal and invoke, then release once if asked to.
    ///
    /// Returns the invocation outcome (or the release error if the
    /// invocation succeeded) and whether a release happened.
    fn deliver(
        &mut self,
        invoker: &mut dyn Invoker,
        target: CallbackHandle,
        event: &Event,
        delete_ref: bool,
    ) -> (Result<()>, bool) {
        let outcome = self.invoke(invoker, target, event);

        if !delete_ref || !self.registry.contains(target) {
            return (outcome, false);
        }
        match self.registry.delete_ref(target) {
            Ok(()) => (outcome, true),
            Err(err) => {
                tracing::error!(%target, "delete_ref after dispatch failed: {err}");
                (outcome.and(Err(err)), false)
            }
        }
    }

    fn invoke(&self, invoker: &mut dyn Invoker, target: CallbackHandle, event: &Event) -> Result<()> {
        let callable = self.registry.get(target)?.clone();
        let tag = self.registry.tag(target)?;
        let argument = Marshaller::new(&self.registry).push_event(event, tag)?;
        tracing::trace!(%target, event = event.name(), "invoking listener");
        invoker.invoke(&callable, argument)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::NativeInvoker;
    use crate::value::FunctionRef;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Barrier;
    use std::thread;

    /// Listener that records the `name` and `thread` fields it was called with.
    fn recorder() -> (Value, Rc<RefCell<Vec<(String, Option<f64>)>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let listener = FunctionRef::native(move |event| {
            let table = event.as_table().ok_or("event is not a table")?;
            let name = match table.get("name") {
                Some(Value::String(name)) => name.clone(),
                _ => String::new(),
            };
            let thread = table.get("thread").and_then(Value::to_number);
            sink.borrow_mut().push((name, thread));
            Ok(())
        });
        (Value::Function(listener), log)
    }

    fn never_engine() -> ThreadCheck {
        Arc::new(|| false)
    }

    #[test]
    fn test_engine_thread_dispatch_is_immediate() {
        let mut bridge = ScriptBridge::for_current_thread();
        let (listener, log) = recorder();
        let handle = bridge.new_ref(listener);

        let outcome = bridge.dispatch_event(&mut NativeInvoker, handle, Event::new("tick"), false);
        assert_eq!(outcome, Ok(Dispatch::Invoked));
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(bridge.pending(), 0);
        assert!(bridge.registry().contains(handle));

        let outcome = bridge.dispatch_event(&mut NativeInvoker, handle, Event::new("done"), true);
        assert_eq!(outcome, Ok(Dispatch::Invoked));
        assert!(!bridge.registry().contains(handle));
    }

    #[test]
    fn test_nil_target_is_noop() {
        let mut bridge = ScriptBridge::for_current_thread();
        let outcome = bridge.dispatch_event(&mut NativeInvoker, None, Event::new("x"), true);
        assert_eq!(outcome, Ok(Dispatch::Nil));
    }

    #[test]
    fn test_off_engine_dispatch_is_deferred() {
        let mut bridge = ScriptBridge::new(never_engine());
        let (listener, log) = recorder();
        let handle = bridge.new_ref(listener);

        let outcome = bridge.dispatch_event(&mut NativeInvoker, handle, Event::new("x"), false);
        assert_eq!(outcome, Ok(Dispatch::Deferred(0)));
        assert!(log.borrow().is_empty());
        assert_eq!(bridge.pending(), 1);

        // Not the engine thread, so nothing may drain here either
        assert_eq!(
            bridge.execute_tasks(&mut NativeInvoker),
            Err(BridgeError::WrongThread { operation: "execute_tasks" })
        );
    }

    #[test]
    fn test_cross_thread_events_drain_in_enqueue_order() {
        const THREADS: usize = 8;

        let mut bridge = ScriptBridge::for_current_thread();
        let (listener, log) = recorder();
        let handle = bridge.new_ref(listener);

        let barrier = Arc::new(Barrier::new(THREADS));
        let workers: Vec<_> = (0..THREADS)
            .map(|i| {
                let dispatcher = bridge.dispatcher();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    assert!(!dispatcher.is_engine_thread());
                    barrier.wait();
                    let event = dispatcher.new_event("work").with("thread", i as f64);
                    let seq = dispatcher.dispatch_event(handle, event, false).unwrap();
                    (seq.unwrap(), i as f64)
                })
            })
            .collect();

        let mut enqueued: Vec<(u64, f64)> = workers.into_iter().map(|w| w.join().unwrap()).collect();
        enqueued.sort_by_key(|(seq, _)| *seq);
        assert!(log.borrow().is_empty());

        let report = bridge.execute_tasks(&mut NativeInvoker).unwrap();
        assert_eq!(report.invoked, THREADS);
        assert!(report.is_clean());

        let delivered: Vec<f64> = log.borrow().iter().filter_map(|(_, thread)| *thread).collect();
        let expected: Vec<f64> = enqueued.iter().map(|(_, thread)| *thread).collect();
        assert_eq!(delivered, expected);
    }

    #[test]
    fn test_released_handle_is_skipped() {
        let mut bridge = ScriptBridge::for_current_thread();
        let (listener, log) = recorder();
        let handle = bridge.new_ref(listener);
        let (other, _) = recorder();
        let live = bridge.new_ref(other);

        let dispatcher = bridge.dispatcher();
        dispatcher.dispatch_event(handle, Event::new("late"), false).unwrap();
        dispatcher.dispatch_event(live, Event::new("fine"), false).unwrap();
        bridge.delete_ref_if_not_nil(Some(handle)).unwrap();

        let report = bridge.execute_tasks(&mut NativeInvoker).unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.invoked, 1);
        assert_eq!(report.errors, vec![(0, BridgeError::StaleHandle { handle })]);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_double_release_surfaces() {
        let mut bridge = ScriptBridge::for_current_thread();
        let handle = bridge.new_ref(Value::Nil);
        bridge.delete_ref_if_not_nil(Some(handle)).unwrap();
        assert_eq!(
            bridge.delete_ref_if_not_nil(Some(handle)),
            Err(BridgeError::DoubleRelease { handle })
        );
    }

    #[test]
    fn test_delete_ref_releases_once_even_on_failure() {
        let mut bridge = ScriptBridge::for_current_thread();
        let failing = Value::Function(FunctionRef::native(|_| Err("listener raised".to_string())));
        let handle = bridge.new_ref(failing);

        let dispatcher = bridge.dispatcher();
        dispatcher.dispatch_event(handle, Event::new("a"), true).unwrap();
        dispatcher.dispatch_event(handle, Event::new("b"), true).unwrap();

        let report = bridge.execute_tasks(&mut NativeInvoker).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.released, 1);
        assert!(bridge.registry().is_empty());
    }

    #[test]
    fn test_tasks_queued_during_drain_wait_for_next_drain() {
        let mut bridge = ScriptBridge::for_current_thread();
        let dispatcher = bridge.dispatcher();
        let calls = Rc::new(RefCell::new(0));

        let counter = Rc::clone(&calls);
        let slot: Rc<RefCell<Option<CallbackHandle>>> = Rc::new(RefCell::new(None));
        let me = Rc::clone(&slot);
        let echo = FunctionRef::native(move |_| {
            *counter.borrow_mut() += 1;
            if let Some(handle) = *me.borrow() {
                dispatcher
                    .dispatch_event(handle, Event::new("again"), false)
                    .map_err(|err| err.to_string())?;
            }
            Ok(())
        });
        let handle = bridge.new_ref(Value::Function(echo));
        *slot.borrow_mut() = Some(handle);

        bridge.dispatcher().dispatch_event(handle, Event::new("first"), false).unwrap();

        let report = bridge.execute_tasks(&mut NativeInvoker).unwrap();
        assert_eq!(report.invoked, 1);
        assert_eq!(*calls.borrow(), 1);
        assert_eq!(bridge.pending(), 1);

        bridge.execute_tasks(&mut NativeInvoker).unwrap();
        assert_eq!(*calls.borrow(), 2);
    }

    #[test]
    fn test_listener_tag_names_unnamed_events() {
        let mut bridge = ScriptBridge::for_current_thread();
        let (listener, log) = recorder();
        let handle = bridge
            .registry_mut()
            .new_tagged_ref(listener, Some("microphone".to_string()));

        let mut event = bridge.dispatcher().new_event("");
        event.set_phase("recorded");
        bridge.dispatch_event(&mut NativeInvoker, handle, event, true).unwrap();

        assert_eq!(log.borrow()[0].0, "microphone");
    }

    #[test]
    fn test_payload_handles_resolve_at_delivery() {
        let mut bridge = ScriptBridge::for_current_thread();
        let seen = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&seen);
        let listener = FunctionRef::native(move |event| {
            let table = event.as_table().ok_or("event is not a table")?;
            *flag.borrow_mut() = matches!(table.get("reply"), Some(Value::Function(_)));
            Ok(())
        });
        let handle = bridge.new_ref(Value::Function(listener));
        let reply = bridge.new_ref(Value::Function(FunctionRef::native(|_| Ok(()))));

        let event = Event::new("request").with("reply", reply);
        bridge.dispatch_event(&mut NativeInvoker, handle, event, false).unwrap();
        assert!(*seen.borrow());
    }

    #[test]
    fn test_released_payload_handle_skips_live_target() {
        let mut bridge = ScriptBridge::for_current_thread();
        let (listener, log) = recorder();
        let handle = bridge.new_ref(listener);
        let reply = bridge.new_ref(Value::Function(FunctionRef::native(|_| Ok(()))));

        let event = Event::new("request").with("reply", reply);
        bridge.dispatcher().dispatch_event(handle, event, false).unwrap();
        bridge.delete_ref_if_not_nil(Some(reply)).unwrap();

        let report = bridge.execute_tasks(&mut NativeInvoker).unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.errors, vec![(0, BridgeError::StaleHandle { handle: reply })]);
        assert!(log.borrow().is_empty());
        assert!(bridge.registry().contains(handle));
    }

    #[test]
    fn test_alias_with_delete_ref_is_rejected_up_front() {
        let mut bridge = ScriptBridge::for_current_thread();
        let (listener, log) = recorder();
        let owner = bridge.new_ref(listener);
        let alias = bridge.registry().alias(owner).unwrap();

        let outcome = bridge.dispatch_event(&mut NativeInvoker, alias, Event::new("now"), true);
        assert_eq!(outcome, Err(BridgeError::NotOwner { handle: alias }));
        assert!(log.borrow().is_empty());

        assert_eq!(
            bridge.dispatcher().dispatch_event(alias, Event::new("later"), true),
            Err(BridgeError::NotOwner { handle: alias })
        );
        let report = bridge.execute_tasks(&mut NativeInvoker).unwrap();
        assert_eq!(report, DrainReport::default());
        assert!(bridge.registry().contains(owner));

        // An alias may still deliver without asking for a release
        bridge.dispatch_event(&mut NativeInvoker, alias, Event::new("tick"), false).unwrap();
        assert_eq!(log.borrow().len(), 1);
        bridge.delete_ref_if_not_nil(Some(owner)).unwrap();
        assert!(bridge.registry().is_empty());
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_deferred_counter_counts_drained_tasks() {
        let mut bridge = ScriptBridge::for_current_thread();
        let (listener, _) = recorder();
        let handle = bridge.new_ref(listener);

        let dispatcher = bridge.dispatcher();
        thread::spawn(move || {
            for _ in 0..3 {
                dispatcher.dispatch_event(handle, Event::new("x"), false).unwrap();
            }
        })
        .join()
        .unwrap();
        bridge.execute_tasks(&mut NativeInvoker).unwrap();

        assert_eq!(bridge.counter().get("deferred"), 3);
        assert_eq!(bridge.counter().get("invoked"), 3);
    }
}
