//! Statically typed, synchronous publish/subscribe.
//!
//! [`EventDispatcher`] keeps an ordered handler list per event kind. A
//! dispatch invokes every handler of the event's kind on the calling task,
//! in registration order, and collects their return values. Sessions use
//! `R = ()`; the server uses `R = Admission` so that `connection` handlers
//! can veto a peer.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

/// An event that can be routed by kind.
pub trait Event {
    /// Payload-free discriminant used as the subscription key.
    type Kind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// Returns the kind of this event.
    fn kind(&self) -> Self::Kind;
}

/// A subscribed callback.
pub type Handler<E, R> = Arc<dyn Fn(&E) -> R + Send + Sync>;

/// Ordered handler lists keyed by event kind.
///
/// The lock is only held to copy out the handler list; handlers run with no
/// lock held, so a handler may subscribe further handlers (they take effect
/// from the next dispatch on).
pub struct EventDispatcher<E: Event, R = ()> {
    handlers: RwLock<HashMap<E::Kind, Vec<Handler<E, R>>>>,
}

impl<E: Event, R> EventDispatcher<E, R> {
    /// Creates a dispatcher with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Appends `handler` to the list for `kind`.
    pub fn subscribe<F>(&self, kind: E::Kind, handler: F)
    where
        F: Fn(&E) -> R + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .entry(kind)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Invokes every handler registered for the event's kind, first
    /// registered first, and returns their results in the same order.
    pub fn dispatch(&self, event: &E) -> Vec<R> {
        let snapshot = self
            .handlers
            .read()
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();
        snapshot.iter().map(|handler| handler(event)).collect()
    }

    /// Returns the number of handlers registered for `kind`.
    #[must_use]
    pub fn handler_count(&self, kind: E::Kind) -> usize {
        self.handlers.read().get(&kind).map_or(0, Vec::len)
    }

    /// Drops every handler.
    pub fn clear(&self) {
        self.handlers.write().clear();
    }
}

impl<E: Event, R> Default for EventDispatcher<E, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event, R> fmt::Debug for EventDispatcher<E, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read();
        let mut map = f.debug_map();
        for (kind, list) in handlers.iter() {
            map.entry(kind, &list.len());
        }
        map.finish()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Kind {
        Ping,
        Pong,
    }

    #[derive(Debug)]
    enum TestEvent {
        Ping(u32),
        Pong,
    }

    impl Event for TestEvent {
        type Kind = Kind;

        fn kind(&self) -> Kind {
            match self {
                Self::Ping(_) => Kind::Ping,
                Self::Pong => Kind::Pong,
            }
        }
    }

    #[test]
    fn dispatch_without_handlers_returns_nothing() {
        let dispatcher: EventDispatcher<TestEvent> = EventDispatcher::new();
        assert!(dispatcher.dispatch(&TestEvent::Pong).is_empty());
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let dispatcher: EventDispatcher<TestEvent> = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let log = Arc::clone(&log);
            dispatcher.subscribe(Kind::Ping, move |_| log.lock().push(n));
        }
        let _ = dispatcher.dispatch(&TestEvent::Ping(7));
        assert_eq!(*log.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn only_matching_kind_is_invoked() {
        let dispatcher: EventDispatcher<TestEvent> = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pings = Arc::clone(&seen);
        dispatcher.subscribe(Kind::Ping, move |event| {
            if let TestEvent::Ping(n) = event {
                pings.lock().push(*n);
            }
        });
        let _ = dispatcher.dispatch(&TestEvent::Pong);
        let _ = dispatcher.dispatch(&TestEvent::Ping(3));
        assert_eq!(*seen.lock(), vec![3]);
    }

    #[test]
    fn results_are_collected_in_order() {
        let dispatcher: EventDispatcher<TestEvent, u32> = EventDispatcher::new();
        dispatcher.subscribe(Kind::Ping, |_| 1);
        dispatcher.subscribe(Kind::Ping, |event| match event {
            TestEvent::Ping(n) => *n,
            TestEvent::Pong => 0,
        });
        assert_eq!(dispatcher.dispatch(&TestEvent::Ping(9)), vec![1, 9]);
    }

    #[test]
    fn handler_may_subscribe_during_dispatch() {
        let dispatcher: Arc<EventDispatcher<TestEvent>> = Arc::new(EventDispatcher::new());
        let inner = Arc::clone(&dispatcher);
        dispatcher.subscribe(Kind::Pong, move |_| {
            inner.subscribe(Kind::Pong, |_| {});
        });
        let _ = dispatcher.dispatch(&TestEvent::Pong);
        assert_eq!(dispatcher.handler_count(Kind::Pong), 2);
    }

    #[test]
    fn clear_drops_all_handlers() {
        let dispatcher: EventDispatcher<TestEvent> = EventDispatcher::new();
        dispatcher.subscribe(Kind::Ping, |_| {});
        dispatcher.subscribe(Kind::Pong, |_| {});
        dispatcher.clear();
        assert_eq!(dispatcher.handler_count(Kind::Ping), 0);
        assert_eq!(dispatcher.handler_count(Kind::Pong), 0);
    }
}
