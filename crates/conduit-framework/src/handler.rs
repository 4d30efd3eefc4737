//! Ergonomic handler registration (Design Note 4: "decorator-based
//! registration" replaced by an explicit `subscribe` call plus a thin
//! builder for parity with `@bot.on(EventType, priority=p)`).

use conduit_core::event::{EventBus, FromEvent, HandlerResult, SubscriptionId};
use std::future::Future;
use std::sync::Arc;

/// Builds up a subscription before registering it, standing in for the
/// original's `@bot.on(EventType, priority=p)` decorator (spec §4.3
/// `subscribe`, §6 `bot.on`).
pub struct On<'a, E> {
    bus: &'a EventBus,
    priority: i32,
    _marker: std::marker::PhantomData<E>,
}

impl<'a, E: FromEvent> On<'a, E> {
    pub fn new(bus: &'a EventBus) -> Self {
        Self { bus, priority: 0, _marker: std::marker::PhantomData }
    }

    /// Sets the priority bucket this handler runs in (spec §3 "Handler
    /// registration"; default `0`).
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Registers `handler` and returns its [`SubscriptionId`], which
    /// `unsubscribe` later needs.
    pub fn handle<F, Fut>(self, handler: F) -> SubscriptionId
    where
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.bus.subscribe::<E, _, _>(self.priority, handler)
    }
}

/// Starts a builder for subscribing to event type `E` on `bus`.
pub fn on<E: FromEvent>(bus: &EventBus) -> On<'_, E> {
    On::new(bus)
}

/// A convenience wrapper bundling a bus `Arc` with a subscribed handler
/// set, so a plugin can hold one handle and unsubscribe everything at once.
#[derive(Clone)]
pub struct Subscriptions {
    bus: Arc<EventBus>,
    ids: Arc<parking_lot::Mutex<Vec<(&'static str, SubscriptionId)>>>,
}

impl Subscriptions {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus, ids: Arc::new(parking_lot::Mutex::new(Vec::new())) }
    }

    pub fn on<E, F, Fut>(&self, priority: i32, event_name: &'static str, handler: F) -> SubscriptionId
    where
        E: FromEvent,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let id = self.bus.subscribe::<E, _, _>(priority, handler);
        self.ids.lock().push((event_name, id));
        id
    }

    /// Removes every handler registered through this set.
    pub fn unsubscribe_all(&self) {
        for (event_name, id) in self.ids.lock().drain(..) {
            self.bus.unsubscribe(event_name, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::event::{BoxedEvent, Event, HandlerOutcome, NamedEvent};
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone)]
    struct Ping;

    impl Event for Ping {
        fn event_name(&self) -> &'static str {
            "Ping"
        }
        fn type_chain(&self) -> &'static [&'static str] {
            &["Ping"]
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl NamedEvent for Ping {
        const NAME: &'static str = "Ping";
    }

    impl FromEvent for Ping {
        fn from_event(root: &dyn Event) -> Option<Self> {
            root.as_any().downcast_ref::<Ping>().cloned()
        }
    }

    #[tokio::test]
    async fn on_builder_registers_at_the_requested_priority() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        on::<Ping>(&bus).priority(5).handle(move |_: Ping| {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                Ok(HandlerOutcome::cont())
            }
        });
        bus.emit(BoxedEvent::new(Ping)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn on_builder_defaults_to_priority_zero_and_priority_overrides_it() {
        let bus = EventBus::new();
        let builder: On<'_, Ping> = On::new(&bus);
        assert_eq!(builder.priority, 0);
        assert_eq!(builder.priority(7).priority, 7);
    }

    #[tokio::test]
    async fn unsubscribe_all_removes_every_registered_handler() {
        let bus = Arc::new(EventBus::new());
        let subs = Subscriptions::new(bus.clone());
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        subs.on::<Ping, _, _>(0, "Ping", move |_: Ping| {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                Ok(HandlerOutcome::cont())
            }
        });

        bus.emit(BoxedEvent::new(Ping)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        subs.unsubscribe_all();
        bus.emit(BoxedEvent::new(Ping)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1, "handler should not fire after unsubscribe_all");
    }
}
