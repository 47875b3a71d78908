//! Load-cycle events and the injectable pub/sub bus.
//!
//! The original map application observed dataset loads through a shared
//! global emitter. Here the bus is an explicit object owned by the
//! application context and handed to collaborators, so there is no hidden
//! global coupling.

/// Terminal signals of a dataset load cycle.
///
/// Each is fired at most once per cycle; the loaded and failed variants of
/// a dataset are mutually exclusive outcomes of that cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapEvent {
    StationsLoaded,
    StationsLoadFailed,
    ServiceAreaLoaded,
    ServiceAreaLoadFailed,
}

/// Anything that can receive load-cycle events.
pub trait EventSink {
    fn publish(&self, event: MapEvent);
}

type Subscriber = Box<dyn Fn(MapEvent)>;

/// A single-threaded subscriber list.
///
/// Subscribers run synchronously, in registration order, on the thread
/// that drives the load. Like the rest of the engine this is cooperative
/// event-loop machinery, not a cross-thread channel.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: impl Fn(MapEvent) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: MapEvent) {
        for subscriber in &self.subscribers {
            subscriber(event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
