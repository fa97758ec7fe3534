//! Synchronous publish/subscribe dispatcher with a capped event history.
//!
//! `publish` runs every matching subscriber inline, in subscription order.
//! A subscriber that returns an error or panics is logged and skipped; the
//! publisher never sees the failure. Subscribers that need to do slow work
//! must hand it off to their own task.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use super::{Event, EventType};

pub type Subscriber = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

/// Which events a subscriber receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    All,
    Only(EventType),
}

impl EventFilter {
    fn matches(&self, event_type: EventType) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Only(t) => *t == event_type,
        }
    }
}

impl From<EventType> for EventFilter {
    fn from(event_type: EventType) -> Self {
        EventFilter::Only(event_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    filter: EventFilter,
    callback: Subscriber,
}

pub struct EventBus {
    subscriptions: RwLock<Vec<Subscription>>,
    history: RwLock<VecDeque<Event>>,
    capacity: usize,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            history: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe<F>(&self, filter: impl Into<EventFilter>, callback: F) -> SubscriptionId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscription {
                id,
                filter: filter.into(),
                callback: Arc::new(callback),
            });
        id
    }

    /// Returns `false` if the handle was already removed.
    #[allow(dead_code)]
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    pub fn publish(&self, event: Event) {
        {
            let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
            if history.len() >= self.capacity {
                history.pop_front();
            }
            history.push_back(event.clone());
        }

        // Snapshot under the lock, dispatch outside it so callbacks may
        // subscribe/unsubscribe without deadlocking.
        let targets: Vec<Subscriber> = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.filter.matches(event.event_type))
            .map(|s| Arc::clone(&s.callback))
            .collect();

        debug!(
            event_type = %event.event_type,
            source = %event.source,
            subscribers = targets.len(),
            "Publishing event"
        );

        for callback in targets {
            match catch_unwind(AssertUnwindSafe(|| callback(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(
                    event_type = %event.event_type,
                    "Event subscriber failed: {e:#}"
                ),
                Err(_) => warn!(event_type = %event.event_type, "Event subscriber panicked"),
            }
        }
    }

    /// Most recent events, oldest first. `None` matches every type.
    pub fn history(&self, event_type: Option<EventType>, limit: usize) -> Vec<Event> {
        let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
        let mut matching: Vec<Event> = history
            .iter()
            .rev()
            .filter(|e| event_type.map_or(true, |t| e.event_type == t))
            .take(limit)
            .cloned()
            .collect();
        matching.reverse();
        matching
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn event(event_type: EventType, n: u64) -> Event {
        Event::new(event_type, "test", json!({ "n": n }))
    }

    #[test]
    fn test_publish_with_no_subscribers_is_noop() {
        let bus = EventBus::new(10);
        bus.publish(event(EventType::SessionStart, 1));
        assert_eq!(bus.history(None, 10).len(), 1);
    }

    #[test]
    fn test_delivery_follows_subscription_order() {
        let bus = EventBus::new(10);
        let seen = Arc::new(Mutex::new(Vec::new()));
        for label in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            bus.subscribe(EventFilter::All, move |_| {
                seen.lock().unwrap().push(label);
                Ok(())
            });
        }
        bus.publish(event(EventType::UserMessage, 1));
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_failing_and_panicking_subscribers_do_not_block_siblings() {
        let bus = EventBus::new(10);
        let delivered = Arc::new(Mutex::new(0));

        bus.subscribe(EventFilter::All, |_| Err(anyhow::anyhow!("boom")));
        bus.subscribe(EventFilter::All, |_| panic!("subscriber exploded"));
        let counter = Arc::clone(&delivered);
        bus.subscribe(EventFilter::All, move |_| {
            *counter.lock().unwrap() += 1;
            Ok(())
        });

        bus.publish(event(EventType::Error, 1));
        assert_eq!(*delivered.lock().unwrap(), 1);
    }

    #[test]
    fn test_type_filter_only_receives_matching_events() {
        let bus = EventBus::new(10);
        let count = Arc::new(Mutex::new(0));
        let c = Arc::clone(&count);
        bus.subscribe(EventType::SessionEnd, move |_| {
            *c.lock().unwrap() += 1;
            Ok(())
        });
        bus.publish(event(EventType::SessionStart, 1));
        bus.publish(event(EventType::SessionEnd, 2));
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new(10);
        let count = Arc::new(Mutex::new(0));
        let c = Arc::clone(&count);
        let id = bus.subscribe(EventFilter::All, move |_| {
            *c.lock().unwrap() += 1;
            Ok(())
        });
        bus.publish(event(EventType::UserMessage, 1));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(event(EventType::UserMessage, 2));
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_history_drops_oldest_on_overflow() {
        let bus = EventBus::new(3);
        for n in 0..5 {
            bus.publish(event(EventType::UserMessage, n));
        }
        let history = bus.history(None, 10);
        let ns: Vec<u64> = history
            .iter()
            .map(|e| e.data["n"].as_u64().unwrap())
            .collect();
        assert_eq!(ns, vec![2, 3, 4]);
    }

    #[test]
    fn test_history_filters_by_type_and_limit() {
        let bus = EventBus::new(20);
        for n in 0..6 {
            let t = if n % 2 == 0 {
                EventType::UserMessage
            } else {
                EventType::AgentResponse
            };
            bus.publish(event(t, n));
        }
        let history = bus.history(Some(EventType::AgentResponse), 2);
        let ns: Vec<u64> = history
            .iter()
            .map(|e| e.data["n"].as_u64().unwrap())
            .collect();
        assert_eq!(ns, vec![3, 5]);
    }

    #[test]
    fn test_subscriber_may_subscribe_during_dispatch() {
        let bus = Arc::new(EventBus::new(10));
        let inner = Arc::clone(&bus);
        bus.subscribe(EventFilter::All, move |_| {
            inner.subscribe(EventFilter::All, |_| Ok(()));
            Ok(())
        });
        bus.publish(event(EventType::SessionStart, 1));
        assert_eq!(bus.history(None, 10).len(), 1);
    }
}
