//! Owned subscriptions
//!
//! A [`Subscription`] is the only handle to a registered handler. It is
//! released explicitly with [`Subscription::release`] or implicitly when
//! dropped, so a destroyed owner cannot leave a live handler behind.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

use crate::bus::{BusInner, SubscriberEntry, SubscriberId};

/// Handle to a live subscriber
pub struct Subscription {
    bus: Weak<BusInner>,
    entry: Arc<SubscriberEntry>,
}

impl Subscription {
    pub(crate) fn new(bus: Weak<BusInner>, entry: Arc<SubscriberEntry>) -> Self {
        Self { bus, entry }
    }

    /// Subscriber id
    pub fn id(&self) -> SubscriberId {
        self.entry.id
    }

    /// Stop receiving envelopes. Idempotent.
    ///
    /// Takes effect before the next delivery check, including an in-flight
    /// publish that has not reached this subscriber yet.
    ///
    /// Does not wait for the handler. A delivery that passed its check on
    /// another thread before the release may still be running when this
    /// returns, so state the handler captures must stay valid until that
    /// call finishes (hold it in an `Arc`, not a borrow of the owner).
    pub fn release(&self) {
        if self.entry.released.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.entry.id);
        }
        log::debug!("Released subscriber {:?}", self.entry.id);
    }

    /// Whether release has begun
    pub fn is_released(&self) -> bool {
        self.entry.released.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.entry.id)
            .field("released", &self.is_released())
            .finish()
    }
}

/// All subscriptions held by one owner (an island instance, a factory)
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a subscription
    pub fn add(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    /// Release every subscription in registration order and clear the set
    pub fn release_all(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.release();
        }
    }

    /// Number of held subscriptions
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the set holds nothing
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Address, EventBus, Pattern};
    use serde_json::Value;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_release_is_idempotent() {
        let bus = EventBus::new();
        let sub = bus.subscribe(Pattern::channel("c"), |_| {});
        assert_eq!(bus.subscriber_count(), 1);

        sub.release();
        sub.release();
        assert!(sub.is_released());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_drop_releases() {
        let bus = EventBus::new();
        {
            let _sub = bus.subscribe(Pattern::channel("c"), |_| {});
            assert_eq!(bus.subscriber_count(), 1);
        }
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_release_outlives_bus() {
        let sub = {
            let bus = EventBus::new();
            bus.subscribe(Pattern::channel("c"), |_| {})
        };
        sub.release();
        assert!(sub.is_released());
    }

    #[test]
    fn test_set_release_all() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicU32::new(0));
        let mut set = SubscriptionSet::new();

        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            set.add(bus.subscribe(Pattern::channel("c"), move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(set.len(), 3);

        set.release_all();
        assert!(set.is_empty());
        assert_eq!(bus.publish(Address::new("c", "t"), Value::Null), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
