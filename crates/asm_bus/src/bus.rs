//! The event bus
//!
//! Subscribers live in a copy-on-write list: `publish` clones the current
//! `Arc<Vec<..>>` under a short read lock and delivers with no lock held, so
//! handlers may publish, subscribe or release re-entrantly.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

use crate::address::{Address, Pattern};
use crate::envelope::{EventEnvelope, SenderId};
use crate::subscription::Subscription;
use crate::BusResult;

/// Subscriber handler
pub type Handler = Box<dyn Fn(&EventEnvelope) + Send + Sync>;

/// Subscriber ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub u64);

/// Handler entry in the bus
pub(crate) struct SubscriberEntry {
    pub(crate) id: SubscriberId,
    pattern: Pattern,
    handler: Handler,
    /// Set when release begins; checked before every delivery
    pub(crate) released: AtomicBool,
}

/// Event bus statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBusStats {
    /// Envelopes published (synchronous and flushed)
    pub published: u64,
    /// Individual handler deliveries
    pub delivered: u64,
    /// Envelopes ever enqueued for deferred delivery
    pub queued: u64,
    /// Live subscribers
    pub subscribers: usize,
}

pub(crate) struct BusInner {
    subscribers: RwLock<Arc<Vec<Arc<SubscriberEntry>>>>,
    next_subscriber_id: AtomicU64,
    sequence: AtomicU64,
    queue_tx: Sender<EventEnvelope>,
    queue_rx: Receiver<EventEnvelope>,
    published: AtomicU64,
    delivered: AtomicU64,
    queued: AtomicU64,
    closed: AtomicBool,
}

impl BusInner {
    /// Remove an entry from the live list (copy-on-write)
    pub(crate) fn remove(&self, id: SubscriberId) {
        let mut guard = self.subscribers.write();
        if guard.iter().any(|entry| entry.id == id) {
            let next: Vec<_> = guard.iter().filter(|entry| entry.id != id).cloned().collect();
            *guard = Arc::new(next);
        }
    }

    fn deliver(&self, envelope: &EventEnvelope) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);

        let snapshot = Arc::clone(&*self.subscribers.read());
        let mut delivered = 0;

        for entry in snapshot.iter() {
            if !entry.pattern.matches(envelope.address()) {
                continue;
            }
            // Release may land between this check and the call; the
            // handler then runs once more, never again after that.
            if entry.released.load(Ordering::Acquire) {
                continue;
            }
            (entry.handler)(envelope);
            delivered += 1;
        }

        self.delivered.fetch_add(delivered as u64, Ordering::Relaxed);
        delivered
    }
}

/// Event bus for publish-subscribe messaging.
///
/// Cloning yields another handle to the same bus. A bus is scoped to its
/// owner: one per request on the server, one per page in the browser.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        let (queue_tx, queue_rx) = unbounded();
        Self {
            inner: Arc::new(BusInner {
                subscribers: RwLock::new(Arc::new(Vec::new())),
                next_subscriber_id: AtomicU64::new(1),
                sequence: AtomicU64::new(0),
                queue_tx,
                queue_rx,
                published: AtomicU64::new(0),
                delivered: AtomicU64::new(0),
                queued: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Subscribe a handler to a pattern.
    ///
    /// The returned [`Subscription`] must be kept by its owner; dropping it
    /// releases the handler.
    pub fn subscribe<F>(&self, pattern: impl Into<Pattern>, handler: F) -> Subscription
    where
        F: Fn(&EventEnvelope) + Send + Sync + 'static,
    {
        let id = SubscriberId(self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed));
        let entry = Arc::new(SubscriberEntry {
            id,
            pattern: pattern.into(),
            handler: Box::new(handler),
            released: AtomicBool::new(false),
        });

        if self.inner.closed.load(Ordering::Acquire) {
            log::debug!("Subscribe on closed bus ignored: {}", entry.pattern);
            entry.released.store(true, Ordering::Release);
            return Subscription::new(Arc::downgrade(&self.inner), entry);
        }

        {
            let mut guard = self.inner.subscribers.write();
            let mut next = Vec::with_capacity(guard.len() + 1);
            next.extend(guard.iter().cloned());
            next.push(Arc::clone(&entry));
            *guard = Arc::new(next);
        }

        Subscription::new(Arc::downgrade(&self.inner), entry)
    }

    /// Publish anonymously. Returns the number of handlers reached.
    pub fn publish(&self, address: Address, payload: Value) -> usize {
        self.publish_as(SenderId::anonymous(), address, payload)
    }

    /// Publish with an explicit sender identity
    pub fn publish_as(&self, sender: impl Into<SenderId>, address: Address, payload: Value) -> usize {
        if self.inner.closed.load(Ordering::Acquire) {
            log::debug!("Publish on closed bus dropped: {}", address);
            return 0;
        }
        let envelope = self.envelope(sender.into(), address, payload);
        self.inner.deliver(&envelope)
    }

    /// Serialize a typed payload and publish it
    pub fn publish_serialized<T: Serialize>(
        &self,
        sender: impl Into<SenderId>,
        address: Address,
        payload: &T,
    ) -> BusResult<usize> {
        let value = serde_json::to_value(payload)?;
        Ok(self.publish_as(sender, address, value))
    }

    /// Queue an envelope for deferred delivery (opt-in extension).
    ///
    /// Safe to call from any thread holding a clone of the bus.
    pub fn enqueue(&self, sender: impl Into<SenderId>, address: Address, payload: Value) {
        if self.inner.closed.load(Ordering::Acquire) {
            return;
        }
        let envelope = self.envelope(sender.into(), address, payload);
        if self.inner.queue_tx.send(envelope).is_ok() {
            self.inner.queued.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Deliver every queued envelope in enqueue order.
    ///
    /// Envelopes enqueued by handlers during the flush are delivered in the
    /// same flush, after the ones already waiting. Returns the envelope count.
    pub fn flush(&self) -> usize {
        let mut count = 0;
        while let Ok(envelope) = self.inner.queue_rx.try_recv() {
            if self.inner.closed.load(Ordering::Acquire) {
                break;
            }
            self.inner.deliver(&envelope);
            count += 1;
        }
        count
    }

    /// Envelopes waiting for `flush`
    pub fn queue_len(&self) -> usize {
        self.inner.queue_rx.len()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    /// Get statistics
    pub fn stats(&self) -> EventBusStats {
        EventBusStats {
            published: self.inner.published.load(Ordering::Relaxed),
            delivered: self.inner.delivered.load(Ordering::Relaxed),
            queued: self.inner.queued.load(Ordering::Relaxed),
            subscribers: self.subscriber_count(),
        }
    }

    /// End the bus's scope: release every subscriber and drop queued envelopes.
    ///
    /// Later publishes and subscriptions are inert.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let entries = std::mem::take(&mut *self.inner.subscribers.write());
        for entry in entries.iter() {
            entry.released.store(true, Ordering::Release);
        }
        while self.inner.queue_rx.try_recv().is_ok() {}
        log::debug!("Event bus closed, released {} subscribers", entries.len());
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    fn envelope(&self, sender: SenderId, address: Address, payload: Value) -> EventEnvelope {
        let sequence = self.inner.sequence.fetch_add(1, Ordering::Relaxed);
        EventEnvelope::new(address, payload, sender, sequence)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("stats", &self.stats())
            .field("closed", &self.is_closed())
            .finish()
    }
}
