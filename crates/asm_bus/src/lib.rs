//! # asm_bus - Cross-Boundary Event Bus
//!
//! Publish-subscribe messaging between independently hydrated islands, and
//! between factories of the same request on the server.
//!
//! ## Delivery contract
//!
//! - `publish` delivers synchronously, in subscription-registration order,
//!   to a snapshot of the subscribers taken when the publish starts.
//!   Subscribers added during delivery miss the in-flight envelope.
//! - A [`Subscription`] is owned by exactly one component instance. Releasing
//!   it is idempotent, and no delivery starts once release has begun. A
//!   delivery already running on another thread is not waited for.
//! - Queued delivery (`enqueue` + `flush`) is an opt-in extension; the
//!   synchronous path is the default.
//!
//! ## Usage
//!
//! ```ignore
//! let bus = EventBus::new();
//!
//! let sub = bus.subscribe(Pattern::channel("cart"), |envelope| {
//!     log::info!("cart event {}", envelope.address());
//! });
//!
//! bus.publish(Address::new("cart", "add"), serde_json::json!({ "sku": "A-1" }));
//! sub.release();
//! ```

pub mod address;
pub mod bus;
pub mod envelope;
pub mod subscription;

pub use address::{Address, Pattern};
pub use bus::{EventBus, EventBusStats};
pub use envelope::{EventEnvelope, SenderId};
pub use subscription::{Subscription, SubscriptionSet};

use thiserror::Error;

/// Event bus errors
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type BusResult<T> = Result<T, BusError>;
