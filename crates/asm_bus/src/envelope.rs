//! Event envelopes

use std::fmt;
use std::time::SystemTime;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::address::Address;
use crate::BusResult;

/// Identity of the publisher (island hydration id, factory name, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SenderId(String);

impl SenderId {
    /// Create a sender id
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Sender used when the publisher does not identify itself
    pub fn anonymous() -> Self {
        Self(String::from("anonymous"))
    }

    /// Get the sender name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SenderId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SenderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A published message. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    address: Address,
    payload: Value,
    sender: SenderId,
    /// Milliseconds since the Unix epoch
    timestamp: u64,
    /// Bus-local publish order
    sequence: u64,
}

impl EventEnvelope {
    pub(crate) fn new(address: Address, payload: Value, sender: SenderId, sequence: u64) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        Self {
            address,
            payload,
            sender,
            timestamp,
            sequence,
        }
    }

    /// Routing address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Channel part of the address
    pub fn channel(&self) -> &str {
        self.address.channel()
    }

    /// Topic part of the address
    pub fn topic(&self) -> &str {
        self.address.topic()
    }

    /// Raw payload
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Deserialize the payload into a typed value
    pub fn payload_as<T: DeserializeOwned>(&self) -> BusResult<T> {
        Ok(T::deserialize(&self.payload)?)
    }

    /// Publisher identity
    pub fn sender(&self) -> &SenderId {
        &self.sender
    }

    /// Publish time, milliseconds since the Unix epoch
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Position in the bus's publish order
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BusError;
    use serde_json::json;

    #[derive(Debug, PartialEq, Deserialize)]
    struct CartAdd {
        sku: String,
        qty: u32,
    }

    #[test]
    fn test_typed_payload() {
        let envelope = EventEnvelope::new(
            Address::new("cart", "add"),
            json!({ "sku": "A-1", "qty": 2 }),
            SenderId::new("h3"),
            7,
        );

        let add: CartAdd = envelope.payload_as().unwrap();
        assert_eq!(add, CartAdd { sku: "A-1".into(), qty: 2 });
        assert_eq!(envelope.channel(), "cart");
        assert_eq!(envelope.topic(), "add");
        assert_eq!(envelope.sender().as_str(), "h3");
        assert_eq!(envelope.sequence(), 7);
        assert!(envelope.timestamp() > 0);
    }

    #[test]
    fn test_typed_payload_mismatch() {
        let envelope = EventEnvelope::new(Address::new("cart", "add"), json!("nope"), SenderId::anonymous(), 0);
        assert!(matches!(envelope.payload_as::<CartAdd>(), Err(BusError::Serialization(_))));
    }
}
