//! Addresses and subscription patterns

use std::fmt;

use serde::{Deserialize, Serialize};

/// `(channel, topic)` routing address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    channel: String,
    topic: String,
}

impl Address {
    /// Create a new address
    pub fn new(channel: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            topic: topic.into(),
        }
    }

    /// Channel part
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Topic part
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel, self.topic)
    }
}

/// What a subscriber listens to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// One exact `(channel, topic)` address
    Exact(Address),
    /// Every topic within a channel
    Channel(String),
}

impl Pattern {
    /// Exact address pattern
    pub fn exact(channel: impl Into<String>, topic: impl Into<String>) -> Self {
        Self::Exact(Address::new(channel, topic))
    }

    /// Wildcard-topic pattern over a channel
    pub fn channel(channel: impl Into<String>) -> Self {
        Self::Channel(channel.into())
    }

    /// Check whether an address is covered by this pattern
    pub fn matches(&self, address: &Address) -> bool {
        match self {
            Self::Exact(exact) => exact == address,
            Self::Channel(channel) => channel == address.channel(),
        }
    }
}

impl From<Address> for Pattern {
    fn from(address: Address) -> Self {
        Self::Exact(address)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(address) => write!(f, "{}", address),
            Self::Channel(channel) => write!(f, "{}:*", channel),
        }
    }
}
