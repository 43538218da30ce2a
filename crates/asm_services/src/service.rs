//! Service capability and lifecycle types
//!
//! A service is anything resolvable by name from the container. There is no
//! base class: implement [`Service`] on whatever type holds the client.

use std::any::Any;
use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name factories look a service up by
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId(String);

impl ServiceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ServiceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ServiceId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Lifecycle state reported by a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Stopped,
    Running,
    /// Serving, with reduced capability (stale cache, slow upstream)
    Degraded,
    Failed,
}

impl ServiceState {
    /// Whether factories may call the service
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Running | Self::Degraded)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Health report of one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub state: ServiceState,
    /// Reason for a degraded or failed state
    pub detail: Option<String>,
}

impl ServiceHealth {
    pub fn ok() -> Self {
        Self {
            state: ServiceState::Running,
            detail: None,
        }
    }

    pub fn degraded(detail: impl Into<String>) -> Self {
        Self {
            state: ServiceState::Degraded,
            detail: Some(detail.into()),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            state: ServiceState::Failed,
            detail: Some(detail.into()),
        }
    }

    pub fn stopped() -> Self {
        Self {
            state: ServiceState::Stopped,
            detail: None,
        }
    }

    /// Whether requests can still be served
    pub fn is_serving(&self) -> bool {
        self.state.is_available()
    }
}

impl From<ServiceState> for ServiceHealth {
    fn from(state: ServiceState) -> Self {
        Self { state, detail: None }
    }
}

/// Service container errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service not found: {0}")]
    NotFound(String),

    #[error("Service already registered: {0}")]
    AlreadyExists(String),

    #[error("Service '{name}' is not a {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    #[error("Service '{name}' is {state}")]
    Unavailable { name: String, state: ServiceState },

    #[error("Service start failed: {0}")]
    StartFailed(String),

    #[error("Service stop failed: {0}")]
    StopFailed(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Registration settings of a service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub id: ServiceId,
    /// A required service that fails to start aborts `start_all`;
    /// an optional one is logged and left failed.
    pub required: bool,
}

impl ServiceConfig {
    /// Required service
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: ServiceId::new(id),
            required: true,
        }
    }

    /// Optional service; pages render without it
    pub fn optional(id: impl Into<String>) -> Self {
        Self {
            id: ServiceId::new(id),
            required: false,
        }
    }
}

/// Capability every container entry implements
pub trait Service: Send + Sync {
    fn config(&self) -> &ServiceConfig;

    fn id(&self) -> &ServiceId {
        &self.config().id
    }

    fn state(&self) -> ServiceState;

    /// Health report; the default carries the state only
    fn health(&self) -> ServiceHealth {
        self.state().into()
    }

    fn start(&mut self) -> ServiceResult<()>;

    fn stop(&mut self) -> ServiceResult<()>;

    /// For typed lookup through the container
    fn as_any(&self) -> &dyn Any;
}
