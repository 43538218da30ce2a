//! Error taxonomy of a render pass
//!
//! Configuration-class errors (duplicate keys, cycles, unknown renderers)
//! are surfaced at build time where possible and never retried. Data-class
//! errors are per request.

use std::fmt;

use asm_core::{ComponentKey, CoreError, HydrationId};
use asm_services::ServiceError;
use thiserror::Error;

use crate::factory::FactoryTarget;

/// Boxed cause carried by factory and renderer failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Component and renderer registration errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Component already registered: {0}")]
    DuplicateKey(ComponentKey),

    #[error("Component not found: {0}")]
    NotFound(ComponentKey),

    #[error("Renderer already registered for tag '{0}'")]
    DuplicateRenderer(String),
}

/// A component transitively includes itself
#[derive(Debug)]
pub struct CompositionCycleError {
    /// Keys along the cycle; the first key is repeated at the end
    pub cycle: Vec<ComponentKey>,
}

impl CompositionCycleError {
    /// Whether a key takes part in the cycle
    pub fn involves(&self, key: &ComponentKey) -> bool {
        self.cycle.contains(key)
    }
}

impl fmt::Display for CompositionCycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Composition cycle: ")?;
        for (i, key) in self.cycle.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompositionCycleError {}

/// A factory unit failed; remaining units for the target were abandoned
#[derive(Debug, Error)]
#[error("Factory '{unit}' bound to {target} failed: {cause}")]
pub struct DataPreparationError {
    /// Name of the failing unit
    pub unit: String,
    /// Binding the unit was scheduled against
    pub target: FactoryTarget,
    /// Underlying cause
    #[source]
    pub cause: BoxError,
}

/// Template loading and rendering errors
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Invalid template reference: {0}")]
    InvalidRef(String),

    #[error("Syntax error in template {template}: {message}")]
    Syntax { template: String, message: String },

    #[error("Template {template} references {expected} components but {found} child renders were supplied")]
    ChildCountMismatch {
        template: String,
        expected: usize,
        found: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Renderer failure: {0}")]
    Renderer(BoxError),
}

/// Hydration marker emission errors
#[derive(Debug, Error)]
pub enum HydrationError {
    #[error("Failed to serialize props for {id}: {source}")]
    Serialization {
        id: HydrationId,
        #[source]
        source: serde_json::Error,
    },

    #[error("Hydration id emitted twice: {0}")]
    DuplicateId(HydrationId),
}

/// Top-level error of a render pass
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Cycle(#[from] CompositionCycleError),

    #[error("Composition depth {depth} exceeds limit {limit} at {key}")]
    DepthExceeded {
        key: ComponentKey,
        depth: usize,
        limit: usize,
    },

    #[error(transparent)]
    DataPreparation(#[from] DataPreparationError),

    #[error("No renderer registered for tag '{0}'")]
    UnknownRenderer(String),

    #[error("Template error in {key}: {source}")]
    Template {
        key: ComponentKey,
        #[source]
        source: TemplateError,
    },

    #[error(transparent)]
    Hydration(#[from] HydrationError),

    #[error("No route matches path: {0}")]
    RouteNotFound(String),

    #[error("Invalid route pattern: {0}")]
    InvalidRoute(String),

    #[error(transparent)]
    InvalidKey(#[from] CoreError),

    #[error("Service startup failed: {0}")]
    Service(#[from] ServiceError),

    #[error("Render aborted")]
    Aborted,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RenderError {
    /// HTTP-equivalent status for the caller
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Registry(RegistryError::NotFound(_)) | Self::RouteNotFound(_) => 404,
            _ => 500,
        }
    }

    /// Configuration bugs: never retried, fail fast at build time
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Registry(RegistryError::DuplicateKey(_))
                | Self::Registry(RegistryError::DuplicateRenderer(_))
                | Self::Cycle(_)
                | Self::DepthExceeded { .. }
                | Self::UnknownRenderer(_)
                | Self::InvalidRoute(_)
                | Self::InvalidKey(_)
        )
    }
}

pub type RenderResult<T> = Result<T, RenderError>;
