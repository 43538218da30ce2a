//! # asm_services
//!
//! The service container handed to every render context.
//!
//! Services are data-access collaborators (catalog clients, session stores,
//! ...) that factories look up by name. The container does not care what a
//! service does; it only owns lifecycle and lookup.
//!
//! ## Usage
//!
//! ```ignore
//! let mut registry = ServiceRegistry::new();
//! registry.register(Box::new(CatalogService::new("catalog")))?;
//! registry.start_all()?;
//!
//! // Frozen for request time
//! let services = Arc::new(registry);
//! let catalog = services.require_typed::<CatalogService>("catalog")?;
//! ```

pub mod registry;
pub mod service;

pub use registry::ServiceRegistry;
pub use service::{Service, ServiceConfig, ServiceError, ServiceHealth, ServiceId, ServiceResult, ServiceState};
