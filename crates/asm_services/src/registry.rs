//! Service registry
//!
//! Built and started at process start, then frozen behind an `Arc` and shared
//! read-only by every request.

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;

use crate::service::{Service, ServiceError, ServiceHealth, ServiceId, ServiceResult, ServiceState};

/// The container factories resolve services from
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<ServiceId, Box<dyn Service>>,
    /// Registration order; start walks it forward, stop backward
    order: Vec<ServiceId>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service under its configured id
    pub fn register(&mut self, service: Box<dyn Service>) -> ServiceResult<()> {
        let id = service.id().clone();
        if self.services.contains_key(&id) {
            log::warn!("Service {} registered twice", id);
            return Err(ServiceError::AlreadyExists(id.to_string()));
        }
        log::debug!("Registered service {}", id);
        self.order.push(id.clone());
        self.services.insert(id, service);
        Ok(())
    }

    /// Look up a service by name
    pub fn get(&self, name: &str) -> Option<&dyn Service> {
        self.services.get(name).map(|s| s.as_ref())
    }

    /// Typed lookup, regardless of state
    pub fn get_typed<T: Service + 'static>(&self, name: &str) -> Option<&T> {
        self.get(name).and_then(|s| s.as_any().downcast_ref::<T>())
    }

    /// Typed lookup of a service that can serve requests right now
    pub fn require_typed<T: Service + 'static>(&self, name: &str) -> ServiceResult<&T> {
        let service = self
            .get(name)
            .ok_or_else(|| ServiceError::NotFound(name.to_string()))?;

        let state = service.state();
        if !state.is_available() {
            return Err(ServiceError::Unavailable {
                name: name.to_string(),
                state,
            });
        }

        service
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| ServiceError::TypeMismatch {
                name: name.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Start stopped services in registration order.
    ///
    /// A required service that fails aborts startup; an optional one is
    /// logged and skipped.
    pub fn start_all(&mut self) -> ServiceResult<()> {
        for id in &self.order {
            let Some(service) = self.services.get_mut(id) else {
                continue;
            };
            if service.state() != ServiceState::Stopped {
                continue;
            }

            match service.start() {
                Ok(()) => log::info!("Started service: {}", id),
                Err(e) if service.config().required => {
                    log::error!("Required service {} failed to start: {}", id, e);
                    return Err(e);
                }
                Err(e) => log::warn!("Optional service {} failed to start: {}", id, e),
            }
        }
        Ok(())
    }

    /// Stop available services in reverse registration order.
    ///
    /// Stop failures are logged; every service still gets its stop call.
    pub fn stop_all(&mut self) -> ServiceResult<()> {
        for id in self.order.iter().rev() {
            let Some(service) = self.services.get_mut(id) else {
                continue;
            };
            if !service.state().is_available() {
                continue;
            }
            match service.stop() {
                Ok(()) => log::info!("Stopped service: {}", id),
                Err(e) => log::warn!("Failed to stop service {}: {}", id, e),
            }
        }
        Ok(())
    }

    /// Health of every service
    pub fn health_all(&self) -> HashMap<ServiceId, ServiceHealth> {
        self.services
            .iter()
            .map(|(id, service)| (id.clone(), service.health()))
            .collect()
    }

    /// Ids in registration order
    pub fn service_ids(&self) -> &[ServiceId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.order)
            .finish()
    }
}
