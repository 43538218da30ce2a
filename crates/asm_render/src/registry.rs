//! Component registry
//!
//! Registration happens through [`ComponentRegistryBuilder`] at process start.
//! [`ComponentRegistryBuilder::seal`] consumes the builder and yields an
//! immutable [`ComponentRegistry`], so request-time code can only resolve.

use std::collections::HashMap;
use std::sync::Arc;

use asm_core::{ComponentDefinition, ComponentKey};

use crate::error::RegistryError;

/// Mutable registration phase of the component registry
#[derive(Debug, Default)]
pub struct ComponentRegistryBuilder {
    definitions: HashMap<ComponentKey, Arc<ComponentDefinition>>,
    order: Vec<ComponentKey>,
}

impl ComponentRegistryBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition; the `(namespace, view)` key must be unique
    pub fn register(&mut self, definition: ComponentDefinition) -> Result<(), RegistryError> {
        if self.definitions.contains_key(&definition.key) {
            log::warn!("Duplicate component registration: {}", definition.key);
            return Err(RegistryError::DuplicateKey(definition.key));
        }

        log::debug!(
            "Registered component {} (renderer '{}')",
            definition.key,
            definition.renderer_tag
        );
        self.order.push(definition.key.clone());
        self.definitions
            .insert(definition.key.clone(), Arc::new(definition));
        Ok(())
    }

    /// Whether a key was already registered
    pub fn contains(&self, key: &ComponentKey) -> bool {
        self.definitions.contains_key(key)
    }

    /// Number of registered definitions
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Check if nothing was registered
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Close the registration phase
    pub fn seal(self) -> ComponentRegistry {
        log::info!("Component registry sealed with {} definitions", self.definitions.len());
        ComponentRegistry {
            definitions: self.definitions,
            order: self.order,
        }
    }
}

/// Sealed, read-only component registry shared by all requests
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    definitions: HashMap<ComponentKey, Arc<ComponentDefinition>>,
    order: Vec<ComponentKey>,
}

impl ComponentRegistry {
    /// Start a new registration phase
    pub fn builder() -> ComponentRegistryBuilder {
        ComponentRegistryBuilder::new()
    }

    /// Resolve a definition by namespace and view name
    pub fn resolve(&self, namespace: &str, view: &str) -> Result<Arc<ComponentDefinition>, RegistryError> {
        self.resolve_key(&ComponentKey::new(namespace, view))
    }

    /// Resolve a definition by key
    pub fn resolve_key(&self, key: &ComponentKey) -> Result<Arc<ComponentDefinition>, RegistryError> {
        self.definitions
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(key.clone()))
    }

    /// Whether a key is registered
    pub fn contains(&self, key: &ComponentKey) -> bool {
        self.definitions.contains_key(key)
    }

    /// All definitions in registration order
    pub fn definitions(&self) -> impl Iterator<Item = &Arc<ComponentDefinition>> {
        self.order.iter().filter_map(|key| self.definitions.get(key))
    }

    /// Number of definitions
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asm_core::{HydrationDirective, HydrationSpec};

    fn gallery() -> ComponentDefinition {
        ComponentDefinition::new(ComponentKey::new("shop", "gallery"), "shop/gallery.html", "html")
            .with_hydration(HydrationSpec::new(HydrationDirective::Immediate, "shop/gallery.js"))
    }

    #[test]
    fn test_resolve_returns_registered_definition() {
        let mut builder = ComponentRegistry::builder();
        builder.register(gallery()).unwrap();
        let registry = builder.seal();

        let resolved = registry.resolve("shop", "gallery").unwrap();
        assert_eq!(*resolved, gallery());
    }

    #[test]
    fn test_duplicate_key() {
        let mut builder = ComponentRegistry::builder();
        builder.register(gallery()).unwrap();

        let err = builder.register(gallery()).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateKey(key) if key == ComponentKey::new("shop", "gallery")));
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_not_found() {
        let registry = ComponentRegistry::builder().seal();
        assert!(matches!(
            registry.resolve("shop", "missing"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_definitions_in_registration_order() {
        let mut builder = ComponentRegistry::builder();
        for view in ["zeta", "alpha", "mid"] {
            builder
                .register(ComponentDefinition::new(ComponentKey::new("ui", view), view, "html"))
                .unwrap();
        }
        let registry = builder.seal();
        let views: Vec<_> = registry.definitions().map(|d| d.view_name().to_string()).collect();
        assert_eq!(views, vec!["zeta", "alpha", "mid"]);
    }
}
