//! Client modules and island instances
//!
//! A module is the code behind a marker's module reference; it builds one
//! [`Island`] per activated marker. An island is anything implementing
//! `mount`/`destroy`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use asm_bus::{Address, EventBus, EventEnvelope, Pattern, SubscriptionSet};
use asm_core::HydrationId;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::BoxError;

/// A hydrated component instance
pub trait Island {
    /// Attach behavior; called once after construction
    fn mount(&mut self, ctx: &mut IslandContext) -> Result<(), BoxError>;

    /// Detach behavior; called at most once, only after a successful mount
    fn destroy(&mut self, ctx: &mut IslandContext);
}

/// Loaded client code for one module reference
pub trait ClientModule {
    /// Build a fresh instance for an island
    fn instantiate(&self) -> Box<dyn Island>;
}

/// Resolves module references to loaded modules
pub trait ModuleLoader {
    /// Load a module; called at most once per reference by the runtime
    fn load(&mut self, module: &str) -> Result<Arc<dyn ClientModule>, BoxError>;
}

/// Module loader backed by a fixed table
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn ClientModule>>,
}

impl ModuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under a reference
    pub fn register(&mut self, module: impl Into<String>, code: Arc<dyn ClientModule>) {
        self.modules.insert(module.into(), code);
    }

    /// Builder-style register
    pub fn with(mut self, module: impl Into<String>, code: Arc<dyn ClientModule>) -> Self {
        self.register(module, code);
        self
    }

    /// Whether a reference is known
    pub fn contains(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }
}

impl ModuleLoader for ModuleRegistry {
    fn load(&mut self, module: &str) -> Result<Arc<dyn ClientModule>, BoxError> {
        self.modules
            .get(module)
            .cloned()
            .ok_or_else(|| format!("unknown module '{}'", module).into())
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.modules.keys().collect();
        names.sort();
        f.debug_struct("ModuleRegistry").field("modules", &names).finish()
    }
}

/// What an island instance sees of its page
pub struct IslandContext {
    id: HydrationId,
    module: String,
    props: Value,
    markup: String,
    bus: EventBus,
    subscriptions: SubscriptionSet,
}

impl IslandContext {
    pub(crate) fn new(id: HydrationId, module: String, props: Value, markup: String, bus: EventBus) -> Self {
        Self {
            id,
            module,
            props,
            markup,
            bus,
            subscriptions: SubscriptionSet::new(),
        }
    }

    /// Island id
    pub fn id(&self) -> HydrationId {
        self.id
    }

    /// Module reference the island was loaded from
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Server snapshot, as initial state
    pub fn props(&self) -> &Value {
        &self.props
    }

    /// Deserialize the snapshot into a typed state
    pub fn props_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.props.clone())
    }

    /// Server-rendered markup of the island's subtree
    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// Page bus
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Subscribe on the page bus. The subscription is owned by this island
    /// and released when it is destroyed.
    pub fn subscribe<F>(&mut self, pattern: impl Into<Pattern>, handler: F)
    where
        F: Fn(&EventEnvelope) + Send + Sync + 'static,
    {
        let subscription = self.bus.subscribe(pattern, handler);
        self.subscriptions.add(subscription);
    }

    /// Publish on the page bus with this island as sender
    pub fn publish(&self, address: Address, payload: Value) -> usize {
        self.bus.publish_as(self.id.to_string(), address, payload)
    }

    /// Number of live subscriptions owned by the island
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub(crate) fn release_subscriptions(&mut self) {
        if !self.subscriptions.is_empty() {
            log::debug!("Releasing {} subscriptions of {}", self.subscriptions.len(), self.id);
        }
        self.subscriptions.release_all();
    }
}

impl fmt::Debug for IslandContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IslandContext")
            .field("id", &self.id)
            .field("module", &self.module)
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    struct Noop;

    impl Island for Noop {
        fn mount(&mut self, _ctx: &mut IslandContext) -> Result<(), BoxError> {
            Ok(())
        }

        fn destroy(&mut self, _ctx: &mut IslandContext) {}
    }

    struct NoopModule;

    impl ClientModule for NoopModule {
        fn instantiate(&self) -> Box<dyn Island> {
            Box::new(Noop)
        }
    }

    #[test]
    fn test_registry_loader() {
        let mut registry = ModuleRegistry::new().with("ui/noop.js", Arc::new(NoopModule));
        assert!(registry.load("ui/noop.js").is_ok());
        let err = registry.load("ui/missing.js").err().unwrap();
        assert_eq!(err.to_string(), "unknown module 'ui/missing.js'");
    }

    #[test]
    fn test_typed_props_and_owned_subscriptions() {
        #[derive(Deserialize)]
        struct CartState {
            count: u32,
        }

        let bus = EventBus::new();
        let mut ctx = IslandContext::new(
            HydrationId::new(3),
            "shop/cart.js".into(),
            json!({"count": 2}),
            "<span>2</span>".into(),
            bus.clone(),
        );
        assert_eq!(ctx.props_as::<CartState>().unwrap().count, 2);

        ctx.subscribe(Pattern::channel("cart"), |_| {});
        assert_eq!(ctx.subscription_count(), 1);
        assert_eq!(bus.subscriber_count(), 1);

        ctx.release_subscriptions();
        assert_eq!(bus.subscriber_count(), 0);
    }
}
