//! Per-request render context
//!
//! A [`RenderContext`] is created for one request and dropped once the
//! response is produced. It is never shared across requests; the data store
//! uses interior mutability only so that equal-priority factories may write
//! concurrently within the same request.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use asm_bus::EventBus;
use asm_core::{DeviceClass, HydrationIdGenerator};
use asm_services::{Service, ServiceRegistry};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Unique identifier of one render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a fresh id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID (e.g. forwarded from an upstream proxy)
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the caller knows about the incoming request
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    /// Request path (used by routing)
    pub path: String,
    /// Route params; filled by the router when rendering by path
    pub params: BTreeMap<String, String>,
    /// Raw `User-Agent` header
    pub user_agent: Option<String>,
}

impl RequestInfo {
    /// Create request info for a path
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Add a route param
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Classify the requesting device
    pub fn device(&self) -> DeviceClass {
        DeviceClass::from_user_agent(self.user_agent.as_deref())
    }
}

/// Request-scoped key/value store written by factories and read by renderers.
///
/// Last write wins.
#[derive(Debug, Default)]
pub struct DataStore {
    values: RwLock<HashMap<String, Value>>,
}

impl DataStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    /// Read and deserialize a value
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| serde_json::from_value(v).ok())
    }

    /// Write a value
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.values.write().insert(key.into(), value);
    }

    /// Serialize and write a value
    pub fn set_serialized<T: Serialize>(&self, key: impl Into<String>, value: &T) -> serde_json::Result<()> {
        let value = serde_json::to_value(value)?;
        self.set(key, value);
        Ok(())
    }

    /// Whether a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    /// Remove a value
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.values.write().remove(key)
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Copy of every entry as a JSON object
    pub fn snapshot(&self) -> Map<String, Value> {
        self.values
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Copy of the listed keys; missing keys are omitted
    pub fn select<S: AsRef<str>>(&self, keys: &[S]) -> Map<String, Value> {
        let values = self.values.read();
        keys.iter()
            .filter_map(|k| {
                let k = k.as_ref();
                values.get(k).map(|v| (k.to_string(), v.clone()))
            })
            .collect()
    }
}

/// Everything a factory or renderer may see about the current request
pub struct RenderContext {
    request_id: RequestId,
    request: RequestInfo,
    device: DeviceClass,
    data: DataStore,
    services: Arc<ServiceRegistry>,
    bus: EventBus,
    ids: HydrationIdGenerator,
}

impl RenderContext {
    /// Create a context for one request
    pub fn new(request: RequestInfo, services: Arc<ServiceRegistry>) -> Self {
        let device = request.device();
        Self {
            request_id: RequestId::new(),
            request,
            device,
            data: DataStore::new(),
            services,
            bus: EventBus::new(),
            ids: HydrationIdGenerator::new(),
        }
    }

    /// Context with no services, mostly for tests and build-time validation
    pub fn detached(request: RequestInfo) -> Self {
        Self::new(request, Arc::new(ServiceRegistry::new()))
    }

    /// Request id
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Request info
    pub fn request(&self) -> &RequestInfo {
        &self.request
    }

    /// Route params
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.request.params
    }

    /// A single route param
    pub fn param(&self, key: &str) -> Option<&str> {
        self.request.params.get(key).map(String::as_str)
    }

    /// Device classification
    pub fn device(&self) -> DeviceClass {
        self.device
    }

    /// Request data store
    pub fn data(&self) -> &DataStore {
        &self.data
    }

    /// Service container
    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    /// Look up a service by name
    pub fn service(&self, name: &str) -> Option<&dyn Service> {
        self.services.get(name)
    }

    /// Look up a typed service by name
    pub fn service_typed<T: Service + 'static>(&self, name: &str) -> Option<&T> {
        self.services.get_typed::<T>(name)
    }

    /// Request-scoped event bus
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Hydration id generator for this render pass
    pub fn ids(&self) -> &HydrationIdGenerator {
        &self.ids
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        // Bus state must not outlive the request.
        self.bus.close();
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("request_id", &self.request_id)
            .field("path", &self.request.path)
            .field("device", &self.device)
            .field("data_keys", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_store_last_write_wins() {
        let store = DataStore::new();
        store.set("title", json!("first"));
        store.set("title", json!("second"));
        assert_eq!(store.get("title"), Some(json!("second")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_select_omits_missing() {
        let store = DataStore::new();
        store.set("a", json!(1));
        store.set("b", json!({"nested": [1, 2]}));

        let selected = store.select(&["b", "missing"]);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected["b"], json!({"nested": [1, 2]}));
    }

    #[test]
    fn test_typed_round_trip() {
        #[derive(Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Price {
            cents: u64,
            currency: String,
        }

        let store = DataStore::new();
        let price = Price {
            cents: 1999,
            currency: "EUR".into(),
        };
        store.set_serialized("price", &price).unwrap();
        assert_eq!(store.get_as::<Price>("price"), Some(price));
        assert_eq!(store.get_as::<Price>("absent"), None);
    }

    #[test]
    fn test_context_device_and_params() {
        let request = RequestInfo::new("/product/42")
            .with_param("id", "42")
            .with_user_agent("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile");
        let ctx = RenderContext::detached(request);

        assert_eq!(ctx.device(), DeviceClass::Mobile);
        assert_eq!(ctx.param("id"), Some("42"));
        assert!(ctx.service("catalog").is_none());
    }

    #[test]
    fn test_bus_closed_on_drop() {
        let ctx = RenderContext::detached(RequestInfo::new("/"));
        let bus = ctx.bus().clone();
        assert!(!bus.is_closed());
        drop(ctx);
        assert!(bus.is_closed());
    }
}
