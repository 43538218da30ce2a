//! Renderer plugins and dispatch
//!
//! A renderer owns one template syntax, identified by its tag. The engine
//! treats it as a black box with two capabilities: list the component
//! references a template embeds, and turn a template plus data into markup.

pub mod dispatch;
pub mod template;

pub use dispatch::RenderDispatcher;
pub use template::{DirTemplates, MemoryTemplates, PlaceholderRenderer, TemplateStore};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use asm_core::{ComponentKey, HydrationId};
use serde_json::{Map, Value};

use crate::error::{RegistryError, TemplateError};

/// Everything a renderer receives for one node
#[derive(Debug)]
pub struct RenderInput<'a> {
    /// Component being rendered
    pub key: &'a ComponentKey,
    /// Template reference from the component definition
    pub template_ref: &'a str,
    /// Request data merged with the per-node `asm` entry
    pub data: &'a Map<String, Value>,
    /// Child markup, in the order `references` returned the children
    pub children: &'a [String],
    /// Nesting depth of the node (root is 0)
    pub depth: usize,
    /// Hydration id of the node
    pub hydration_id: HydrationId,
}

/// A template-engine plugin
#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    /// Tag components use to select this renderer
    fn tag(&self) -> &str;

    /// Component references embedded in a template, in embedding order
    fn references(&self, template_ref: &str) -> Result<Vec<ComponentKey>, TemplateError>;

    /// Produce markup for one node
    async fn render(&self, input: &RenderInput<'_>) -> Result<String, TemplateError>;
}

/// Renderer for leaf templates backed by a plain function.
///
/// Useful for wrapping an external engine whose templates embed no components.
pub struct FnRenderer<F> {
    tag: String,
    func: F,
}

impl<F> FnRenderer<F>
where
    F: Fn(&RenderInput<'_>) -> Result<String, TemplateError> + Send + Sync,
{
    /// Create a renderer for `tag`
    pub fn new(tag: impl Into<String>, func: F) -> Self {
        Self {
            tag: tag.into(),
            func,
        }
    }
}

#[async_trait::async_trait]
impl<F> Renderer for FnRenderer<F>
where
    F: Fn(&RenderInput<'_>) -> Result<String, TemplateError> + Send + Sync,
{
    fn tag(&self) -> &str {
        &self.tag
    }

    fn references(&self, _template_ref: &str) -> Result<Vec<ComponentKey>, TemplateError> {
        Ok(Vec::new())
    }

    async fn render(&self, input: &RenderInput<'_>) -> Result<String, TemplateError> {
        (self.func)(input)
    }
}

/// Renderers by tag
#[derive(Default)]
pub struct RendererRegistry {
    renderers: HashMap<String, Arc<dyn Renderer>>,
}

impl RendererRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a renderer under its own tag
    pub fn register(&mut self, renderer: Arc<dyn Renderer>) -> Result<(), RegistryError> {
        let tag = renderer.tag().to_string();
        if self.renderers.contains_key(&tag) {
            return Err(RegistryError::DuplicateRenderer(tag));
        }
        log::debug!("Registered renderer '{}'", tag);
        self.renderers.insert(tag, renderer);
        Ok(())
    }

    /// Renderer for a tag
    pub fn get(&self, tag: &str) -> Option<Arc<dyn Renderer>> {
        self.renderers.get(tag).cloned()
    }

    /// Whether a tag is registered
    pub fn contains(&self, tag: &str) -> bool {
        self.renderers.contains_key(tag)
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<_> = self.renderers.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Number of renderers
    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

impl fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upper() -> Arc<dyn Renderer> {
        Arc::new(FnRenderer::new("upper", |input: &RenderInput<'_>| {
            Ok(input.template_ref.to_uppercase())
        }))
    }

    #[test]
    fn test_duplicate_renderer() {
        let mut registry = RendererRegistry::new();
        registry.register(upper()).unwrap();
        assert!(matches!(
            registry.register(upper()),
            Err(RegistryError::DuplicateRenderer(tag)) if tag == "upper"
        ));
        assert_eq!(registry.tags(), vec!["upper"]);
    }

    #[tokio::test]
    async fn test_fn_renderer() {
        let renderer = upper();
        let key = ComponentKey::new("ui", "badge");
        let data = Map::new();
        let input = RenderInput {
            key: &key,
            template_ref: "sale",
            data: &data,
            children: &[],
            depth: 0,
            hydration_id: HydrationId::new(0),
        };
        assert_eq!(renderer.render(&input).await.unwrap(), "SALE");
        assert!(renderer.references("sale").unwrap().is_empty());
    }
}
