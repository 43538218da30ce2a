//! Renderer dispatch
//!
//! Renders a composition tree bottom-up. A node's render call starts only
//! after every child has produced markup, since parents embed child markup
//! by value. Sibling subtrees share no mutable state and render concurrently.

use futures_util::future::{try_join_all, BoxFuture};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use super::{RenderInput, RendererRegistry};
use crate::context::RenderContext;
use crate::error::{RenderError, RenderResult};
use crate::hydration::{HydrationRecord, HydrationResolver};
use crate::tree::RenderNode;

/// Reserved template data key holding per-node engine values
pub const ENGINE_DATA_KEY: &str = "asm";

/// Drives renderers over a composition tree
pub struct RenderDispatcher<'a> {
    renderers: &'a RendererRegistry,
    resolver: &'a HydrationResolver,
}

impl<'a> RenderDispatcher<'a> {
    /// Create a dispatcher
    pub fn new(renderers: &'a RendererRegistry, resolver: &'a HydrationResolver) -> Self {
        Self { renderers, resolver }
    }

    /// Render every node of the tree.
    ///
    /// On success each node's `resolved_markup` is set and the root's markup
    /// is the page. Returns the hydration records sorted by id.
    pub async fn render_tree(&self, root: &mut RenderNode, ctx: &RenderContext) -> RenderResult<Vec<HydrationRecord>> {
        let base = ctx.data().snapshot();
        let records = Mutex::new(Vec::new());

        self.render_node(root, ctx, &base, &records).await?;

        let mut records = records.into_inner();
        records.sort_by_key(|r| r.hydration_id);
        HydrationResolver::validate(&records)?;
        Ok(records)
    }

    /// Render one node whose children already carry markup.
    ///
    /// Returns the markup with hydration markers applied and the record, if any.
    pub async fn render(
        &self,
        node: &RenderNode,
        ctx: &RenderContext,
    ) -> RenderResult<(String, Option<HydrationRecord>)> {
        let base = ctx.data().snapshot();
        self.render_single(node, ctx, &base).await
    }

    fn render_node<'n>(
        &'n self,
        node: &'n mut RenderNode,
        ctx: &'n RenderContext,
        base: &'n Map<String, Value>,
        records: &'n Mutex<Vec<HydrationRecord>>,
    ) -> BoxFuture<'n, RenderResult<()>> {
        Box::pin(async move {
            try_join_all(
                node.children
                    .iter_mut()
                    .map(|child| self.render_node(child, ctx, base, records)),
            )
            .await?;

            let (markup, record) = self.render_single(node, ctx, base).await?;
            if let Some(record) = record {
                records.lock().push(record);
            }
            node.resolved_markup = Some(markup);
            Ok(())
        })
    }

    async fn render_single(
        &self,
        node: &RenderNode,
        ctx: &RenderContext,
        base: &Map<String, Value>,
    ) -> RenderResult<(String, Option<HydrationRecord>)> {
        let component = &node.component;
        let renderer = self
            .renderers
            .get(&component.renderer_tag)
            .ok_or_else(|| RenderError::UnknownRenderer(component.renderer_tag.clone()))?;

        let children = node
            .children
            .iter()
            .map(|child| {
                child.resolved_markup.clone().ok_or_else(|| {
                    RenderError::Internal(format!(
                        "{} rendered before its child {}",
                        node.key(),
                        child.key()
                    ))
                })
            })
            .collect::<RenderResult<Vec<_>>>()?;

        let mut data = base.clone();
        data.insert(
            ENGINE_DATA_KEY.to_string(),
            json!({
                "device": ctx.device().as_str(),
                "depth": node.depth,
                "id": node.hydration_id.to_string(),
                "params": ctx.params(),
            }),
        );

        log::debug!(
            "[{}] rendering {} with '{}' at depth {}",
            ctx.request_id(),
            node.key(),
            component.renderer_tag,
            node.depth
        );

        let input = RenderInput {
            key: node.key(),
            template_ref: &component.template_ref,
            data: &data,
            children: &children,
            depth: node.depth,
            hydration_id: node.hydration_id,
        };
        let markup = renderer
            .render(&input)
            .await
            .map_err(|source| RenderError::Template {
                key: node.key().clone(),
                source,
            })?;

        Ok(self.resolver.resolve(node, markup, ctx.data())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestInfo;
    use crate::error::TemplateError;
    use crate::registry::ComponentRegistryBuilder;
    use crate::renderer::{FnRenderer, MemoryTemplates, PlaceholderRenderer};
    use crate::tree::CompositionBuilder;
    use asm_core::{ComponentDefinition, ComponentKey, HydrationIdGenerator};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_engine_data_exposed() {
        let store = MemoryTemplates::new().with("page", "{{ asm.device }}/{{ asm.depth }}/{{ asm.id }}/{{ asm.params.sku }}");
        let mut renderers = RendererRegistry::new();
        renderers.register(Arc::new(PlaceholderRenderer::new(Arc::new(store)))).unwrap();
        let mut builder = ComponentRegistryBuilder::new();
        builder
            .register(ComponentDefinition::new(ComponentKey::new("t", "page"), "page", "html"))
            .unwrap();
        let registry = builder.seal();

        let ctx = RenderContext::detached(RequestInfo::new("/").with_param("sku", "42"));
        let mut tree = CompositionBuilder::new(&registry, &renderers, 8)
            .build(&ComponentKey::new("t", "page"), ctx.ids())
            .unwrap();
        let resolver = HydrationResolver::new();
        let records = RenderDispatcher::new(&renderers, &resolver)
            .render_tree(&mut tree, &ctx)
            .await
            .unwrap();

        assert!(records.is_empty());
        assert_eq!(tree.resolved_markup.as_deref(), Some("desktop/0/h0/42"));
    }

    #[tokio::test]
    async fn test_render_rejects_unrendered_children() {
        let store = MemoryTemplates::new()
            .with("page", "<asm-component ref=\"t:leaf\" />")
            .with("leaf", "leaf");
        let mut renderers = RendererRegistry::new();
        renderers.register(Arc::new(PlaceholderRenderer::new(Arc::new(store)))).unwrap();
        let mut builder = ComponentRegistryBuilder::new();
        for view in ["page", "leaf"] {
            builder
                .register(ComponentDefinition::new(ComponentKey::new("t", view), view, "html"))
                .unwrap();
        }
        let registry = builder.seal();

        let ids = HydrationIdGenerator::new();
        let tree = CompositionBuilder::new(&registry, &renderers, 8)
            .build(&ComponentKey::new("t", "page"), &ids)
            .unwrap();
        let resolver = HydrationResolver::new();
        let ctx = RenderContext::detached(RequestInfo::new("/"));

        let err = RenderDispatcher::new(&renderers, &resolver)
            .render(&tree, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Internal(_)));
    }

    #[tokio::test]
    async fn test_renderer_failure_names_component() {
        let mut renderers = RendererRegistry::new();
        renderers
            .register(Arc::new(FnRenderer::new("broken", |_: &RenderInput<'_>| {
                Err(TemplateError::NotFound("gone".into()))
            })))
            .unwrap();
        let mut builder = ComponentRegistryBuilder::new();
        builder
            .register(ComponentDefinition::new(ComponentKey::new("t", "x"), "x", "broken"))
            .unwrap();
        let registry = builder.seal();

        let ctx = RenderContext::detached(RequestInfo::new("/"));
        let mut tree = CompositionBuilder::new(&registry, &renderers, 8)
            .build(&ComponentKey::new("t", "x"), ctx.ids())
            .unwrap();
        let resolver = HydrationResolver::new();
        let err = RenderDispatcher::new(&renderers, &resolver)
            .render_tree(&mut tree, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Template { key, .. } if key == ComponentKey::new("t", "x")));
    }
}
