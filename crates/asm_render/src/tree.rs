//! Composition tree
//!
//! The builder walks a blueprint top-down: resolve the definition, ask its
//! renderer which components the template embeds, recurse. Every occurrence
//! becomes its own [`RenderNode`] with its own hydration id, assigned in
//! pre-order. Cycles are detected against the current recursion path, so the
//! same component may appear on sibling branches freely.

use std::collections::HashSet;
use std::sync::Arc;

use asm_core::{ComponentDefinition, ComponentKey, HydrationId, HydrationIdGenerator};

use crate::error::{CompositionCycleError, RenderError, RenderResult};
use crate::registry::ComponentRegistry;
use crate::renderer::RendererRegistry;

/// One component occurrence in a render tree
#[derive(Debug, Clone)]
pub struct RenderNode {
    /// Resolved definition
    pub component: Arc<ComponentDefinition>,
    /// Children in embedding order
    pub children: Vec<RenderNode>,
    /// Markup, set by dispatch once the node rendered
    pub resolved_markup: Option<String>,
    /// Unique id within this render pass
    pub hydration_id: HydrationId,
    /// Nesting depth (root is 0)
    pub depth: usize,
}

impl RenderNode {
    /// Component key
    pub fn key(&self) -> &ComponentKey {
        &self.component.key
    }

    /// Number of nodes in this subtree
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(RenderNode::count).sum::<usize>()
    }

    /// Visit the subtree in pre-order
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a RenderNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Distinct component keys in pre-order of first occurrence, with the
    /// depth of that first occurrence
    pub fn distinct_components(&self) -> Vec<(ComponentKey, usize)> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.walk(&mut |node| {
            if seen.insert(node.key().clone()) {
                out.push((node.key().clone(), node.depth));
            }
        });
        out
    }

    /// Nodes carrying a hydration directive, in pre-order
    pub fn islands(&self) -> Vec<&RenderNode> {
        let mut out = Vec::new();
        self.walk(&mut |node| {
            if node.component.is_island() {
                out.push(node);
            }
        });
        out
    }

    /// Find a node by hydration id
    pub fn find(&self, id: HydrationId) -> Option<&RenderNode> {
        if self.hydration_id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    /// Deepest nesting level in this subtree
    pub fn max_depth(&self) -> usize {
        self.children
            .iter()
            .map(RenderNode::max_depth)
            .max()
            .unwrap_or(self.depth)
    }
}

/// Builds render trees against a sealed registry
pub struct CompositionBuilder<'a> {
    registry: &'a ComponentRegistry,
    renderers: &'a RendererRegistry,
    max_depth: usize,
}

impl<'a> CompositionBuilder<'a> {
    /// Create a builder
    pub fn new(registry: &'a ComponentRegistry, renderers: &'a RendererRegistry, max_depth: usize) -> Self {
        Self {
            registry,
            renderers,
            max_depth,
        }
    }

    /// Build the tree rooted at `blueprint`
    pub fn build(&self, blueprint: &ComponentKey, ids: &HydrationIdGenerator) -> RenderResult<RenderNode> {
        let mut path = Vec::new();
        let root = self.build_node(blueprint, 0, &mut path, ids)?;
        log::debug!(
            "Composed {} with {} nodes (depth {})",
            blueprint,
            root.count(),
            root.max_depth()
        );
        Ok(root)
    }

    fn build_node(
        &self,
        key: &ComponentKey,
        depth: usize,
        path: &mut Vec<ComponentKey>,
        ids: &HydrationIdGenerator,
    ) -> RenderResult<RenderNode> {
        if let Some(start) = path.iter().position(|k| k == key) {
            let mut cycle = path[start..].to_vec();
            cycle.push(key.clone());
            let err = CompositionCycleError { cycle };
            log::error!("{}", err);
            return Err(err.into());
        }
        if depth > self.max_depth {
            return Err(RenderError::DepthExceeded {
                key: key.clone(),
                depth,
                limit: self.max_depth,
            });
        }

        let component = self.registry.resolve_key(key)?;
        let renderer = self
            .renderers
            .get(&component.renderer_tag)
            .ok_or_else(|| RenderError::UnknownRenderer(component.renderer_tag.clone()))?;

        let hydration_id = ids.next();
        let references = renderer
            .references(&component.template_ref)
            .map_err(|source| RenderError::Template {
                key: key.clone(),
                source,
            })?;

        path.push(key.clone());
        let mut children = Vec::with_capacity(references.len());
        for child in &references {
            children.push(self.build_node(child, depth + 1, path, ids)?);
        }
        path.pop();

        Ok(RenderNode {
            component,
            children,
            resolved_markup: None,
            hydration_id,
            depth,
        })
    }
}
