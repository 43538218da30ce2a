//! # asm_render - Server-Side Composition
//!
//! Turns a blueprint reference and request info into HTML with hydration
//! markers. The pipeline per request:
//!
//! 1. **Composition**: resolve the blueprint and every embedded component
//!    into a [`RenderNode`] tree (cycle and depth checks, pre-order ids)
//! 2. **Factories**: run data-preparation units by descending priority into
//!    the request's data store
//! 3. **Dispatch**: render bottom-up through the renderer registered for
//!    each node's tag
//! 4. **Hydration**: wrap island markup in markers carrying id, directive,
//!    module reference and a props snapshot
//!
//! ## Example
//!
//! ```ignore
//! use asm_render::prelude::*;
//!
//! let mut builder = Engine::builder();
//! builder.register_renderer(PlaceholderRenderer::new(Arc::new(templates)))?;
//! builder.manifest(load_manifest("components.toml")?)?;
//! let engine = builder.build()?;
//!
//! let page = engine.render_path(RequestInfo::new("/product/42")).await?;
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod factory;
pub mod hydration;
pub mod manifest;
pub mod registry;
pub mod renderer;
pub mod routing;
pub mod tree;

pub use config::{ConfigError, EngineConfig};
pub use context::{DataStore, RenderContext, RequestId, RequestInfo};
pub use engine::{Engine, EngineBuilder, RenderedPage};
pub use error::{
    BoxError, CompositionCycleError, DataPreparationError, HydrationError, RegistryError, RenderError,
    RenderResult, TemplateError,
};
pub use factory::{FactoryContext, FactoryFuture, FactoryScheduler, FactoryTarget, FactoryUnit, FnFactory};
pub use hydration::{HydrationRecord, HydrationResolver};
pub use manifest::{load_manifest, parse_manifest, Manifest, ManifestError};
pub use registry::{ComponentRegistry, ComponentRegistryBuilder};
pub use renderer::{
    DirTemplates, FnRenderer, MemoryTemplates, PlaceholderRenderer, RenderDispatcher, RenderInput, Renderer,
    RendererRegistry, TemplateStore,
};
pub use routing::{Route, Router};
pub use tree::{CompositionBuilder, RenderNode};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::context::{RenderContext, RequestInfo};
    pub use crate::engine::{Engine, EngineBuilder, RenderedPage};
    pub use crate::error::{BoxError, RenderError, RenderResult};
    pub use crate::factory::{FactoryContext, FactoryTarget, FactoryUnit, FnFactory};
    pub use crate::hydration::HydrationRecord;
    pub use crate::manifest::load_manifest;
    pub use crate::renderer::{DirTemplates, MemoryTemplates, PlaceholderRenderer, RenderInput, Renderer};
    pub use asm_core::prelude::*;
    pub use std::sync::Arc;
}
