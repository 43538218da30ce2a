//! Render engine
//!
//! The engine ties the pipeline together for one request:
//!
//! ```text
//! compose tree -> run factories -> render bottom-up -> hydration markers
//! ```
//!
//! Everything configured through [`EngineBuilder`] is frozen by `build`, so a
//! built [`Engine`] is shared read-only by all in-flight requests.

use std::future::Future;
use std::sync::Arc;

use asm_core::{ComponentDefinition, ComponentKey, HydrationIdGenerator};
use asm_services::ServiceRegistry;

use crate::config::EngineConfig;
use crate::context::{RenderContext, RequestId, RequestInfo};
use crate::error::{RegistryError, RenderError, RenderResult};
use crate::factory::{FactoryScheduler, FactoryTarget, FactoryUnit};
use crate::hydration::{HydrationRecord, HydrationResolver};
use crate::manifest::Manifest;
use crate::registry::{ComponentRegistry, ComponentRegistryBuilder};
use crate::renderer::{RenderDispatcher, Renderer, RendererRegistry};
use crate::routing::Router;
use crate::tree::{CompositionBuilder, RenderNode};

/// Output of one render pass
#[derive(Debug)]
pub struct RenderedPage {
    /// Request the page was rendered for
    pub request_id: RequestId,
    /// Final markup
    pub html: String,
    /// Hydration records sorted by id
    pub records: Vec<HydrationRecord>,
    /// The rendered tree, every node carrying its markup
    pub tree: RenderNode,
}

/// Collects configuration for an [`Engine`]
pub struct EngineBuilder {
    components: ComponentRegistryBuilder,
    renderers: RendererRegistry,
    scheduler: FactoryScheduler,
    router: Router,
    services: ServiceRegistry,
    config: EngineConfig,
}

impl EngineBuilder {
    /// Create a builder with default configuration
    pub fn new() -> Self {
        Self {
            components: ComponentRegistryBuilder::new(),
            renderers: RendererRegistry::new(),
            scheduler: FactoryScheduler::new(),
            router: Router::new(),
            services: ServiceRegistry::new(),
            config: EngineConfig::default(),
        }
    }

    /// Replace the configuration
    pub fn config(&mut self, config: EngineConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// Replace the service container; services are started by `build`
    pub fn services(&mut self, services: ServiceRegistry) -> &mut Self {
        self.services = services;
        self
    }

    /// Register a component definition
    pub fn register_component(&mut self, definition: ComponentDefinition) -> RenderResult<&mut Self> {
        self.components.register(definition)?;
        Ok(self)
    }

    /// Register a renderer plugin
    pub fn register_renderer(&mut self, renderer: impl Renderer + 'static) -> RenderResult<&mut Self> {
        self.renderers.register(Arc::new(renderer))?;
        Ok(self)
    }

    /// Bind a factory unit to a target
    pub fn schedule(&mut self, target: FactoryTarget, unit: impl FactoryUnit + 'static) -> &mut Self {
        self.scheduler.schedule(target, unit);
        self
    }

    /// Route a path pattern to a blueprint
    pub fn route(&mut self, pattern: &str, blueprint: ComponentKey) -> RenderResult<&mut Self> {
        self.router.add(pattern, blueprint)?;
        Ok(self)
    }

    /// Register every component and route of a manifest
    pub fn manifest(&mut self, manifest: Manifest) -> RenderResult<&mut Self> {
        for definition in manifest.components {
            self.register_component(definition)?;
        }
        for route in manifest.routes {
            self.route(&route.path, route.blueprint)?;
        }
        Ok(self)
    }

    /// Seal everything and validate the configuration.
    ///
    /// Fails on components naming an unregistered renderer, routes pointing
    /// at unregistered blueprints and (if enabled) composition errors in
    /// routed blueprints.
    pub fn build(self) -> RenderResult<Engine> {
        let Self {
            components,
            renderers,
            scheduler,
            router,
            mut services,
            config,
        } = self;

        let registry = components.seal();

        for definition in registry.definitions() {
            if !renderers.contains(&definition.renderer_tag) {
                log::error!(
                    "Component {} uses unregistered renderer '{}'",
                    definition.key,
                    definition.renderer_tag
                );
                return Err(RenderError::UnknownRenderer(definition.renderer_tag.clone()));
            }
        }

        for route in router.routes() {
            if !registry.contains(route.blueprint()) {
                return Err(RegistryError::NotFound(route.blueprint().clone()).into());
            }
        }

        if config.composition.validate_routes_on_build {
            let composer = CompositionBuilder::new(&registry, &renderers, config.composition.max_depth);
            for route in router.routes() {
                composer.build(route.blueprint(), &HydrationIdGenerator::new())?;
            }
        }

        services.start_all()?;

        let scheduler = scheduler.with_concurrent_tiers(config.factories.concurrent_tiers);
        let resolver = HydrationResolver::with_marker_tag(config.hydration.marker_tag.clone());

        log::info!(
            "Engine ready: {} components, {} renderers, {} factories, {} routes",
            registry.len(),
            renderers.len(),
            scheduler.len(),
            router.len()
        );

        Ok(Engine {
            registry,
            renderers,
            scheduler,
            router,
            services: Arc::new(services),
            resolver,
            config,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A sealed, shareable render engine
pub struct Engine {
    registry: ComponentRegistry,
    renderers: RendererRegistry,
    scheduler: FactoryScheduler,
    router: Router,
    services: Arc<ServiceRegistry>,
    resolver: HydrationResolver,
    config: EngineConfig,
}

impl Engine {
    /// Start configuring an engine
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Component registry
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Router
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Effective configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Service container
    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    /// Render a blueprint for a request
    pub async fn render_blueprint(&self, blueprint: &ComponentKey, request: RequestInfo) -> RenderResult<RenderedPage> {
        let ctx = RenderContext::new(request, Arc::clone(&self.services));
        log::debug!("[{}] render {} ({})", ctx.request_id(), blueprint, ctx.request().path);

        let mut tree = CompositionBuilder::new(&self.registry, &self.renderers, self.config.composition.max_depth)
            .build(blueprint, ctx.ids())?;

        self.scheduler
            .run(&ctx, &[FactoryTarget::Global, FactoryTarget::Blueprint(blueprint.clone())], 0)
            .await?;
        for (key, depth) in tree.distinct_components() {
            self.scheduler
                .run(&ctx, &[FactoryTarget::Component(key)], depth)
                .await?;
        }

        let records = RenderDispatcher::new(&self.renderers, &self.resolver)
            .render_tree(&mut tree, &ctx)
            .await?;
        let html = tree.resolved_markup.clone().unwrap_or_default();

        log::info!(
            "[{}] rendered {}: {} nodes, {} islands, {} bytes",
            ctx.request_id(),
            blueprint,
            tree.count(),
            records.len(),
            html.len()
        );

        Ok(RenderedPage {
            request_id: ctx.request_id(),
            html,
            records,
            tree,
        })
    }

    /// Render a blueprint given as `namespace:view`, returning only the markup
    pub async fn render_html(&self, blueprint: &str, request: RequestInfo) -> RenderResult<String> {
        let key: ComponentKey = blueprint.parse()?;
        Ok(self.render_blueprint(&key, request).await?.html)
    }

    /// Route the request path to a blueprint and render it
    pub async fn render_path(&self, mut request: RequestInfo) -> RenderResult<RenderedPage> {
        let (route, params) = self.router.resolve(&request.path)?;
        let blueprint = route.blueprint().clone();
        request.params.extend(params);
        self.render_blueprint(&blueprint, request).await
    }

    /// Render unless `abort` completes first.
    ///
    /// On abort every outstanding factory and renderer future is dropped
    /// together with the request context.
    pub async fn render_blueprint_until<A>(
        &self,
        blueprint: &ComponentKey,
        request: RequestInfo,
        abort: A,
    ) -> RenderResult<RenderedPage>
    where
        A: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = abort => {
                log::info!("Render of {} aborted", blueprint);
                Err(RenderError::Aborted)
            }
            result = self.render_blueprint(blueprint, request) => result,
        }
    }

    /// Stop services in reverse start order.
    ///
    /// Services still shared elsewhere are left running.
    pub fn shutdown(self) -> RenderResult<()> {
        match Arc::try_unwrap(self.services) {
            Ok(mut services) => {
                services.stop_all()?;
                Ok(())
            }
            Err(_) => {
                log::warn!("Service container still shared at shutdown; services left running");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("components", &self.registry.len())
            .field("renderers", &self.renderers)
            .field("scheduler", &self.scheduler)
            .field("routes", &self.router.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{MemoryTemplates, PlaceholderRenderer};

    fn html_renderer(templates: MemoryTemplates) -> PlaceholderRenderer {
        PlaceholderRenderer::new(Arc::new(templates))
    }

    #[test]
    fn test_build_rejects_unknown_renderer() {
        let mut builder = Engine::builder();
        builder
            .register_component(ComponentDefinition::new(ComponentKey::new("ui", "card"), "card.vue", "vue"))
            .unwrap();
        let err = builder.build().unwrap_err();
        assert!(matches!(err, RenderError::UnknownRenderer(tag) if tag == "vue"));
    }

    #[test]
    fn test_build_rejects_route_to_unknown_blueprint() {
        let mut builder = Engine::builder();
        builder.route("/", ComponentKey::new("shop", "home")).unwrap();
        let err = builder.build().unwrap_err();
        assert!(matches!(err, RenderError::Registry(RegistryError::NotFound(_))));
    }

    #[test]
    fn test_build_detects_routed_cycle() {
        let templates = MemoryTemplates::new()
            .with("a", "<asm-component ref=\"ui:b\" />")
            .with("b", "<asm-component ref=\"ui:a\" />");
        let mut builder = Engine::builder();
        builder.register_renderer(html_renderer(templates)).unwrap();
        for view in ["a", "b"] {
            builder
                .register_component(ComponentDefinition::new(ComponentKey::new("ui", view), view, "html"))
                .unwrap();
        }
        builder.route("/", ComponentKey::new("ui", "a")).unwrap();

        let err = builder.build().unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(err, RenderError::Cycle(_)));
    }

    #[tokio::test]
    async fn test_render_html_parses_key() {
        let mut builder = Engine::builder();
        builder
            .register_renderer(html_renderer(MemoryTemplates::new().with("home", "<p>home</p>")))
            .unwrap();
        builder
            .register_component(ComponentDefinition::new(ComponentKey::new("shop", "home"), "home", "html"))
            .unwrap();
        let engine = builder.build().unwrap();

        let html = engine.render_html("shop:home", RequestInfo::new("/")).await.unwrap();
        assert_eq!(html, "<p>home</p>");

        let err = engine.render_html("nocolon", RequestInfo::new("/")).await.unwrap_err();
        assert!(matches!(err, RenderError::InvalidKey(_)));

        let err = engine.render_html("shop:gone", RequestInfo::new("/")).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }
}
