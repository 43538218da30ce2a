//! Command-line host for the render engine
//!
//! Loads an engine config, a component manifest and a template directory,
//! renders one blueprint (or routed path) and writes the HTML to stdout.
//!
//! Run with: cargo run -p asm_runtime -- --manifest demo/components.toml \
//!           --templates demo/templates --data demo/data.json /product/42

mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use asm_core::ComponentKey;
use asm_render::{
    load_manifest, BoxError, DirTemplates, Engine, EngineConfig, FactoryTarget, FnFactory, PlaceholderRenderer,
    RenderError, RenderedPage, RequestInfo,
};
use serde_json::{Map, Value};

use crate::cli::{Args, ArgsError, USAGE};

fn main() {
    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(ArgsError::Help) => {
            println!("{}", USAGE);
            return;
        }
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let config_path = args
        .config
        .clone()
        .or_else(|| std::env::var("ASM_CONFIG").ok().map(PathBuf::from));
    let config = match EngineConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(2);
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.filter.as_str())
    ).init();
    print_summary(&config, &args);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    match runtime.block_on(run(config, &args)) {
        Ok(page) => {
            println!("{}", page.html);
            if args.records {
                match serde_json::to_string_pretty(&page.records) {
                    Ok(json) => println!("{}", json),
                    Err(e) => log::error!("Failed to serialize hydration records: {}", e),
                }
            }
        }
        Err(e) => {
            log::error!("{}", e);
            let code = match e.downcast_ref::<RenderError>() {
                Some(render) if render.status_code() == 404 => 4,
                _ => 1,
            };
            std::process::exit(code);
        }
    }
}

fn print_summary(config: &EngineConfig, args: &Args) {
    log::info!("Engine Configuration:");
    log::info!("  Manifest: {}", args.manifest.display());
    log::info!("  Templates: {}", args.templates.display());
    log::info!(
        "  Max depth: {}, concurrent tiers: {}",
        config.composition.max_depth,
        config.factories.concurrent_tiers
    );
    log::info!(
        "  Marker: <{}>, idle fallback: {}ms",
        config.hydration.marker_tag,
        config.hydration.idle_fallback_ms
    );
}

async fn run(config: EngineConfig, args: &Args) -> Result<RenderedPage, BoxError> {
    let manifest = load_manifest(&args.manifest)?;
    log::info!(
        "Manifest: {} components, {} routes",
        manifest.components.len(),
        manifest.routes.len()
    );

    let mut builder = Engine::builder();
    builder.config(config);
    builder.register_renderer(PlaceholderRenderer::new(Arc::new(DirTemplates::new(&args.templates))))?;
    builder.manifest(manifest)?;
    if let Some(path) = &args.data {
        let seed = Arc::new(load_seed(path)?);
        builder.schedule(
            FactoryTarget::Global,
            FnFactory::new("seed-data", i32::MAX, move |ctx| {
                let seed = Arc::clone(&seed);
                Box::pin(async move {
                    for (key, value) in seed.iter() {
                        ctx.data().set(key.clone(), value.clone());
                    }
                    Ok::<(), BoxError>(())
                })
            }),
        );
    }
    let engine = builder.build()?;

    let mut request = RequestInfo::new(args.path.as_str());
    if let Some(user_agent) = &args.user_agent {
        request = request.with_user_agent(user_agent.as_str());
    }

    let page = match &args.blueprint {
        Some(blueprint) => {
            let key: ComponentKey = blueprint.parse()?;
            engine.render_blueprint(&key, request).await?
        }
        None => engine.render_path(request).await?,
    };

    engine.shutdown()?;
    Ok(page)
}

fn load_seed(path: &Path) -> Result<Map<String, Value>, BoxError> {
    let content = std::fs::read_to_string(path)?;
    match serde_json::from_str(&content)? {
        Value::Object(map) => Ok(map),
        _ => Err(format!("{}: seed data must be a JSON object", path.display()).into()),
    }
}
