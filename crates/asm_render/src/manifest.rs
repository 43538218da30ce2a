//! Component manifest
//!
//! Parses component manifests (`components.toml`) into definitions and routes.
//!
//! ```toml
//! [[components]]
//! namespace = "shop"
//! view = "product-detail"
//! template = "shop/product-detail.html"
//! renderer = "html"
//!
//! [[components]]
//! namespace = "shop"
//! view = "reviews"
//! template = "shop/reviews.html"
//! renderer = "html"
//! hydrate = "visible"
//! module = "shop/reviews.js"
//! props = ["reviews"]
//!
//! [[routes]]
//! path = "/product/:id"
//! blueprint = "shop:product-detail"
//! ```

use std::path::Path;

use asm_core::{ComponentDefinition, ComponentKey, CoreError, HydrationDirective, HydrationSpec};
use serde::Deserialize;
use thiserror::Error;

/// Errors from manifest parsing
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid component {component}: {source}")]
    InvalidComponent {
        component: String,
        #[source]
        source: CoreError,
    },

    #[error("Component {0} sets a hydration directive but no module")]
    MissingModule(String),

    #[error("Invalid route {path}: {source}")]
    InvalidRoute {
        path: String,
        #[source]
        source: CoreError,
    },
}

/// Result type for manifest operations
pub type ManifestResult<T> = Result<T, ManifestError>;

#[derive(Debug, Deserialize)]
struct ComponentToml {
    namespace: String,
    view: String,
    template: String,
    renderer: String,
    hydrate: Option<String>,
    module: Option<String>,
    media: Option<String>,
    #[serde(default)]
    props: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RouteToml {
    path: String,
    blueprint: String,
}

#[derive(Debug, Deserialize)]
struct ManifestToml {
    #[serde(default)]
    components: Vec<ComponentToml>,
    #[serde(default)]
    routes: Vec<RouteToml>,
}

/// A route entry
#[derive(Debug, Clone, PartialEq)]
pub struct RouteEntry {
    /// Path pattern
    pub path: String,
    /// Blueprint rendered for the path
    pub blueprint: ComponentKey,
}

/// Parsed manifest
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    /// Component definitions in file order
    pub components: Vec<ComponentDefinition>,
    /// Routes in file order
    pub routes: Vec<RouteEntry>,
}

fn convert_component(raw: ComponentToml) -> ManifestResult<ComponentDefinition> {
    let label = format!("{}:{}", raw.namespace, raw.view);
    let invalid = |source| ManifestError::InvalidComponent {
        component: label.clone(),
        source,
    };

    let key: ComponentKey = label.parse().map_err(invalid)?;
    let mut definition = ComponentDefinition::new(key, raw.template, raw.renderer);

    let directive = match raw.hydrate.as_deref() {
        Some(name) => HydrationDirective::parse(name, raw.media.as_deref()).map_err(invalid)?,
        None => None,
    };
    if let Some(directive) = directive {
        let module = raw
            .module
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ManifestError::MissingModule(label.clone()))?;
        let mut spec = HydrationSpec::new(directive, module);
        spec.props = raw.props;
        definition = definition.with_hydration(spec);
    }

    Ok(definition)
}

/// Parse a manifest from TOML string
pub fn parse_manifest(content: &str) -> ManifestResult<Manifest> {
    let raw: ManifestToml = toml::from_str(content)?;

    let components = raw
        .components
        .into_iter()
        .map(convert_component)
        .collect::<ManifestResult<Vec<_>>>()?;

    let routes = raw
        .routes
        .into_iter()
        .map(|r| {
            let blueprint = r.blueprint.parse().map_err(|source| ManifestError::InvalidRoute {
                path: r.path.clone(),
                source,
            })?;
            Ok(RouteEntry {
                path: r.path,
                blueprint,
            })
        })
        .collect::<ManifestResult<Vec<_>>>()?;

    Ok(Manifest { components, routes })
}

/// Load and parse a manifest from a file
pub fn load_manifest(path: impl AsRef<Path>) -> ManifestResult<Manifest> {
    let content = std::fs::read_to_string(path)?;
    parse_manifest(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_manifest() {
        let manifest = parse_manifest(
            r#"
            [[components]]
            namespace = "shop"
            view = "product-detail"
            template = "shop/product-detail.html"
            renderer = "html"

            [[components]]
            namespace = "shop"
            view = "nav"
            template = "shop/nav.html"
            renderer = "html"
            hydrate = "media"
            media = "(max-width: 700px)"
            module = "shop/nav.js"
            props = ["menu", "cart_count"]

            [[routes]]
            path = "/product/:id"
            blueprint = "shop:product-detail"
            "#,
        )
        .unwrap();

        assert_eq!(manifest.components.len(), 2);
        assert!(!manifest.components[0].is_island());

        let nav = manifest.components[1].hydration.as_ref().unwrap();
        assert_eq!(nav.directive, HydrationDirective::Media("(max-width: 700px)".into()));
        assert_eq!(nav.module, "shop/nav.js");
        assert_eq!(nav.props, vec!["menu", "cart_count"]);

        assert_eq!(
            manifest.routes,
            vec![RouteEntry {
                path: "/product/:id".into(),
                blueprint: ComponentKey::new("shop", "product-detail"),
            }]
        );
    }

    #[test]
    fn test_hydrate_none_is_static() {
        let manifest = parse_manifest(
            r#"
            [[components]]
            namespace = "ui"
            view = "footer"
            template = "footer.html"
            renderer = "html"
            hydrate = "none"
            "#,
        )
        .unwrap();
        assert!(manifest.components[0].hydration.is_none());
    }

    #[test]
    fn test_validation_errors() {
        let missing_module = r#"
            [[components]]
            namespace = "ui"
            view = "menu"
            template = "menu.html"
            renderer = "html"
            hydrate = "idle"
        "#;
        assert!(matches!(parse_manifest(missing_module), Err(ManifestError::MissingModule(_))));

        let bad_directive = r#"
            [[components]]
            namespace = "ui"
            view = "menu"
            template = "menu.html"
            renderer = "html"
            hydrate = "whenever"
            module = "m.js"
        "#;
        assert!(matches!(
            parse_manifest(bad_directive),
            Err(ManifestError::InvalidComponent { source: CoreError::InvalidDirective(_), .. })
        ));

        let media_without_query = r#"
            [[components]]
            namespace = "ui"
            view = "menu"
            template = "menu.html"
            renderer = "html"
            hydrate = "media"
            module = "m.js"
        "#;
        assert!(matches!(
            parse_manifest(media_without_query),
            Err(ManifestError::InvalidComponent { source: CoreError::MissingMediaQuery, .. })
        ));

        let bad_route = r#"
            [[routes]]
            path = "/"
            blueprint = "home"
        "#;
        assert!(matches!(parse_manifest(bad_route), Err(ManifestError::InvalidRoute { .. })));
    }

    #[test]
    fn test_empty_manifest() {
        let manifest = parse_manifest("").unwrap();
        assert!(manifest.components.is_empty());
        assert!(manifest.routes.is_empty());
    }
}
