//! Blueprint routing
//!
//! Path patterns are `/`-separated; a segment starting with `:` captures the
//! request segment under that name. Routes are tried in registration order.

use std::collections::BTreeMap;

use asm_core::ComponentKey;

use crate::error::{RenderError, RenderResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum RouteSegment {
    Literal(String),
    Param(String),
}

/// One path pattern bound to a blueprint
#[derive(Debug, Clone)]
pub struct Route {
    pattern: String,
    segments: Vec<RouteSegment>,
    blueprint: ComponentKey,
}

impl Route {
    /// Parse a pattern such as `/product/:id`
    pub fn new(pattern: &str, blueprint: ComponentKey) -> RenderResult<Self> {
        if !pattern.starts_with('/') {
            return Err(RenderError::InvalidRoute(pattern.to_string()));
        }

        let mut segments = Vec::new();
        let mut names = Vec::new();
        for part in split_path(pattern) {
            if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() || names.contains(&name) {
                    return Err(RenderError::InvalidRoute(pattern.to_string()));
                }
                names.push(name);
                segments.push(RouteSegment::Param(name.to_string()));
            } else {
                segments.push(RouteSegment::Literal(part.to_string()));
            }
        }

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
            blueprint,
        })
    }

    /// Original pattern text
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Blueprint rendered for this route
    pub fn blueprint(&self) -> &ComponentKey {
        &self.blueprint
    }

    /// Match a request path, returning captured params
    pub fn matches(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let parts: Vec<&str> = split_path(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = BTreeMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                RouteSegment::Literal(lit) if lit == part => {}
                RouteSegment::Literal(_) => return None,
                RouteSegment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    let path = path.split(['?', '#']).next().unwrap_or("");
    path.split('/').filter(|s| !s.is_empty())
}

/// Ordered route table
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Create an empty router
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route
    pub fn add(&mut self, pattern: &str, blueprint: ComponentKey) -> RenderResult<()> {
        if self.routes.iter().any(|r| r.pattern == pattern) {
            return Err(RenderError::InvalidRoute(format!("{} (duplicate)", pattern)));
        }
        self.routes.push(Route::new(pattern, blueprint)?);
        Ok(())
    }

    /// First route matching `path`, with its params
    pub fn resolve(&self, path: &str) -> RenderResult<(&Route, BTreeMap<String, String>)> {
        self.routes
            .iter()
            .find_map(|route| route.matches(path).map(|params| (route, params)))
            .ok_or_else(|| RenderError::RouteNotFound(path.to_string()))
    }

    /// All routes in registration order
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Number of routes
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
