//! Component keys and definitions
//!
//! A [`ComponentDefinition`] is the registry's unit of storage: immutable once
//! registered and addressed by its [`ComponentKey`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::hydration::HydrationSpec;

/// `(namespace, view)` address of a component
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentKey {
    namespace: String,
    view: String,
}

impl ComponentKey {
    /// Create a new key
    pub fn new(namespace: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            view: view.into(),
        }
    }

    /// Namespace the component belongs to
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// View name within the namespace
    pub fn view(&self) -> &str {
        &self.view
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.view)
    }
}

impl FromStr for ComponentKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once(':') {
            Some((ns, view))
                if !ns.is_empty() && !view.is_empty() && !view.contains(':') =>
            {
                Ok(Self::new(ns, view))
            }
            _ => Err(CoreError::InvalidKey(s.into())),
        }
    }
}

/// A registered component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    /// Registry key
    pub key: ComponentKey,
    /// Opaque template reference handed to the renderer
    pub template_ref: String,
    /// Tag of the renderer that owns the template
    pub renderer_tag: String,
    /// Client binding; `None` means the node is inert static HTML
    pub hydration: Option<HydrationSpec>,
}

impl ComponentDefinition {
    /// Create a static (never hydrated) definition
    pub fn new(
        key: ComponentKey,
        template_ref: impl Into<String>,
        renderer_tag: impl Into<String>,
    ) -> Self {
        Self {
            key,
            template_ref: template_ref.into(),
            renderer_tag: renderer_tag.into(),
            hydration: None,
        }
    }

    /// Attach a client hydration binding
    pub fn with_hydration(mut self, hydration: HydrationSpec) -> Self {
        self.hydration = Some(hydration);
        self
    }

    /// Namespace of the component
    pub fn namespace(&self) -> &str {
        self.key.namespace()
    }

    /// View name of the component
    pub fn view_name(&self) -> &str {
        self.key.view()
    }

    /// Whether this component ships client behavior
    pub fn is_island(&self) -> bool {
        self.hydration.is_some()
    }
}
