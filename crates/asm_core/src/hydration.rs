//! Hydration directives
//!
//! Each island carries exactly one directive, fixed when its definition is
//! registered. The client runtime maps the directive to an activation policy.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// When a client module should activate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "query")]
pub enum HydrationDirective {
    /// Activate as soon as the DOM is parsed
    Immediate,
    /// Activate during an idle period, or after the fallback window elapses
    Idle,
    /// Activate the first time the subtree intersects the viewport
    Visible,
    /// Activate once the media query matches
    Media(String),
}

impl HydrationDirective {
    /// Parse a directive name, with an optional media query.
    ///
    /// `none` and the empty string yield `Ok(None)`: the node stays static.
    pub fn parse(name: &str, media: Option<&str>) -> CoreResult<Option<Self>> {
        match name.trim().to_lowercase().as_str() {
            "" | "none" => Ok(None),
            "immediate" | "load" => Ok(Some(Self::Immediate)),
            "idle" => Ok(Some(Self::Idle)),
            "visible" => Ok(Some(Self::Visible)),
            "media" => match media.map(str::trim) {
                Some(query) if !query.is_empty() => Ok(Some(Self::Media(query.to_string()))),
                _ => Err(CoreError::MissingMediaQuery),
            },
            other => Err(CoreError::InvalidDirective(other.into())),
        }
    }

    /// Directive name as written in markers and manifests
    pub fn name(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Idle => "idle",
            Self::Visible => "visible",
            Self::Media(_) => "media",
        }
    }

    /// Media query, for the `media` directive
    pub fn media_query(&self) -> Option<&str> {
        match self {
            Self::Media(query) => Some(query),
            _ => None,
        }
    }
}

impl fmt::Display for HydrationDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Media(query) => write!(f, "media({})", query),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Client binding of an island component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydrationSpec {
    /// Activation policy
    pub directive: HydrationDirective,
    /// Client module reference handed to the module loader
    pub module: String,
    /// Data-store keys snapshotted into the island's initial state
    #[serde(default)]
    pub props: Vec<String>,
}

impl HydrationSpec {
    /// Create a binding with no snapshotted props
    pub fn new(directive: HydrationDirective, module: impl Into<String>) -> Self {
        Self {
            directive,
            module: module.into(),
            props: Vec::new(),
        }
    }

    /// Add a data-store key to the snapshot
    pub fn with_prop(mut self, key: impl Into<String>) -> Self {
        self.props.push(key.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_directives() {
        assert_eq!(HydrationDirective::parse("immediate", None), Ok(Some(HydrationDirective::Immediate)));
        assert_eq!(HydrationDirective::parse("IDLE", None), Ok(Some(HydrationDirective::Idle)));
        assert_eq!(HydrationDirective::parse("visible", None), Ok(Some(HydrationDirective::Visible)));
        assert_eq!(HydrationDirective::parse("none", None), Ok(None));
        assert_eq!(HydrationDirective::parse("", None), Ok(None));
        assert_eq!(
            HydrationDirective::parse("media", Some("(max-width: 600px)")),
            Ok(Some(HydrationDirective::Media("(max-width: 600px)".into())))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(HydrationDirective::parse("media", None), Err(CoreError::MissingMediaQuery));
        assert_eq!(HydrationDirective::parse("media", Some("  ")), Err(CoreError::MissingMediaQuery));
        assert!(matches!(
            HydrationDirective::parse("whenever", None),
            Err(CoreError::InvalidDirective(_))
        ));
    }

    #[test]
    fn test_names() {
        let media = HydrationDirective::Media("print".into());
        assert_eq!(media.name(), "media");
        assert_eq!(media.media_query(), Some("print"));
        assert_eq!(media.to_string(), "media(print)");
        assert_eq!(HydrationDirective::Visible.media_query(), None);
    }

    #[test]
    fn test_spec_serde() {
        let spec = HydrationSpec::new(HydrationDirective::Media("print".into()), "m.js").with_prop("cart");
        let json = serde_json::to_string(&spec).unwrap();
        let back: HydrationSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }
}
