//! Hydration directive resolver
//!
//! For every node whose component carries a hydration binding, the resolver
//! wraps the rendered markup in a marker element and appends the serialized
//! props snapshot. Nodes without a binding pass through untouched and stay
//! static.

use std::collections::HashSet;
use std::fmt::Write as _;

use asm_core::marker::{
    escape_html, escape_json_for_script, ATTR_DIRECTIVE, ATTR_ID, ATTR_MEDIA, ATTR_MODULE, ATTR_STATE,
    DEFAULT_TAG,
};
use asm_core::{ComponentKey, HydrationDirective, HydrationId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::DataStore;
use crate::error::HydrationError;
use crate::tree::RenderNode;

/// Hydration metadata emitted for one island
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydrationRecord {
    /// Id of the node; matches the marker's id attribute
    pub hydration_id: HydrationId,
    /// Component the island belongs to
    pub component: ComponentKey,
    /// Activation policy
    pub directive: HydrationDirective,
    /// Client module reference
    pub module: String,
    /// JSON props snapshot as it appears in the state block (before script escaping)
    pub serialized_props: String,
}

impl HydrationRecord {
    /// Parse the props snapshot back into a value
    pub fn props(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.serialized_props)
    }
}

/// Emits hydration markers around island markup
#[derive(Debug, Clone)]
pub struct HydrationResolver {
    marker_tag: String,
}

impl HydrationResolver {
    /// Resolver emitting the default marker element
    pub fn new() -> Self {
        Self::with_marker_tag(DEFAULT_TAG)
    }

    /// Resolver emitting a custom marker element
    pub fn with_marker_tag(tag: impl Into<String>) -> Self {
        Self {
            marker_tag: tag.into(),
        }
    }

    /// Marker element name
    pub fn marker_tag(&self) -> &str {
        &self.marker_tag
    }

    /// Annotate one rendered node.
    ///
    /// Returns the (possibly wrapped) markup and the record, if the node is an island.
    pub fn resolve(
        &self,
        node: &RenderNode,
        markup: String,
        data: &DataStore,
    ) -> Result<(String, Option<HydrationRecord>), HydrationError> {
        let Some(spec) = node.component.hydration.as_ref() else {
            return Ok((markup, None));
        };

        let id = node.hydration_id;
        let props = Value::Object(data.select(&spec.props));
        let serialized_props =
            serde_json::to_string(&props).map_err(|source| HydrationError::Serialization { id, source })?;

        let mut out = String::with_capacity(markup.len() + serialized_props.len() + 160);
        // Writing into a String cannot fail.
        let _ = write!(
            out,
            "<{tag} {ATTR_ID}=\"{id}\" {ATTR_DIRECTIVE}=\"{directive}\" {ATTR_MODULE}=\"{module}\"",
            tag = self.marker_tag,
            directive = spec.directive.name(),
            module = escape_html(&spec.module),
        );
        if let Some(query) = spec.directive.media_query() {
            let _ = write!(out, " {ATTR_MEDIA}=\"{}\"", escape_html(query));
        }
        out.push('>');
        out.push_str(&markup);
        let _ = write!(
            out,
            "<script type=\"application/json\" {ATTR_STATE}=\"{id}\">{}</script></{}>",
            escape_json_for_script(&serialized_props),
            self.marker_tag
        );

        log::debug!(
            "Hydration marker {} for {} ({}, module {})",
            id,
            node.key(),
            spec.directive,
            spec.module
        );

        let record = HydrationRecord {
            hydration_id: id,
            component: node.key().clone(),
            directive: spec.directive.clone(),
            module: spec.module.clone(),
            serialized_props,
        };
        Ok((out, Some(record)))
    }

    /// Check that no id was emitted twice
    pub fn validate(records: &[HydrationRecord]) -> Result<(), HydrationError> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in records {
            if !seen.insert(record.hydration_id) {
                return Err(HydrationError::DuplicateId(record.hydration_id));
            }
        }
        Ok(())
    }
}

impl Default for HydrationResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asm_core::{ComponentDefinition, HydrationSpec};
    use serde_json::json;
    use std::sync::Arc;

    fn node(definition: ComponentDefinition, id: u64) -> RenderNode {
        RenderNode {
            component: Arc::new(definition),
            children: Vec::new(),
            resolved_markup: None,
            hydration_id: HydrationId::new(id),
            depth: 1,
        }
    }

    #[test]
    fn test_static_node_untouched() {
        let n = node(ComponentDefinition::new(ComponentKey::new("ui", "footer"), "f", "html"), 0);
        let (markup, record) = HydrationResolver::new()
            .resolve(&n, "<footer></footer>".into(), &DataStore::new())
            .unwrap();
        assert_eq!(markup, "<footer></footer>");
        assert!(record.is_none());
    }

    #[test]
    fn test_marker_and_snapshot() {
        let definition = ComponentDefinition::new(ComponentKey::new("shop", "reviews"), "r", "html").with_hydration(
            HydrationSpec::new(HydrationDirective::Visible, "shop/reviews.js")
                .with_prop("reviews")
                .with_prop("absent"),
        );
        let data = DataStore::new();
        data.set("reviews", json!([{"stars": 5, "text": "</script>"}]));
        data.set("unrelated", json!(true));

        let (markup, record) = HydrationResolver::new()
            .resolve(&node(definition, 4), "<ul></ul>".into(), &data)
            .unwrap();
        let record = record.unwrap();

        assert!(markup.starts_with(
            "<asm-island data-asm-id=\"h4\" data-asm-directive=\"visible\" data-asm-module=\"shop/reviews.js\"><ul></ul>"
        ));
        assert!(markup.ends_with("</script></asm-island>"));
        assert_eq!(markup.matches("</script>").count(), 1);
        assert_eq!(record.props().unwrap(), json!({"reviews": [{"stars": 5, "text": "</script>"}]}));
    }

    #[test]
    fn test_media_attribute() {
        let definition = ComponentDefinition::new(ComponentKey::new("ui", "nav"), "n", "html").with_hydration(
            HydrationSpec::new(HydrationDirective::Media("(max-width: 600px)".into()), "ui/nav.js"),
        );
        let (markup, _) = HydrationResolver::with_marker_tag("x-island")
            .resolve(&node(definition, 0), String::new(), &DataStore::new())
            .unwrap();
        assert!(markup.starts_with("<x-island "));
        assert!(markup.contains("data-asm-media=\"(max-width: 600px)\""));
        assert!(markup.ends_with("</x-island>"));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let record = HydrationRecord {
            hydration_id: HydrationId::new(1),
            component: ComponentKey::new("a", "b"),
            directive: HydrationDirective::Idle,
            module: "m".into(),
            serialized_props: "{}".into(),
        };
        assert!(HydrationResolver::validate(&[record.clone()]).is_ok());
        assert!(matches!(
            HydrationResolver::validate(&[record.clone(), record]),
            Err(HydrationError::DuplicateId(_))
        ));
    }
}
