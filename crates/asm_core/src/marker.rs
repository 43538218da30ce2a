//! Hydration marker contract
//!
//! The server wraps every island in a marker element and the client scans for
//! the same names, so both sides take them from here.
//!
//! ```text
//! <asm-island data-asm-id="h3" data-asm-directive="visible" data-asm-module="shop/reviews.js">
//!   ...rendered markup...
//!   <script type="application/json" data-asm-state="h3">{"reviews":[...]}</script>
//! </asm-island>
//! ```

/// Default marker element name
pub const DEFAULT_TAG: &str = "asm-island";
/// Unique id attribute
pub const ATTR_ID: &str = "data-asm-id";
/// Directive name attribute
pub const ATTR_DIRECTIVE: &str = "data-asm-directive";
/// Client module reference attribute
pub const ATTR_MODULE: &str = "data-asm-module";
/// Media query attribute (only for the `media` directive)
pub const ATTR_MEDIA: &str = "data-asm-media";
/// Attribute on the state block pointing back to its island
pub const ATTR_STATE: &str = "data-asm-state";
/// Element name used by the built-in renderer for child component references
pub const COMPONENT_TAG: &str = "asm-component";

/// Escape text for HTML content and double-quoted attribute values
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverse of [`escape_html`] for the entities it produces
pub fn unescape_html(input: &str) -> String {
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Make serialized JSON safe to embed inside a `<script>` element.
///
/// `<`, `>` and `&` become `\u` escapes, which any JSON parser reads back
/// as the original characters.
pub fn escape_json_for_script(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_round_trip() {
        let raw = r#"<a href="x">Tom & 'Jerry'</a>"#;
        let escaped = escape_html(raw);
        assert!(!escaped.contains('<'));
        assert!(!escaped.contains('"'));
        assert_eq!(unescape_html(&escaped), raw);
    }

    #[test]
    fn test_json_script_escape() {
        let json = r#"{"html":"</script><b>&"}"#;
        let escaped = escape_json_for_script(json);
        assert!(!escaped.contains("</script>"));

        let value: serde_json::Value = serde_json::from_str(&escaped).unwrap();
        assert_eq!(value["html"], "</script><b>&");
    }
}
