//! Built-in placeholder renderer
//!
//! Templates are plain markup with three kinds of holes:
//!
//! ```text
//! <h1>{{ product.name }}</h1>            escaped value
//! <div>{{{ product.description }}}</div> raw value
//! <asm-component ref="shop:gallery" />   child component markup
//! ```
//!
//! Dotted paths walk objects; numeric segments index arrays. Missing values
//! render as nothing. Child references are filled in occurrence order.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use asm_core::marker::{escape_html, COMPONENT_TAG};
use asm_core::ComponentKey;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::{RenderInput, Renderer};
use crate::error::TemplateError;

/// Tag of the built-in renderer
pub const PLACEHOLDER_TAG: &str = "html";

/// Source of template text
pub trait TemplateStore: Send + Sync {
    /// Load the template text for a reference
    fn load(&self, template_ref: &str) -> Result<Arc<str>, TemplateError>;
}

/// Templates held in memory
#[derive(Debug, Default)]
pub struct MemoryTemplates {
    templates: HashMap<String, Arc<str>>,
}

impl MemoryTemplates {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template
    pub fn insert(&mut self, template_ref: impl Into<String>, source: impl Into<String>) {
        self.templates
            .insert(template_ref.into(), Arc::from(source.into()));
    }

    /// Builder-style insert
    pub fn with(mut self, template_ref: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(template_ref, source);
        self
    }
}

impl TemplateStore for MemoryTemplates {
    fn load(&self, template_ref: &str) -> Result<Arc<str>, TemplateError> {
        self.templates
            .get(template_ref)
            .cloned()
            .ok_or_else(|| TemplateError::NotFound(template_ref.to_string()))
    }
}

/// Templates read from a directory and cached after first use
#[derive(Debug)]
pub struct DirTemplates {
    root: PathBuf,
    cache: RwLock<HashMap<String, Arc<str>>>,
}

impl DirTemplates {
    /// Serve templates below `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Template root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, template_ref: &str) -> Result<PathBuf, TemplateError> {
        let relative = Path::new(template_ref);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if template_ref.is_empty() || escapes {
            return Err(TemplateError::InvalidRef(template_ref.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl TemplateStore for DirTemplates {
    fn load(&self, template_ref: &str) -> Result<Arc<str>, TemplateError> {
        if let Some(cached) = self.cache.read().get(template_ref) {
            return Ok(Arc::clone(cached));
        }

        let path = self.resolve(template_ref)?;
        let source: Arc<str> = match std::fs::read_to_string(&path) {
            Ok(text) => Arc::from(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TemplateError::NotFound(template_ref.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        log::debug!("Loaded template {} from {}", template_ref, path.display());
        self.cache
            .write()
            .insert(template_ref.to_string(), Arc::clone(&source));
        Ok(source)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Escaped(Vec<String>),
    Raw(Vec<String>),
    Child(ComponentKey),
}

fn syntax(template: &str, message: impl Into<String>) -> TemplateError {
    TemplateError::Syntax {
        template: template.to_string(),
        message: message.into(),
    }
}

fn parse_path(template: &str, inner: &str) -> Result<Vec<String>, TemplateError> {
    let inner = inner.trim();
    if inner.is_empty() {
        return Err(syntax(template, "empty placeholder"));
    }
    let path: Vec<String> = inner.split('.').map(|s| s.trim().to_string()).collect();
    if path.iter().any(String::is_empty) {
        return Err(syntax(template, format!("invalid path '{}'", inner)));
    }
    Ok(path)
}

fn parse_component_tag(template: &str, tag: &str) -> Result<ComponentKey, TemplateError> {
    let attr = "ref=\"";
    let start = tag
        .find(attr)
        .ok_or_else(|| syntax(template, format!("<{}> without ref attribute", COMPONENT_TAG)))?
        + attr.len();
    let len = tag[start..]
        .find('"')
        .ok_or_else(|| syntax(template, "unterminated ref attribute"))?;
    let reference = &tag[start..start + len];
    reference
        .parse()
        .map_err(|_| TemplateError::InvalidRef(reference.to_string()))
}

fn parse(template: &str, source: &str) -> Result<Vec<Segment>, TemplateError> {
    let open_tag = format!("<{}", COMPONENT_TAG);
    let close_tag = format!("</{}>", COMPONENT_TAG);
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut rest = source;

    loop {
        let var = rest.find("{{");
        let comp = rest.find(open_tag.as_str());
        let (pos, is_var) = match (var, comp) {
            (None, None) => break,
            (Some(v), Some(c)) if c < v => (c, false),
            (Some(v), _) => (v, true),
            (None, Some(c)) => (c, false),
        };

        text.push_str(&rest[..pos]);
        rest = &rest[pos..];

        if is_var {
            let (open, close, raw) = if rest.starts_with("{{{") {
                ("{{{", "}}}", true)
            } else {
                ("{{", "}}", false)
            };
            let body = &rest[open.len()..];
            let end = body
                .find(close)
                .ok_or_else(|| syntax(template, "unclosed placeholder"))?;
            let path = parse_path(template, &body[..end])?;

            if !text.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut text)));
            }
            segments.push(if raw { Segment::Raw(path) } else { Segment::Escaped(path) });
            rest = &body[end + close.len()..];
            continue;
        }

        // Only `<asm-component` followed by whitespace, `/` or `>` is a reference.
        let boundary = rest[open_tag.len()..].chars().next();
        if !matches!(boundary, Some(c) if c.is_whitespace() || c == '/' || c == '>') {
            text.push_str(&open_tag);
            rest = &rest[open_tag.len()..];
            continue;
        }

        let gt = rest
            .find('>')
            .ok_or_else(|| syntax(template, format!("unterminated <{}> tag", COMPONENT_TAG)))?;
        let tag = &rest[..=gt];
        let key = parse_component_tag(template, tag)?;
        rest = &rest[gt + 1..];

        if !tag.ends_with("/>") {
            let trimmed = rest.trim_start();
            rest = trimmed
                .strip_prefix(close_tag.as_str())
                .ok_or_else(|| syntax(template, format!("<{}> must be empty", COMPONENT_TAG)))?;
        }

        if !text.is_empty() {
            segments.push(Segment::Text(std::mem::take(&mut text)));
        }
        segments.push(Segment::Child(key));
    }

    text.push_str(rest);
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

fn lookup<'v>(data: &'v Map<String, Value>, path: &[String]) -> Option<&'v Value> {
    let (first, rest) = path.split_first()?;
    let mut current = data.get(first)?;
    for segment in rest {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// The built-in `html` renderer
pub struct PlaceholderRenderer {
    tag: String,
    store: Arc<dyn TemplateStore>,
    parsed: RwLock<HashMap<String, Arc<Vec<Segment>>>>,
}

impl PlaceholderRenderer {
    /// Renderer registered under the `html` tag
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self::with_tag(PLACEHOLDER_TAG, store)
    }

    /// Renderer registered under a custom tag
    pub fn with_tag(tag: impl Into<String>, store: Arc<dyn TemplateStore>) -> Self {
        Self {
            tag: tag.into(),
            store,
            parsed: RwLock::new(HashMap::new()),
        }
    }

    fn segments(&self, template_ref: &str) -> Result<Arc<Vec<Segment>>, TemplateError> {
        if let Some(parsed) = self.parsed.read().get(template_ref) {
            return Ok(Arc::clone(parsed));
        }
        let source = self.store.load(template_ref)?;
        let parsed = Arc::new(parse(template_ref, &source)?);
        self.parsed
            .write()
            .insert(template_ref.to_string(), Arc::clone(&parsed));
        Ok(parsed)
    }
}

#[async_trait::async_trait]
impl Renderer for PlaceholderRenderer {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn references(&self, template_ref: &str) -> Result<Vec<ComponentKey>, TemplateError> {
        Ok(self
            .segments(template_ref)?
            .iter()
            .filter_map(|s| match s {
                Segment::Child(key) => Some(key.clone()),
                _ => None,
            })
            .collect())
    }

    async fn render(&self, input: &RenderInput<'_>) -> Result<String, TemplateError> {
        let segments = self.segments(input.template_ref)?;

        let expected = segments
            .iter()
            .filter(|s| matches!(s, Segment::Child(_)))
            .count();
        if expected != input.children.len() {
            return Err(TemplateError::ChildCountMismatch {
                template: input.template_ref.to_string(),
                expected,
                found: input.children.len(),
            });
        }

        let mut out = String::new();
        let mut children = input.children.iter();
        for segment in segments.iter() {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Escaped(path) => {
                    if let Some(value) = lookup(input.data, path) {
                        out.push_str(&escape_html(&stringify(value)));
                    }
                }
                Segment::Raw(path) => {
                    if let Some(value) = lookup(input.data, path) {
                        out.push_str(&stringify(value));
                    }
                }
                Segment::Child(_) => {
                    if let Some(child) = children.next() {
                        out.push_str(child);
                    }
                }
            }
        }
        Ok(out)
    }
}

impl std::fmt::Debug for PlaceholderRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaceholderRenderer")
            .field("tag", &self.tag)
            .field("parsed", &self.parsed.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asm_core::HydrationId;
    use serde_json::json;
    use tempfile::tempdir;

    fn renderer(templates: MemoryTemplates) -> PlaceholderRenderer {
        PlaceholderRenderer::new(Arc::new(templates))
    }

    fn data(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    async fn render(r: &PlaceholderRenderer, template: &str, data: &Map<String, Value>, children: &[String]) -> Result<String, TemplateError> {
        let key = ComponentKey::new("test", "node");
        r.render(&RenderInput {
            key: &key,
            template_ref: template,
            data,
            children,
            depth: 0,
            hydration_id: HydrationId::new(0),
        })
        .await
    }

    #[test]
    fn test_parse_segments() {
        let segments = parse("t", "<p>{{ a.b }}</p>{{{ raw }}}<asm-component ref=\"ui:x\" />").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Text("<p>".into()),
                Segment::Escaped(vec!["a".into(), "b".into()]),
                Segment::Text("</p>".into()),
                Segment::Raw(vec!["raw".into()]),
                Segment::Child(ComponentKey::new("ui", "x")),
            ]
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse("t", "{{ open"), Err(TemplateError::Syntax { .. })));
        assert!(matches!(parse("t", "{{  }}"), Err(TemplateError::Syntax { .. })));
        assert!(matches!(parse("t", "{{ a..b }}"), Err(TemplateError::Syntax { .. })));
        assert!(matches!(
            parse("t", "<asm-component ref=\"nocolon\" />"),
            Err(TemplateError::InvalidRef(_))
        ));
        assert!(matches!(
            parse("t", "<asm-component ref=\"a:b\">text</asm-component>"),
            Err(TemplateError::Syntax { .. })
        ));
    }

    #[test]
    fn test_similar_tag_is_text() {
        let segments = parse("t", "<asm-components>").unwrap();
        assert_eq!(segments, vec![Segment::Text("<asm-components>".into())]);
    }

    #[test]
    fn test_references_in_order() {
        let r = renderer(MemoryTemplates::new().with(
            "page",
            "<asm-component ref=\"shop:gallery\"/><asm-component ref=\"shop:reviews\"></asm-component><asm-component ref=\"shop:gallery\" />",
        ));
        let refs = r.references("page").unwrap();
        assert_eq!(
            refs,
            vec![
                ComponentKey::new("shop", "gallery"),
                ComponentKey::new("shop", "reviews"),
                ComponentKey::new("shop", "gallery"),
            ]
        );
    }

    #[tokio::test]
    async fn test_substitution_and_escaping() {
        let r = renderer(MemoryTemplates::new().with(
            "card",
            "<h2>{{ product.name }}</h2><p>{{{ product.blurb }}}</p><i>{{ tags.1 }}</i><b>{{ missing }}</b>",
        ));
        let d = data(json!({
            "product": {"name": "Desk <Walnut>", "blurb": "<em>solid</em>"},
            "tags": ["oak", "walnut"]
        }));

        let html = render(&r, "card", &d, &[]).await.unwrap();
        assert_eq!(
            html,
            "<h2>Desk &lt;Walnut&gt;</h2><p><em>solid</em></p><i>walnut</i><b></b>"
        );
    }

    #[tokio::test]
    async fn test_children_embedded_by_value() {
        let r = renderer(MemoryTemplates::new().with(
            "page",
            "<main><asm-component ref=\"a:one\" /><hr><asm-component ref=\"a:two\" /></main>",
        ));
        let children = vec!["<x>1</x>".to_string(), "<y>2</y>".to_string()];
        let html = render(&r, "page", &Map::new(), &children).await.unwrap();
        assert_eq!(html, "<main><x>1</x><hr><y>2</y></main>");

        let err = render(&r, "page", &Map::new(), &children[..1]).await.unwrap_err();
        assert!(matches!(err, TemplateError::ChildCountMismatch { expected: 2, found: 1, .. }));
    }

    #[test]
    fn test_memory_not_found() {
        let store = MemoryTemplates::new();
        assert!(matches!(store.load("nope"), Err(TemplateError::NotFound(_))));
    }

    #[test]
    fn test_dir_templates_reject_escape() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("card.html"), "<div></div>").unwrap();

        let store = DirTemplates::new(dir.path().join("shop"));
        assert!(matches!(store.load("../card.html"), Err(TemplateError::InvalidRef(_))));
        assert!(matches!(store.load("../etc/passwd"), Err(TemplateError::InvalidRef(_))));
        assert!(matches!(store.load("/etc/passwd"), Err(TemplateError::InvalidRef(_))));
        assert!(matches!(store.load(""), Err(TemplateError::InvalidRef(_))));
    }

    #[test]
    fn test_dir_templates_load_and_cache() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("shop")).unwrap();
        std::fs::write(root.join("shop/card.html"), "<div>{{ name }}</div>").unwrap();

        let store = DirTemplates::new(root);
        assert_eq!(&*store.load("shop/card.html").unwrap(), "<div>{{ name }}</div>");

        // Served from cache after the file is gone.
        std::fs::remove_file(root.join("shop/card.html")).unwrap();
        assert!(store.load("shop/card.html").is_ok());
        assert!(matches!(store.load("shop/other.html"), Err(TemplateError::NotFound(_))));
    }
}
