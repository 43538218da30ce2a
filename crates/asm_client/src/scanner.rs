//! Marker scanner
//!
//! Finds every hydration marker in a page, in document order, together with
//! its attributes, inner markup and raw state block. Islands may nest; each
//! island records its nearest enclosing island.

use std::collections::{HashMap, HashSet};

use asm_core::marker::{unescape_html, ATTR_DIRECTIVE, ATTR_ID, ATTR_MEDIA, ATTR_MODULE, ATTR_STATE};
use asm_core::{HydrationDirective, HydrationId};

use crate::error::HydrationMismatch;

/// One hydration marker found in the page
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedIsland {
    /// Marker id
    pub id: HydrationId,
    /// Activation directive
    pub directive: HydrationDirective,
    /// Client module reference
    pub module: String,
    /// Raw JSON from the state block, if present
    pub state: Option<String>,
    /// Server-rendered markup of the island (state block excluded)
    pub markup: String,
    /// Nearest enclosing island
    pub parent: Option<HydrationId>,
}

/// Result of scanning a page
#[derive(Debug, Default)]
pub struct ScanOutput {
    /// Islands in document order
    pub islands: Vec<ScannedIsland>,
    /// Markers that could not be used
    pub mismatches: Vec<HydrationMismatch>,
}

struct OpenMarker {
    start: usize,
    content_start: usize,
    attributes: Result<HashMap<String, String>, String>,
}

/// Scan `html` for markers named `marker_tag`
pub fn scan(html: &str, marker_tag: &str) -> ScanOutput {
    let open_pat = format!("<{}", marker_tag);
    let close_pat = format!("</{}>", marker_tag);

    let mut out = ScanOutput::default();
    let mut stack: Vec<OpenMarker> = Vec::new();
    let mut found: Vec<(usize, ScannedIsland)> = Vec::new();
    let mut pos = 0;

    loop {
        let rest = &html[pos..];
        let next_open = rest.find(open_pat.as_str());
        let next_close = rest.find(close_pat.as_str());

        let is_open = match (next_open, next_close) {
            (None, None) => break,
            (Some(o), Some(c)) => o < c,
            (Some(_), None) => true,
            (None, Some(_)) => false,
        };

        if is_open {
            let start = pos + next_open.unwrap_or(0);
            let after_name = start + open_pat.len();
            let boundary = html[after_name..].chars().next();
            if !matches!(boundary, Some(c) if c.is_whitespace() || c == '>' || c == '/') {
                pos = after_name;
                continue;
            }
            let Some(gt) = html[after_name..].find('>') else {
                out.mismatches
                    .push(HydrationMismatch::InvalidMarker("unterminated marker tag".to_string()));
                break;
            };
            let tag_end = after_name + gt;
            stack.push(OpenMarker {
                start,
                content_start: tag_end + 1,
                attributes: parse_attributes(&html[after_name..tag_end]),
            });
            pos = tag_end + 1;
        } else {
            let close_start = pos + next_close.unwrap_or(0);
            pos = close_start + close_pat.len();

            let Some(open) = stack.pop() else {
                out.mismatches
                    .push(HydrationMismatch::InvalidMarker("closing marker without opening".to_string()));
                continue;
            };
            let parent = stack
                .iter()
                .rev()
                .find_map(|m| m.attributes.as_ref().ok().and_then(|a| parse_id(a).ok()));

            match build_island(open.attributes, &html[open.content_start..close_start], parent) {
                Ok(Some(island)) => found.push((open.start, island)),
                Ok(None) => {}
                Err(mismatch) => out.mismatches.push(mismatch),
            }
        }
    }

    for open in stack {
        let label = open
            .attributes
            .ok()
            .and_then(|a| a.get(ATTR_ID).cloned())
            .unwrap_or_default();
        out.mismatches
            .push(HydrationMismatch::InvalidMarker(format!("unclosed marker '{}'", label)));
    }

    found.sort_by_key(|(start, _)| *start);
    let mut seen = HashSet::new();
    for (_, island) in found {
        if seen.insert(island.id) {
            out.islands.push(island);
        } else {
            out.mismatches.push(HydrationMismatch::DuplicateId(island.id));
        }
    }

    log::debug!(
        "Scanned {} islands ({} malformed markers)",
        out.islands.len(),
        out.mismatches.len()
    );
    out
}

fn parse_attributes(source: &str) -> Result<HashMap<String, String>, String> {
    let mut attributes = HashMap::new();
    let mut rest = source.trim();

    while !rest.is_empty() && rest != "/" {
        let name_end = rest
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(rest.len());
        let name = rest[..name_end].to_ascii_lowercase();
        rest = rest[name_end..].trim_start();

        let value = match rest.strip_prefix('=') {
            Some(after_eq) => {
                let quoted = after_eq
                    .trim_start()
                    .strip_prefix('"')
                    .ok_or_else(|| format!("attribute {} is not quoted", name))?;
                let end = quoted
                    .find('"')
                    .ok_or_else(|| format!("attribute {} is not terminated", name))?;
                rest = quoted[end + 1..].trim_start();
                unescape_html(&quoted[..end])
            }
            None => String::new(),
        };
        attributes.insert(name, value);
    }

    Ok(attributes)
}

fn parse_id(attributes: &HashMap<String, String>) -> Result<HydrationId, HydrationMismatch> {
    let raw = attributes
        .get(ATTR_ID)
        .ok_or_else(|| HydrationMismatch::InvalidMarker(format!("marker without {}", ATTR_ID)))?;
    raw.parse()
        .map_err(|e| HydrationMismatch::InvalidMarker(format!("{}", e)))
}

fn build_island(
    attributes: Result<HashMap<String, String>, String>,
    inner: &str,
    parent: Option<HydrationId>,
) -> Result<Option<ScannedIsland>, HydrationMismatch> {
    let attributes = attributes.map_err(HydrationMismatch::InvalidMarker)?;
    let id = parse_id(&attributes)?;

    let directive_name = attributes.get(ATTR_DIRECTIVE).map(String::as_str).unwrap_or("");
    let media = attributes.get(ATTR_MEDIA).map(String::as_str);
    let directive = match HydrationDirective::parse(directive_name, media) {
        Ok(Some(directive)) => directive,
        Ok(None) => {
            log::debug!("Marker {} has no directive; left static", id);
            return Ok(None);
        }
        Err(e) => return Err(HydrationMismatch::InvalidMarker(format!("{}: {}", id, e))),
    };

    let module = attributes
        .get(ATTR_MODULE)
        .filter(|m| !m.is_empty())
        .cloned()
        .ok_or_else(|| HydrationMismatch::InvalidMarker(format!("{}: marker without {}", id, ATTR_MODULE)))?;

    let state_open = format!("<script type=\"application/json\" {}=\"{}\">", ATTR_STATE, id);
    let (markup, state) = match inner.rfind(&state_open) {
        Some(script_start) => {
            let json_start = script_start + state_open.len();
            let json_len = inner[json_start..].find("</script>").unwrap_or(inner.len() - json_start);
            (
                inner[..script_start].to_string(),
                Some(inner[json_start..json_start + json_len].to_string()),
            )
        }
        None => (inner.to_string(), None),
    };

    Ok(Some(ScannedIsland {
        id,
        directive,
        module,
        state,
        markup,
        parent,
    }))
}
