//! Frontmatter parsing and interpretation.
//!
//! A frontmatter record becomes head lines (`<title>`, `<meta>`, `<link>`),
//! instance script imports and a module script `metadata` export.

use serde_json::{Map, Value};
use tessera_html::{escape_html, escape_html_and_braces};

use crate::snippet::FrontmatterFormat;

/// Record keys rendered as `<meta name="..." content="...">`.
const META_NAMES: &[&str] = &[
    "author",
    "description",
    "keywords",
    "generator",
    "theme-color",
    "color-scheme",
    "application-name",
    "referrer",
    "viewport",
];

/// Lines produced from a frontmatter record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrontmatterLines {
    /// Lines for the document head.
    pub head_lines: Vec<String>,
    /// Lines for the instance script.
    pub script_lines: Vec<String>,
    /// Lines for the module script.
    pub script_module_lines: Vec<String>,
}

/// Parse a frontmatter block into a record.
///
/// An empty block is an empty record.
///
/// # Errors
///
/// Returns a message when the block is malformed or is not a mapping.
pub fn parse(inner: &str, format: FrontmatterFormat) -> Result<Map<String, Value>, String> {
    if inner.trim().is_empty() {
        return Ok(Map::new());
    }
    let value: Value = match format {
        FrontmatterFormat::Yaml => serde_yaml::from_str(inner).map_err(|e| e.to_string())?,
        FrontmatterFormat::Toml => toml::from_str(inner).map_err(|e| e.to_string())?,
        FrontmatterFormat::Json => serde_json::from_str(inner).map_err(|e| e.to_string())?,
    };
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(format!("frontmatter must be a mapping, found {}", type_name(&other))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn attribute(value: &str) -> String {
    escape_html_and_braces(value)
}

/// `<tag k="v" ...>` from a mapping of scalar attributes.
fn element_from_map(tag: &str, map: &Map<String, Value>) -> Option<String> {
    let attrs: Vec<String> = map
        .iter()
        .filter_map(|(k, v)| Some(format!(r#"{}="{}""#, escape_html(k), attribute(&scalar(v)?))))
        .collect();
    if attrs.is_empty() {
        return None;
    }
    Some(format!("<{tag} {}>", attrs.join(" ")))
}

fn import_lines(value: &Value) -> Vec<String> {
    let statement = |s: &str| {
        let s = s.trim();
        if s.starts_with("import ") {
            if s.ends_with(';') { s.to_owned() } else { format!("{s};") }
        } else {
            format!("import '{s}';")
        }
    };
    match value {
        Value::String(s) => vec![statement(s)],
        Value::Array(items) => items
            .iter()
            .flat_map(|item| match item {
                Value::String(s) => vec![statement(s)],
                Value::Object(map) => default_imports(map),
                _ => Vec::new(),
            })
            .collect(),
        Value::Object(map) => default_imports(map),
        _ => Vec::new(),
    }
}

fn default_imports(map: &Map<String, Value>) -> Vec<String> {
    map.iter()
        .filter_map(|(name, path)| Some(format!("import {name} from '{}';", path.as_str()?)))
        .collect()
}

/// Interpret a record as head, script and module script lines.
#[must_use]
pub fn interpret(record: &Map<String, Value>) -> FrontmatterLines {
    let mut lines = FrontmatterLines::default();
    let head = &mut lines.head_lines;

    if let Some(title) = record.get("title").and_then(scalar) {
        head.push(format!("<title>{}</title>", escape_html_and_braces(&title)));
    }
    if let Some(base) = record.get("base").and_then(scalar) {
        head.push(format!(r#"<base href="{}">"#, attribute(&base)));
    }
    if let Some(charset) = record.get("charset").and_then(scalar) {
        head.push(format!(r#"<meta charset="{}">"#, attribute(&charset)));
    }
    for name in META_NAMES {
        let content = match record.get(*name) {
            Some(Value::Array(items)) => {
                let parts: Vec<String> = items.iter().filter_map(scalar).collect();
                Some(parts.join(", "))
            }
            Some(value) => scalar(value),
            None => None,
        };
        if let Some(content) = content {
            head.push(format!(r#"<meta name="{name}" content="{}">"#, attribute(&content)));
        }
    }
    for (key, tag) in [("meta", "meta"), ("link", "link")] {
        if let Some(Value::Array(items)) = record.get(key) {
            head.extend(
                items
                    .iter()
                    .filter_map(Value::as_object)
                    .filter_map(|map| element_from_map(tag, map)),
            );
        }
    }

    if let Some(imports) = record.get("imports") {
        lines.script_lines = import_lines(imports);
    }

    if !record.is_empty() {
        let json = Value::Object(record.clone()).to_string().replace("</", "<\\/");
        lines.script_module_lines.push(format!("export const metadata = {json};"));
    }
    lines
}
