//! Layout knowledge about tags.
//!
//! The normalizer needs to know, for any tag it meets, whether a single newline
//! next to it should collapse or widen, and whether the markdown engine's
//! paragraphs may wrap it. HTML builtins come from fixed tables; user components
//! are registered on the classifier.

use std::collections::HashMap;

/// Layout policy for one tag name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TagPolicy {
    /// A single newline next to the tag collapses instead of becoming a paragraph break.
    pub prefers_inline: bool,
    /// The element may hold paragraphs.
    pub can_contain_paragraph: bool,
    /// The element may sit inside a paragraph.
    pub can_be_in_paragraph: bool,
}

impl TagPolicy {
    /// Block element that may hold paragraphs. Used for unknown tags and components.
    pub const BLOCK: Self = Self {
        prefers_inline: false,
        can_contain_paragraph: true,
        can_be_in_paragraph: false,
    };

    /// Phrasing element.
    pub const PHRASING: Self = Self {
        prefers_inline: true,
        can_contain_paragraph: false,
        can_be_in_paragraph: true,
    };

    /// Block element that neither holds nor sits in paragraphs.
    pub const PARAGRAPH_LIKE: Self = Self {
        prefers_inline: false,
        can_contain_paragraph: false,
        can_be_in_paragraph: false,
    };
}

impl Default for TagPolicy {
    fn default() -> Self {
        Self::BLOCK
    }
}

const PHRASING_TAGS: &[&str] = &[
    "a", "abbr", "audio", "b", "bdi", "bdo", "br", "button", "canvas", "cite", "code", "data",
    "del", "dfn", "em", "embed", "i", "iframe", "img", "input", "ins", "kbd", "label", "mark",
    "math", "meter", "object", "output", "picture", "progress", "q", "s", "samp", "select",
    "small", "span", "strong", "sub", "sup", "svg", "textarea", "time", "u", "var", "video",
    "wbr",
];

const FLOW_CONTAINER_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "body",
    "dd",
    "details",
    "dialog",
    "div",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "header",
    "html",
    "li",
    "main",
    "nav",
    "search",
    "section",
    "td",
    "th",
];

const PARAGRAPH_LIKE_TAGS: &[&str] = &[
    "base", "caption", "col", "colgroup", "dl", "h1", "h2", "h3", "h4", "h5", "h6", "head",
    "hgroup", "hr", "legend", "link", "menu", "meta", "noscript", "ol", "optgroup", "option",
    "p", "pre", "script", "style", "summary", "table", "tbody", "tfoot", "thead", "title", "tr",
    "ul",
];

/// Elements that never have a closing tag.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Whether `name` is an HTML void element.
#[must_use]
pub fn is_void(name: &str) -> bool {
    VOID_TAGS.contains(&name.to_ascii_lowercase().as_str())
}

/// Maps tag names to [`TagPolicy`].
///
/// Registered components are matched by exact name and take precedence over
/// the builtin tables, which are matched case-insensitively.
#[derive(Clone, Debug, Default)]
pub struct TagClassifier {
    components: HashMap<String, TagPolicy>,
}

impl TagClassifier {
    /// Create a classifier that only knows the HTML builtins.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user component, replacing any earlier policy for the same name.
    pub fn register(&mut self, name: impl Into<String>, policy: TagPolicy) {
        self.components.insert(name.into(), policy);
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with_component(mut self, name: impl Into<String>, policy: TagPolicy) -> Self {
        self.register(name, policy);
        self
    }

    /// Policy for a tag name. Unknown names are block elements.
    #[must_use]
    pub fn classify(&self, name: &str) -> TagPolicy {
        if let Some(policy) = self.components.get(name) {
            return *policy;
        }
        let lower = name.to_ascii_lowercase();
        let lower = lower.as_str();
        if PHRASING_TAGS.contains(&lower) {
            TagPolicy::PHRASING
        } else if PARAGRAPH_LIKE_TAGS.contains(&lower) {
            TagPolicy::PARAGRAPH_LIKE
        } else if FLOW_CONTAINER_TAGS.contains(&lower) {
            TagPolicy::BLOCK
        } else {
            TagPolicy::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phrasing_builtins() {
        let classifier = TagClassifier::new();
        for name in ["a", "span", "em", "strong", "code", "img"] {
            assert_eq!(classifier.classify(name), TagPolicy::PHRASING, "{name}");
        }
    }

    #[test]
    fn test_flow_containers() {
        let classifier = TagClassifier::new();
        for name in ["div", "section", "li", "blockquote"] {
            assert_eq!(classifier.classify(name), TagPolicy::BLOCK, "{name}");
        }
    }

    #[test]
    fn test_paragraph_like_blocks() {
        let classifier = TagClassifier::new();
        for name in ["p", "h1", "h6", "pre", "ul", "ol", "table"] {
            assert_eq!(classifier.classify(name), TagPolicy::PARAGRAPH_LIKE, "{name}");
        }
    }

    #[test]
    fn test_builtins_are_case_insensitive() {
        let classifier = TagClassifier::new();
        assert_eq!(classifier.classify("SPAN"), TagPolicy::PHRASING);
    }

    #[test]
    fn test_unknown_tag_is_block() {
        let classifier = TagClassifier::new();
        assert_eq!(classifier.classify("Callout"), TagPolicy::BLOCK);
        assert_eq!(classifier.classify("my-widget"), TagPolicy::BLOCK);
    }

    #[test]
    fn test_registered_component_overrides_builtin() {
        let badge = TagPolicy {
            prefers_inline: true,
            can_contain_paragraph: false,
            can_be_in_paragraph: true,
        };
        let classifier = TagClassifier::new()
            .with_component("Badge", badge)
            .with_component("code", TagPolicy::BLOCK);

        assert_eq!(classifier.classify("Badge"), badge);
        assert_eq!(classifier.classify("code"), TagPolicy::BLOCK);
        assert_eq!(classifier.classify("badge"), TagPolicy::BLOCK);
    }

    #[test]
    fn test_void_elements() {
        assert!(is_void("br"));
        assert!(is_void("IMG"));
        assert!(!is_void("div"));
    }
}
