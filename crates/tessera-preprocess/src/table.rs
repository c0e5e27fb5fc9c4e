//! Placeholder table: token to snippet, and later to processed output.

use std::collections::HashMap;

use tessera_html::token;

use crate::snippet::{Snippet, UnescapeOptions};

/// Prefix of snippet placeholder tokens.
pub const SNIPPET_TOKEN_PREFIX: &str = "tsrsnip";

/// One table row.
#[derive(Clone, Debug)]
pub struct Entry {
    /// Placeholder standing in for the snippet in host text.
    pub token: String,
    /// The snippet itself.
    pub snippet: Snippet,
    /// Processor output, once dispatched.
    pub processed: Option<String>,
}

/// Ordered mapping from placeholder token to snippet.
///
/// Insertion order is document order.
#[derive(Clone, Debug, Default)]
pub struct PlaceholderTable {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl PlaceholderTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a snippet and return its token.
    ///
    /// The token is absent from `document` and from every token already in the table.
    pub fn insert(&mut self, snippet: Snippet, document: &str) -> String {
        let token = token::generate(SNIPPET_TOKEN_PREFIX, |t| {
            self.index.contains_key(t) || document.contains(t)
        });
        self.index.insert(token.clone(), self.entries.len());
        self.entries.push(Entry {
            token: token.clone(),
            snippet,
            processed: None,
        });
        token
    }

    /// Look up a row by token.
    #[must_use]
    pub fn get(&self, token: &str) -> Option<&Entry> {
        self.index.get(token).map(|&i| &self.entries[i])
    }

    /// Processed output and unescape options for a token.
    #[must_use]
    pub fn processed(&self, token: &str) -> Option<(&str, UnescapeOptions)> {
        let entry = self.get(token)?;
        let processed = entry.processed.as_deref()?;
        Some((processed, entry.snippet.unescape))
    }

    /// First row whose snippet matches `predicate`.
    pub(crate) fn find_mut(&mut self, predicate: impl Fn(&Snippet) -> bool) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| predicate(&e.snippet))
    }

    /// Rows in document order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// Snippets in document order.
    pub fn snippets(&self) -> impl Iterator<Item = &Snippet> {
        self.entries.iter().map(|e| &e.snippet)
    }

    /// Store processed output for every row, in document order.
    ///
    /// `outputs` must have one item per row.
    pub fn resolve(&mut self, outputs: Vec<String>) {
        debug_assert_eq!(outputs.len(), self.entries.len());
        for (entry, output) in self.entries.iter_mut().zip(outputs) {
            entry.processed = Some(output);
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snippet::{MathMode, SnippetOptions};

    fn math(inner: &str) -> Snippet {
        Snippet {
            range: 0..inner.len() + 4,
            raw_outer: format!("$${inner}$$"),
            raw_inner: inner.to_owned(),
            options: SnippetOptions::Math(MathMode::Display),
            unescape: UnescapeOptions {
                remove_paragraph: true,
            },
            line: 1,
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut table = PlaceholderTable::new();
        let a = table.insert(math("a"), "doc");
        let b = table.insert(math("b"), "doc");

        assert_ne!(a, b);
        assert!(a.starts_with(SNIPPET_TOKEN_PREFIX));
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&b).unwrap().snippet.raw_inner, "b");
        assert_eq!(table.get("missing").map(|e| &e.token), None);
    }

    #[test]
    fn test_iteration_is_insertion_order() {
        let mut table = PlaceholderTable::new();
        for inner in ["x", "y", "z"] {
            table.insert(math(inner), "");
        }
        let inners: Vec<_> = table.snippets().map(|s| s.raw_inner.as_str()).collect();
        assert_eq!(inners, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_resolve_upgrades_rows() {
        let mut table = PlaceholderTable::new();
        let token = table.insert(math("a"), "");
        assert_eq!(table.processed(&token), None);

        table.resolve(vec!["<div>a</div>".to_owned()]);
        let (html, unescape) = table.processed(&token).unwrap();
        assert_eq!(html, "<div>a</div>");
        assert!(unescape.remove_paragraph);
    }
}
