//! Opaque placeholder tokens.
//!
//! A token is a fixed alphabetic prefix followed by the 32 hex digits of a
//! random UUID. It holds only ASCII letters and digits, so neither markdown nor
//! the template language gives it any meaning and it survives both verbatim.

use std::collections::HashMap;
use std::ops::Range;

use memchr::memmem;

/// Number of hex digits after the prefix.
pub const TOKEN_HEX_LEN: usize = 32;

/// Generate a token that `is_taken` rejects for no existing text.
///
/// Collisions with 128 random bits do not happen in practice; the check makes
/// sure a document that happens to contain a token-shaped string is still safe.
pub fn generate(prefix: &str, is_taken: impl Fn(&str) -> bool) -> String {
    loop {
        let token = format!("{prefix}{}", uuid::Uuid::new_v4().simple());
        if !is_taken(&token) {
            return token;
        }
        tracing::debug!(token, "Regenerating colliding token");
    }
}

/// Iterator over the byte ranges of well-formed tokens with a given prefix.
pub struct TokenMatches<'a> {
    text: &'a str,
    finder: memmem::Finder<'a>,
    pos: usize,
}

impl<'a> TokenMatches<'a> {
    /// Scan `text` for tokens starting with `prefix`.
    #[must_use]
    pub fn new(text: &'a str, prefix: &'a str) -> Self {
        Self {
            text,
            finder: memmem::Finder::new(prefix.as_bytes()),
            pos: 0,
        }
    }
}

impl Iterator for TokenMatches<'_> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.text.as_bytes();
        let prefix_len = self.finder.needle().len();
        while self.pos < bytes.len() {
            let start = self.pos + self.finder.find(&bytes[self.pos..])?;
            let end = start + prefix_len + TOKEN_HEX_LEN;
            let well_formed = bytes
                .get(start + prefix_len..end)
                .is_some_and(|hex| hex.iter().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')));
            if well_formed {
                self.pos = end;
                return Some(start..end);
            }
            self.pos = start + 1;
        }
        None
    }
}

/// Reversible substitutions of text fragments by tokens.
///
/// Used to hide fragments from a pass that would otherwise rewrite them, then
/// put them back unchanged.
#[derive(Debug)]
pub struct Escapes {
    prefix: String,
    entries: HashMap<String, String>,
}

impl Escapes {
    /// Create an empty table whose tokens start with `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            entries: HashMap::new(),
        }
    }

    /// Register `original` and return the token that stands in for it.
    ///
    /// The token is unique within this table and absent from `context`.
    pub fn escape(&mut self, original: &str, context: &str) -> String {
        let token = generate(&self.prefix, |t| {
            self.entries.contains_key(t) || context.contains(t)
        });
        self.entries.insert(token.clone(), original.to_owned());
        token
    }

    /// Replace every known token in `text` with its original, in one pass.
    ///
    /// Token-shaped strings that this table did not produce are left alone.
    #[must_use]
    pub fn restore(&self, text: &str) -> String {
        if self.entries.is_empty() {
            return text.to_owned();
        }
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for range in TokenMatches::new(text, &self.prefix) {
            if let Some(original) = self.entries.get(&text[range.clone()]) {
                out.push_str(&text[last..range.start]);
                out.push_str(original);
                last = range.end;
            }
        }
        out.push_str(&text[last..]);
        out
    }

    /// Number of registered fragments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been escaped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generated_token_shape() {
        let token = generate("tsrtest", |_| false);
        assert_eq!(token.len(), "tsrtest".len() + TOKEN_HEX_LEN);
        assert!(token.starts_with("tsrtest"));
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generation_retries_on_collision() {
        let first = generate("p", |_| false);
        let calls = std::cell::Cell::new(0);
        let token = generate("p", |t| {
            calls.set(calls.get() + 1);
            calls.get() == 1 || t == first
        });
        assert!(calls.get() >= 2);
        assert_ne!(token, first);
    }

    #[test]
    fn test_token_matches_skip_malformed() {
        let good = format!("pfx{}", "a".repeat(TOKEN_HEX_LEN));
        let text = format!("pfxZZ {good} pfx12");
        let ranges: Vec<_> = TokenMatches::new(&text, "pfx").collect();
        assert_eq!(ranges, vec![6..6 + good.len()]);
    }

    #[test]
    fn test_escape_and_restore() {
        let mut escapes = Escapes::new("tsrtest");
        let text = r#"<Foo a="{x}" b={y}>"#;
        let x = escapes.escape("{x}", text);
        let y = escapes.escape("{y}", text);
        let hidden = format!(r#"<Foo a="{x}" b={y}>"#);

        assert_eq!(escapes.len(), 2);
        assert_eq!(escapes.restore(&hidden), text);
    }

    #[test]
    fn test_restore_leaves_foreign_tokens() {
        let escapes = {
            let mut e = Escapes::new("tsrtest");
            e.escape("x", "");
            e
        };
        let foreign = format!("tsrtest{}", "0".repeat(TOKEN_HEX_LEN));
        assert_eq!(escapes.restore(&foreign), foreign);
    }
}
