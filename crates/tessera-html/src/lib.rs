//! HTML layout helpers for running markdown over template documents.
//!
//! Markdown engines decide paragraph boundaries from blank lines and only know
//! the HTML block elements of the CommonMark spec list. Template documents are
//! full of components the engine has never heard of. This crate bridges the gap:
//!
//! - [`TagClassifier`]: which tags are inline, and which may hold or sit in a paragraph
//! - [`Normalizer`]: whitespace rewriting before markdown and paragraph repair after it
//! - [`sanitize`]: conservative tag-balance repair with canonical tag serialization
//! - [`token`]: opaque placeholder tokens and reversible escapes
//! - [`escape_html`] and friends: escaping for snippet output
//!
//! # Example
//!
//! ```
//! use tessera_html::{Normalizer, TagClassifier};
//!
//! let normalizer = Normalizer::new(TagClassifier::new());
//! let prepared = normalizer.prepare("<Note>\ntext\n</Note>");
//! assert_eq!(prepared.text, "<Note-tsrmark>\n\ntext\n\n</Note-tsrmark>");
//!
//! let html = "<Note-tsrmark>\n<p>text</p>\n</Note-tsrmark>\n";
//! assert_eq!(normalizer.cleanup(html, &prepared.escapes), "<Note>\n<p>text</p>\n</Note>\n");
//! ```

mod classifier;
mod escape;
mod normalize;
mod paragraph;
mod sanitize;
pub mod tag;
pub mod token;

pub use classifier::{TagClassifier, TagPolicy, is_void};
pub use escape::{escape_braces, escape_html, escape_html_and_braces};
pub use normalize::{ATTRIBUTE_ESCAPE_PREFIX, MARKER, Normalizer, Prepared, strip_markers};
pub use sanitize::{protect_literal_forms, sanitize};
