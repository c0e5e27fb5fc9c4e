//! Markdown preprocessing for component templates.
//!
//! A document mixes markdown with template markup, math, code, verbatim
//! environments and frontmatter. Running a markdown engine over it directly
//! mangles everything that is not markdown. This crate cuts those regions out
//! first, processes them in parallel, runs markdown over what is left and puts
//! the processed regions back.
//!
//! # Stages
//!
//! - [`Segmenter`]: finds snippets and swaps each for an opaque token
//! - dispatch: runs every snippet through its capability on the rayon pool
//! - [`HostMarkdownPass`]: pre-transform, markdown engine, post-transform
//! - reassembly: token substitution, paragraph repair and script/head placement
//!
//! [`Pipeline`] runs the stages for one document. [`Preprocessor`] wraps a
//! pipeline in the markup and script hooks a template compiler calls.
//!
//! # Example
//!
//! ```
//! use tessera_preprocess::{Document, Pipeline};
//!
//! let pipeline = Pipeline::builder().build().unwrap();
//! let processed = pipeline.process(&Document::new("Some *text* and `code`")).unwrap();
//! assert!(processed.html.contains("<em>text</em>"));
//! assert!(processed.html.contains("<code>code</code>"));
//! ```

pub mod backends;
mod capability;
mod context;
mod dispatch;
mod error;
pub mod frontmatter;
mod markdown_pass;
mod pipeline;
mod preprocessor;
mod reassemble;
pub mod segment;
mod snippet;
mod table;

pub use capability::{
    CodeProcessor, MarkdownEngine, MathProcessor, VerbatimOutput, VerbatimProcessor,
    VerbatimRequest,
};
pub use context::{SideChannel, SideChannelLines, StructurePresence};
pub use error::{CapabilityError, PreprocessError, SetupError};
pub use markdown_pass::{HostMarkdownPass, PostTransform, PostTransformInput, PreTransform};
pub use pipeline::{Document, Pipeline, PipelineBuilder, Processed};
pub use preprocessor::{MarkupOutput, Preprocessor, ScriptOutput};
pub use reassemble::ScriptPlacement;
pub use segment::{Segmented, Segmenter, SegmenterOptions, VerbatimEnvironment};
pub use snippet::{
    Attributes, CodeOptions, Diagnostic, FrontmatterFormat, MathMode, Severity, Snippet,
    SnippetKind, SnippetOptions, StructuralKind, UnescapeOptions, VerbatimOptions, line_at,
};
pub use table::{Entry, PlaceholderTable, SNIPPET_TOKEN_PREFIX};
