//! The preprocessing pipeline.
//!
//! Segmenter, dispatcher, markdown pass and reassembler run in sequence for
//! one document. A [`Pipeline`] holds no per-document state and can serve
//! many documents concurrently.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value};
use tessera_cache::Cache;
use tessera_config::{
    CodeBackendKind, Config, MarkdownBackendKind, MathBackendKind, MathConfig, RESERVED_TAG_NAMES,
    VerbatimKind, is_valid_tag_name,
};
use tessera_html::{Normalizer, TagClassifier, TagPolicy};

use crate::backends::{
    CodeBackend, MarkdownBackend, MathBackend, VERBATIM_BUCKET, VerbatimBackend, is_valid_wrapper,
};
use crate::context::{SideChannel, SideChannelLines};
use crate::dispatch::{Capabilities, dispatch};
use crate::error::{PreprocessError, SetupError};
use crate::markdown_pass::{HostMarkdownPass, PostTransform, PostTransformInput, PreTransform};
use crate::reassemble::{ScriptPlacement, place_lines, restore, substitute};
use crate::segment::{Segmented, Segmenter, SegmenterOptions, VerbatimEnvironment};
use crate::snippet::Diagnostic;

/// Version mixed into verbatim cache keys.
const CACHE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A document to process.
#[derive(Clone, Copy, Debug)]
pub struct Document<'a> {
    /// Full text.
    pub text: &'a str,
    /// Identifier used in diagnostics and by verbatim backends.
    pub filename: Option<&'a str>,
}

impl<'a> Document<'a> {
    /// Document without a filename.
    #[must_use]
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            filename: None,
        }
    }

    /// Set the filename.
    #[must_use]
    pub fn with_filename(mut self, filename: &'a str) -> Self {
        self.filename = Some(filename);
        self
    }
}

/// Result of processing one document.
#[derive(Debug)]
pub struct Processed {
    /// Final markup.
    pub html: String,
    /// Script and module lines left for the host's script hook (deferred placement only).
    pub deferred: SideChannelLines,
    /// Files the output was built from.
    pub dependencies: Vec<PathBuf>,
    /// Problems that did not stop processing.
    pub diagnostics: Vec<Diagnostic>,
    /// Parsed frontmatter record.
    pub frontmatter: Option<Map<String, Value>>,
}

/// Preprocessing pipeline.
pub struct Pipeline {
    segmenter: Segmenter,
    normalizer: Normalizer,
    markdown: HostMarkdownPass,
    code: CodeBackend,
    math: MathBackend,
    verbatim: HashMap<String, VerbatimBackend>,
    placement: ScriptPlacement,
}

impl Pipeline {
    /// Start building a pipeline with default backends.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Build a pipeline from configuration.
    ///
    /// Verbatim environments with `cache = true` store output in `cache`.
    pub fn from_config(config: &Config, cache: &dyn Cache) -> Result<Self, SetupError> {
        Self::builder_from_config(config, cache)?.build()
    }

    /// Builder preloaded from configuration, for adding transforms or custom backends.
    pub fn builder_from_config(
        config: &Config,
        cache: &dyn Cache,
    ) -> Result<PipelineBuilder, SetupError> {
        config.validate()?;

        let markdown = match config.markdown.backend {
            MarkdownBackendKind::PulldownCmark => MarkdownBackend::PulldownCmark {
                gfm: config.markdown.gfm,
            },
            MarkdownBackendKind::None => MarkdownBackend::Passthrough,
        };
        let code = match config.code.backend {
            CodeBackendKind::Escape => CodeBackend::Escape {
                stylesheet: config.code.stylesheet.clone(),
            },
        };
        let math = MathBackend::MathJax {
            script_src: config.math.script_src.clone(),
        };
        let (dollars, brackets) = match config.math.backend {
            MathBackendKind::Mathjax => (config.math.dollars, config.math.brackets),
            MathBackendKind::None => (false, false),
        };
        let mut builder = Self::builder()
            .markdown(markdown)
            .code(code)
            .math(math)
            .math_delimiters(dollars, brackets)
            .tilde_spans(config.code.tilde_spans)
            .directives(config.directives.enabled);

        for (name, component) in &config.components {
            builder = builder.component(
                name,
                TagPolicy {
                    prefers_inline: component.prefers_inline,
                    can_contain_paragraph: component.can_contain_paragraph,
                    can_be_in_paragraph: component.can_be_in_paragraph,
                },
            );
        }

        for (name, env) in &config.verbatim {
            let backend = match env.kind {
                VerbatimKind::Escape => VerbatimBackend::Escape {
                    wrap: env.wrap.clone().unwrap_or_else(|| "pre".to_owned()),
                },
                VerbatimKind::Raw => VerbatimBackend::Raw,
                VerbatimKind::Code => VerbatimBackend::Code {
                    language: env.language.clone(),
                },
            };
            let backend = if env.cache {
                backend.cached(cache.bucket(VERBATIM_BUCKET), CACHE_VERSION)
            } else {
                backend
            };
            let environment = VerbatimEnvironment {
                name: name.clone(),
                aliases: env.aliases.clone(),
                remove_paragraph: env.remove_paragraph,
            };
            builder = builder.verbatim(environment, backend);
        }
        Ok(builder)
    }

    /// Split a document into host text and snippets without processing them.
    #[must_use]
    pub fn segment(&self, text: &str) -> Segmented {
        self.segmenter.segment(text)
    }

    /// Script placement in use.
    #[must_use]
    pub fn placement(&self) -> ScriptPlacement {
        self.placement
    }

    /// Process one document.
    pub fn process(&self, document: &Document<'_>) -> Result<Processed, PreprocessError> {
        let Segmented {
            host,
            mut table,
            mut diagnostics,
        } = self.segmenter.segment(document.text);

        let side_channel = SideChannel::new();
        let capabilities = Capabilities {
            code: &self.code,
            math: &self.math,
            verbatim: &self.verbatim,
        };
        let dispatched = dispatch(&mut table, &capabilities, &side_channel, document.filename)?;
        diagnostics.extend(dispatched.diagnostics);
        let frontmatter = dispatched.frontmatter;

        let empty = Map::new();
        let markdown_input = self
            .markdown
            .pre_transform(&host, frontmatter.as_ref().unwrap_or(&empty));
        let prepared = self.normalizer.prepare(&markdown_input);
        let html = self.markdown.render(&prepared.text, document.text)?;

        let html = substitute(&html, &table);
        let html = self.normalizer.cleanup(&html, &prepared.escapes);

        let mut lines = side_channel.take();
        let prefix = place_lines(&mut table, side_channel.structure(), &lines, self.placement);
        let html = format!("{prefix}{}", restore(&html, &table));
        let dependencies = std::mem::take(&mut lines.dependencies);
        let deferred = match self.placement {
            ScriptPlacement::Inline => SideChannelLines::default(),
            ScriptPlacement::Deferred => SideChannelLines {
                script: lines.script,
                module: lines.module,
                ..SideChannelLines::default()
            },
        };

        tracing::debug!(
            filename = document.filename.unwrap_or("<input>"),
            snippets = table.len(),
            diagnostics = diagnostics.len(),
            "Processed document"
        );
        Ok(Processed {
            html,
            deferred,
            dependencies,
            diagnostics,
            frontmatter,
        })
    }
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    markdown: MarkdownBackend,
    code: CodeBackend,
    math: MathBackend,
    environments: Vec<(VerbatimEnvironment, VerbatimBackend)>,
    classifier: TagClassifier,
    segmenter: SegmenterOptions,
    pre: Option<PreTransform>,
    post: Option<PostTransform>,
    placement: ScriptPlacement,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            markdown: MarkdownBackend::default(),
            code: CodeBackend::default(),
            math: MathBackend::MathJax {
                script_src: MathConfig::default().script_src,
            },
            environments: Vec::new(),
            classifier: TagClassifier::new(),
            segmenter: SegmenterOptions::default(),
            pre: None,
            post: None,
            placement: ScriptPlacement::default(),
        }
    }
}

impl PipelineBuilder {
    /// Set the markdown engine.
    #[must_use]
    pub fn markdown(mut self, backend: MarkdownBackend) -> Self {
        self.markdown = backend;
        self
    }

    /// Set the code backend.
    #[must_use]
    pub fn code(mut self, backend: CodeBackend) -> Self {
        self.code = backend;
        self
    }

    /// Set the math backend.
    #[must_use]
    pub fn math(mut self, backend: MathBackend) -> Self {
        self.math = backend;
        self
    }

    /// Add a verbatim environment.
    #[must_use]
    pub fn verbatim(mut self, environment: VerbatimEnvironment, backend: VerbatimBackend) -> Self {
        self.environments.push((environment, backend));
        self
    }

    /// Register a layout policy for a component.
    #[must_use]
    pub fn component(mut self, name: impl Into<String>, policy: TagPolicy) -> Self {
        self.classifier.register(name, policy);
        self
    }

    /// Enable or disable `$` and `\(`/`\[` math delimiters.
    #[must_use]
    pub fn math_delimiters(mut self, dollars: bool, brackets: bool) -> Self {
        self.segmenter.math_dollars = dollars;
        self.segmenter.math_brackets = brackets;
        self
    }

    /// Treat `~text~` as inline code.
    #[must_use]
    pub fn tilde_spans(mut self, enabled: bool) -> Self {
        self.segmenter.tilde_spans = enabled;
        self
    }

    /// Recognize `:name[...]{...}` directives.
    #[must_use]
    pub fn directives(mut self, enabled: bool) -> Self {
        self.segmenter.directives = enabled;
        self
    }

    /// Rewrite host text before markdown.
    #[must_use]
    pub fn pre_transform(
        mut self,
        transform: impl Fn(&str, &Map<String, Value>) -> String + Send + Sync + 'static,
    ) -> Self {
        self.pre = Some(Arc::new(transform));
        self
    }

    /// Rewrite markdown output.
    #[must_use]
    pub fn post_transform(
        mut self,
        transform: impl Fn(&PostTransformInput<'_>) -> String + Send + Sync + 'static,
    ) -> Self {
        self.post = Some(Arc::new(transform));
        self
    }

    /// Choose where script lines go.
    #[must_use]
    pub fn placement(mut self, placement: ScriptPlacement) -> Self {
        self.placement = placement;
        self
    }

    /// Validate environment names and build the pipeline.
    pub fn build(self) -> Result<Pipeline, SetupError> {
        let mut seen = HashSet::new();
        let mut verbatim = HashMap::new();
        let mut segmenter = self.segmenter;

        for (environment, backend) in self.environments {
            for name in std::iter::once(&environment.name).chain(&environment.aliases) {
                if !is_valid_tag_name(name) {
                    return Err(SetupError::InvalidTagName(name.clone()));
                }
                if RESERVED_TAG_NAMES.contains(&name.as_str()) || name.starts_with("svelte:") {
                    return Err(SetupError::ReservedTagName(name.clone()));
                }
                if !seen.insert(name.clone()) {
                    return Err(SetupError::DuplicateEnvironment(name.clone()));
                }
            }
            if let VerbatimBackend::Escape { wrap } = &backend
                && !is_valid_wrapper(wrap)
            {
                return Err(SetupError::InvalidTagName(wrap.clone()));
            }
            verbatim.insert(environment.name.clone(), backend);
            segmenter.verbatim.push(environment);
        }

        tracing::debug!(environments = verbatim.len(), "Built pipeline");
        Ok(Pipeline {
            segmenter: Segmenter::new(segmenter),
            normalizer: Normalizer::new(self.classifier),
            markdown: HostMarkdownPass::new(self.markdown, self.pre, self.post),
            code: self.code,
            math: self.math,
            verbatim,
            placement: self.placement,
        })
    }
}

#[cfg(test)]
mod tests {
    use tessera_cache::{MemoryCache, NullCache};

    use super::*;
    use crate::snippet::{SnippetKind, SnippetOptions};
    use pretty_assertions::assert_eq;

    fn process(pipeline: &Pipeline, text: &str) -> Processed {
        pipeline.process(&Document::new(text)).unwrap()
    }

    #[test]
    fn test_plain_markdown_matches_engine() {
        let pipeline = Pipeline::builder().build().unwrap();
        let text = "# Title\n\nSome *text* and a [link](/a).\n\n- one\n- two\n";
        let engine = MarkdownBackend::default();
        let expected = crate::capability::MarkdownEngine::process(&engine, text).unwrap();

        let processed = process(&pipeline, text);
        assert_eq!(processed.html, format!("<script>\n</script>\n{expected}"));
    }

    #[test]
    fn test_empty_script_block_without_frontmatter() {
        let pipeline = Pipeline::builder().build().unwrap();
        assert!(process(&pipeline, "text").html.starts_with("<script>\n</script>\n"));
    }

    #[test]
    fn test_display_math_is_not_wrapped_in_paragraph() {
        let pipeline = Pipeline::builder().build().unwrap();
        let html = process(&pipeline, "Before\n\n$$x^2$$\n\nAfter").html;
        assert_eq!(
            html,
            concat!(
                "<script>\n</script>\n",
                "<svelte:head>\n",
                "<script id=\"MathJax-script\" async src=\"https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-chtml.js\"></script>\n",
                "</svelte:head>\n",
                "<p>Before</p>\n",
                "<div class=\"math math-display\">\\[x^2\\]</div>\n",
                "<p>After</p>\n",
            )
        );
    }

    #[test]
    fn test_code_is_opaque_to_markdown() {
        let pipeline = Pipeline::builder().build().unwrap();
        let html = process(&pipeline, "```md\n# not a heading {x}\n```\n").html;
        assert!(html.contains(
            "<pre><code class=\"language-md\"># not a heading &lbrace;x&rbrace;</code></pre>"
        ));
        assert!(!html.contains("<h1>"));
    }

    #[test]
    fn test_verbatim_content_untouched() {
        let pipeline = Pipeline::builder()
            .verbatim(VerbatimEnvironment::new("Raw"), VerbatimBackend::Raw)
            .build()
            .unwrap();
        let html = process(&pipeline, "<Raw>\n*a* $b$ <Raw>`c`</Raw>\n</Raw>\n").html;
        assert!(html.contains("\n*a* $b$ <Raw>`c`</Raw>\n"), "{html}");
    }

    #[test]
    fn test_component_never_in_paragraph() {
        let pipeline = Pipeline::builder()
            .component("Foo", TagPolicy::BLOCK)
            .build()
            .unwrap();
        let html = process(&pipeline, "<Foo>\n\ntext\n\n</Foo>").html;
        assert!(!html.contains("<p><Foo"), "{html}");
        assert!(html.contains("<Foo>"), "{html}");
        assert!(html.contains("<p>text</p>"), "{html}");
    }

    #[test]
    fn test_frontmatter_head_and_module() {
        let pipeline = Pipeline::builder().build().unwrap();
        let processed = process(&pipeline, "---\nauthor: Jane Doe\n---\n\nHello");
        assert_eq!(
            processed.html,
            concat!(
                "<script context=\"module\">\n",
                "export const metadata = {\"author\":\"Jane Doe\"};\n",
                "</script>\n",
                "<script>\n</script>\n",
                "<svelte:head>\n",
                "<meta name=\"author\" content=\"Jane Doe\">\n",
                "</svelte:head>\n",
                "<p>Hello</p>\n",
            )
        );
        assert!(processed.frontmatter.is_some());
    }

    #[test]
    fn test_existing_scripts_receive_lines() {
        let pipeline = Pipeline::builder().build().unwrap();
        let text = "---\nimports: ./a.css\n---\n\n<script>\nlet x = 1;\n</script>\n\nHi {x}";
        let html = process(&pipeline, text).html;
        assert!(html.contains("<script>\nlet x = 1;\nimport './a.css';\n</script>"), "{html}");
        assert!(html.contains("<p>Hi {x}</p>"), "{html}");
    }

    #[test]
    fn test_lines_join_existing_head_and_new_instance_script() {
        let pipeline = Pipeline::builder().build().unwrap();
        let text = "---\nimports: ./a.css\n---\n\n<svelte:head><title>x</title></svelte:head>\n\n$x$\n";
        let html = process(&pipeline, text).html;

        assert!(html.contains("<script>\nimport './a.css';\n</script>\n"), "{html}");
        assert!(
            html.contains(concat!(
                "<svelte:head><title>x</title>\n",
                "<script id=\"MathJax-script\" async src=\"https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-chtml.js\"></script>\n",
                "</svelte:head>",
            )),
            "{html}"
        );
        assert_eq!(html.matches("<svelte:head>").count(), 1);
        assert_eq!(html.matches("import './a.css';").count(), 1);
    }

    #[test]
    fn test_script_and_style_bodies_survive_cleanup() {
        let pipeline = Pipeline::builder().build().unwrap();
        let text = concat!(
            "<script>\nconst s = \"<p><div>x</div></p>\";\n</script>\n\n",
            "<style>\n/* <p><section>x</section></p> */\n</style>\n\n",
            "text\n",
        );
        let html = process(&pipeline, text).html;
        assert_eq!(
            html,
            concat!(
                "<script>\nconst s = \"<p><div>x</div></p>\";\n</script>\n",
                "<style>\n/* <p><section>x</section></p> */\n</style>\n",
                "<p>text</p>\n",
            )
        );
    }

    #[test]
    fn test_verbatim_output_survives_cleanup() {
        let pipeline = Pipeline::builder()
            .verbatim(VerbatimEnvironment::new("Raw"), VerbatimBackend::Raw)
            .build()
            .unwrap();
        let html = process(&pipeline, "<Raw><p><div>x</div></p></Raw>\n").html;
        assert!(html.contains("<p><div>x</div></p>"), "{html}");
    }

    #[test]
    fn test_block_tags_wrap_rendered_markdown() {
        let pipeline = Pipeline::builder().build().unwrap();
        let html = process(&pipeline, "{#if a}\n\n*x*\n\n{/if}\n").html;
        assert!(html.contains("{#if a}\n<p><em>x</em></p>\n{/if}\n"), "{html}");
        assert!(!html.contains("<p>{"), "{html}");
    }

    #[test]
    fn test_adjacent_structural_blocks_are_not_wrapped() {
        let pipeline = Pipeline::builder().build().unwrap();
        let html = process(&pipeline, "<style>p { color: red }</style>\n<script>let x;</script>\n").html;
        assert_eq!(html, "<style>p { color: red }</style>\n<script>let x;</script>\n");
    }

    #[test]
    fn test_fenced_code_in_block_quote() {
        let pipeline = Pipeline::builder().build().unwrap();
        let html = process(&pipeline, "> ```js\n> let a = 1;\n> ```\n").html;
        assert!(
            html.contains(
                "<blockquote>\n<pre><code class=\"language-js\">let a = 1;</code></pre>\n</blockquote>"
            ),
            "{html}"
        );
        assert!(!html.contains("<code>js"), "{html}");
    }

    #[test]
    fn test_deferred_placement() {
        let pipeline = Pipeline::builder()
            .placement(ScriptPlacement::Deferred)
            .build()
            .unwrap();
        let processed = process(&pipeline, "---\nimports: ./a.css\n---\ntext");
        assert!(processed.html.starts_with("<script context=\"module\">\n</script>\n<script>\n</script>\n"));
        assert_eq!(processed.deferred.script, vec!["import './a.css';"]);
        assert_eq!(processed.deferred.module.len(), 1);
    }

    #[test]
    fn test_mustache_in_attribute_survives() {
        let pipeline = Pipeline::builder().build().unwrap();
        let html = process(&pipeline, "<a href=\"{url}\" class=\"\">go</a>").html;
        assert!(html.contains("<a href=\"{url}\" class=\"\">go</a>"), "{html}");
    }

    #[test]
    fn test_transforms_run_around_markdown() {
        let pipeline = Pipeline::builder()
            .pre_transform(|text, _| text.replace("TODAY", "Monday"))
            .post_transform(|input| input.html.replace("<p>", "<p class=\"x\">"))
            .build()
            .unwrap();
        let html = process(&pipeline, "It is TODAY").html;
        assert!(html.ends_with("<p class=\"x\">It is Monday</p>\n"), "{html}");
    }

    #[test]
    fn test_snippet_failure_fails_document() {
        struct Failing;
        impl crate::capability::CodeProcessor for Failing {
            fn process(
                &self,
                _inner: &str,
                _options: &crate::snippet::CodeOptions,
            ) -> Result<String, crate::error::CapabilityError> {
                Err(crate::error::CapabilityError::message("boom"))
            }
        }
        let pipeline = Pipeline::builder()
            .code(CodeBackend::Custom(Box::new(Failing)))
            .build()
            .unwrap();
        let err = pipeline.process(&Document::new("a\n\n`x`")).unwrap_err();
        assert_eq!(err.to_string(), "failed to process code snippet at line 3");
    }

    #[test]
    fn test_unclosed_opener_is_diagnostic() {
        let pipeline = Pipeline::builder().build().unwrap();
        let processed = process(&pipeline, "a $$b");
        assert_eq!(processed.diagnostics.len(), 1);
        assert!(processed.html.contains("a $$b"));
    }

    #[test]
    fn test_builder_rejects_bad_environments() {
        let build = |name: &str| {
            Pipeline::builder()
                .verbatim(VerbatimEnvironment::new(name), VerbatimBackend::Raw)
                .build()
        };
        assert!(matches!(build("1abc"), Err(SetupError::InvalidTagName(_))));
        assert!(matches!(build("script"), Err(SetupError::ReservedTagName(_))));
        assert!(matches!(build("svelte:window"), Err(SetupError::ReservedTagName(_))));

        let duplicate = Pipeline::builder()
            .verbatim(VerbatimEnvironment::new("A").alias("B"), VerbatimBackend::Raw)
            .verbatim(VerbatimEnvironment::new("B"), VerbatimBackend::Raw)
            .build();
        assert!(matches!(duplicate, Err(SetupError::DuplicateEnvironment(name)) if name == "B"));
    }

    #[test]
    fn test_from_config() {
        let config = Config::from_toml_str(
            r#"
[math]
dollars = false

[verbatim.Tex]
type = "code"
language = "latex"
aliases = ["TeX"]

[verbatim.Box]
type = "escape"
wrap = "div"
cache = true
"#,
            std::path::Path::new("."),
        )
        .unwrap();
        let cache = MemoryCache::new();
        let pipeline = Pipeline::from_config(&config, &cache).unwrap();

        let segmented = pipeline.segment("$a$ <TeX>\\x</TeX>");
        let kinds: Vec<_> = segmented.table.snippets().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec![SnippetKind::Verbatim]);
        let SnippetOptions::Verbatim(options) = &segmented.table.snippets().next().unwrap().options
        else {
            panic!("expected verbatim");
        };
        assert_eq!(options.environment, "Tex");

        let html = process(&pipeline, "<Box>a<b</Box>").html;
        assert!(html.contains("<div>a&lt;b</div>"), "{html}");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_from_config_without_math() {
        let config =
            Config::from_toml_str("[math]\nbackend = \"none\"\n", std::path::Path::new(".")).unwrap();
        let pipeline = Pipeline::from_config(&config, &NullCache).unwrap();

        assert!(pipeline.segment("$x$").table.is_empty());
        let html = process(&pipeline, "$x$\n").html;
        assert!(html.contains("<p>$x$</p>"), "{html}");
        assert!(!html.contains("MathJax"), "{html}");
    }

    #[test]
    fn test_verbatim_output_persists_in_file_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_toml_str(
            "[verbatim.Box]\ntype = \"escape\"\ncache = true\n",
            std::path::Path::new("."),
        )
        .unwrap();

        for _ in 0..2 {
            let cache = tessera_cache::FileCache::new(dir.path().to_path_buf(), "1");
            let pipeline = Pipeline::from_config(&config, &cache).unwrap();
            let html = process(&pipeline, "<Box>{x}</Box>").html;
            assert!(html.contains("<pre>&lbrace;x&rbrace;</pre>"), "{html}");
        }

        let entries: Vec<_> = std::fs::read_dir(dir.path().join(VERBATIM_BUCKET))
            .unwrap()
            .flat_map(|shard| std::fs::read_dir(shard.unwrap().path()).unwrap())
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_builder_rejects_bad_wrapper() {
        let result = Pipeline::builder()
            .verbatim(
                VerbatimEnvironment::new("Box"),
                VerbatimBackend::Escape {
                    wrap: "not a tag".to_owned(),
                },
            )
            .build();
        assert!(matches!(result, Err(SetupError::InvalidTagName(name)) if name == "not a tag"));
    }

    #[test]
    fn test_from_config_reports_invalid_config() {
        let mut config = Config::default();
        config.preprocess.extensions.clear();
        assert!(matches!(
            Pipeline::from_config(&config, &NullCache),
            Err(SetupError::Config(_))
        ));
    }

    #[test]
    fn test_concurrent_documents() {
        use rayon::prelude::*;

        let pipeline = Pipeline::builder().build().unwrap();
        let outputs: Vec<String> = (0..16)
            .into_par_iter()
            .map(|i| process(&pipeline, &format!("$x_{{{i}}}$")).html)
            .collect();
        for (i, html) in outputs.iter().enumerate() {
            assert!(html.contains(&format!("x_&lbrace;{i}&rbrace;")), "{html}");
        }
    }
}
