//! Host-facing preprocessor hooks.
//!
//! The host calls [`Preprocessor::markup`] on a whole file, then
//! [`Preprocessor::script`] on each of its script blocks. Lines recorded while
//! processing the markup are handed to the script phase of the same file
//! exactly once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tessera_cache::Cache;
use tessera_config::Config;

use crate::context::SideChannelLines;
use crate::error::{PreprocessError, SetupError};
use crate::pipeline::{Document, Pipeline};
use crate::reassemble::ScriptPlacement;
use crate::snippet::Diagnostic;

/// Result of the markup hook.
#[derive(Debug)]
pub struct MarkupOutput {
    /// Processed markup.
    pub code: String,
    /// Files the output depends on.
    pub source_dependencies: Vec<PathBuf>,
    /// Problems that did not stop processing.
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of the script hook.
#[derive(Debug, PartialEq, Eq)]
pub struct ScriptOutput {
    /// Script content with the recorded lines appended.
    pub code: String,
}

/// Markup and script hooks around a [`Pipeline`].
pub struct Preprocessor {
    pipeline: Pipeline,
    extensions: Vec<String>,
    pending: Mutex<HashMap<String, SideChannelLines>>,
}

impl Preprocessor {
    /// Wrap a pipeline. Files whose name ends with one of `extensions` are claimed.
    ///
    /// With [`ScriptPlacement::Inline`] the markup already holds every line and
    /// the script hook has nothing to add.
    #[must_use]
    pub fn new(pipeline: Pipeline, extensions: Vec<String>) -> Self {
        Self {
            pipeline,
            extensions,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Build a preprocessor with deferred script placement from configuration.
    pub fn from_config(config: &Config, cache: &dyn Cache) -> Result<Self, SetupError> {
        let pipeline = Pipeline::builder_from_config(config, cache)?
            .placement(ScriptPlacement::Deferred)
            .build()?;
        Ok(Self::new(pipeline, config.preprocess.extensions.clone()))
    }

    /// Underlying pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Whether `filename` has a claimed extension.
    #[must_use]
    pub fn claims(&self, filename: &str) -> bool {
        let name = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(filename);
        self.extensions
            .iter()
            .any(|ext| name.len() > ext.len() && name.ends_with(ext.as_str()))
    }

    /// Process the markup of a file.
    ///
    /// Returns `Ok(None)` when the file is not claimed.
    pub fn markup(
        &self,
        content: &str,
        filename: &str,
    ) -> Result<Option<MarkupOutput>, PreprocessError> {
        if !self.claims(filename) {
            return Ok(None);
        }
        let processed = self
            .pipeline
            .process(&Document::new(content).with_filename(filename))?;

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if processed.deferred.script.is_empty() && processed.deferred.module.is_empty() {
            pending.remove(filename);
        } else {
            pending.insert(filename.to_owned(), processed.deferred);
        }

        Ok(Some(MarkupOutput {
            code: processed.html,
            source_dependencies: processed.dependencies,
            diagnostics: processed.diagnostics,
        }))
    }

    /// Append the lines recorded for `filename` to a script block.
    ///
    /// Module blocks (`context="module"` or a bare `module` attribute) get the
    /// module lines, other blocks the instance lines. Each set is handed out once.
    pub fn script(
        &self,
        content: &str,
        attributes: &[(String, String)],
        filename: &str,
    ) -> Option<ScriptOutput> {
        let module = attributes.iter().any(|(name, value)| match name.as_str() {
            "module" => true,
            "context" => value == "module",
            _ => false,
        });

        let lines = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            let entry = pending.get_mut(filename)?;
            let lines = if module {
                std::mem::take(&mut entry.module)
            } else {
                std::mem::take(&mut entry.script)
            };
            if entry.script.is_empty() && entry.module.is_empty() {
                pending.remove(filename);
            }
            lines
        };
        if lines.is_empty() {
            return None;
        }

        let mut code = content.to_owned();
        if !code.is_empty() && !code.ends_with('\n') {
            code.push('\n');
        }
        for line in lines {
            code.push_str(&line);
            code.push('\n');
        }
        tracing::debug!(filename, module, "Appended recorded script lines");
        Some(ScriptOutput { code })
    }
}

#[cfg(test)]
mod tests {
    use tessera_cache::NullCache;

    use super::*;
    use pretty_assertions::assert_eq;

    fn preprocessor() -> Preprocessor {
        Preprocessor::from_config(&Config::default(), &NullCache).unwrap()
    }

    #[test]
    fn test_unclaimed_extension() {
        let pre = preprocessor();
        assert!(pre.markup("x", "App.svelte").unwrap().is_none());
        assert!(pre.claims("docs/intro.md"));
        assert!(pre.claims("page.sveltex"));
        assert!(!pre.claims(".md"));
    }

    #[test]
    fn test_markup_then_script() {
        let pre = preprocessor();
        let text = "---\ntitle: T\nimports: ./a.css\n---\n\nHello";
        let markup = pre.markup(text, "page.md").unwrap().unwrap();
        assert!(markup.code.contains("<script>\n</script>\n"));
        assert!(markup.code.contains("<title>T</title>"));

        let instance = pre.script("\nlet x;", &[], "page.md").unwrap();
        assert_eq!(instance.code, "\nlet x;\nimport './a.css';\n");

        let module_attrs = vec![("context".to_owned(), "module".to_owned())];
        let module = pre.script("", &module_attrs, "page.md").unwrap();
        assert_eq!(module.code, "export const metadata = {\"imports\":\"./a.css\",\"title\":\"T\"};\n");

        assert_eq!(pre.script("", &[], "page.md"), None);
        assert_eq!(pre.script("", &module_attrs, "page.md"), None);
    }

    #[test]
    fn test_files_are_independent() {
        let pre = preprocessor();
        pre.markup("---\nimports: ./a.js\n---\n", "a.md").unwrap();
        pre.markup("---\nimports: ./b.js\n---\n", "b.md").unwrap();

        assert_eq!(pre.script("", &[], "b.md").unwrap().code, "import './b.js';\n");
        assert_eq!(pre.script("", &[], "a.md").unwrap().code, "import './a.js';\n");
    }

    #[test]
    fn test_reprocessing_replaces_pending_lines() {
        let pre = preprocessor();
        pre.markup("---\nimports: ./old.js\n---\n", "a.md").unwrap();
        pre.markup("plain", "a.md").unwrap();
        assert_eq!(pre.script("", &[], "a.md"), None);
    }

    #[test]
    fn test_errors_propagate() {
        let pipeline = Pipeline::builder()
            .code(crate::backends::CodeBackend::Custom(Box::new(Failing)))
            .build()
            .unwrap();
        let pre = Preprocessor::new(pipeline, vec![".md".to_owned()]);
        assert!(pre.markup("`x`", "a.md").is_err());
    }

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
}
