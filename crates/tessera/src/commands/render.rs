//! `tessera render` command implementation.

use std::path::PathBuf;

use clap::Args;
use tessera_cache::{Cache, FileCache, NullCache};
use tessera_config::{CliSettings, Config};
use tessera_preprocess::{Document, Pipeline, Processed};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Document to preprocess.
    file: PathBuf,

    /// Write the result to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover tessera.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cache directory (overrides config).
    #[arg(long, env = "TESSERA_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Enable caching (default: enabled).
    #[arg(long)]
    cache: Option<bool>,

    /// Disable caching.
    #[arg(long, conflicts_with = "cache")]
    no_cache: bool,

    /// Disable GitHub Flavored Markdown extensions.
    #[arg(long)]
    no_gfm: bool,

    /// Enable verbose output (cache and snippet logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl RenderArgs {
    /// Execute the render command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the document cannot be read,
    /// or a snippet fails to process.
    pub(crate) fn execute(self, version: &str) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            cache_enabled: self.resolve_cache_enabled(),
            cache_dir: self.cache_dir.clone(),
            gfm: self.no_gfm.then_some(false),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        let cache: Box<dyn Cache> = if config.cache_resolved.enabled {
            output.detail(&format!(
                "Cache directory: {}",
                config.cache_resolved.dir.display()
            ));
            Box::new(FileCache::new(config.cache_resolved.dir.clone(), version))
        } else {
            Box::new(NullCache)
        };

        let text = std::fs::read_to_string(&self.file)?;
        let filename = self.file.display().to_string();
        let processed = render_document(&config, cache.as_ref(), &text, &filename)?;

        for diagnostic in &processed.diagnostics {
            output.diagnostic(&filename, diagnostic);
        }

        match &self.output {
            Some(path) => {
                std::fs::write(path, &processed.html)?;
                output.info(&format!("Wrote {}", path.display()));
            }
            None => output.document(&processed.html)?,
        }
        Ok(())
    }

    /// Resolve `cache_enabled` from --cache/--no-cache flags.
    fn resolve_cache_enabled(&self) -> Option<bool> {
        self.no_cache.then_some(false).or(self.cache)
    }
}

/// Build a pipeline from `config` and run one document through it.
fn render_document(
    config: &Config,
    cache: &dyn Cache,
    text: &str,
    filename: &str,
) -> Result<Processed, CliError> {
    let pipeline = Pipeline::from_config(config, cache)?;
    let processed = pipeline.process(&Document::new(text).with_filename(filename))?;
    tracing::info!(
        filename,
        dependencies = processed.dependencies.len(),
        diagnostics = processed.diagnostics.len(),
        "Rendered document"
    );
    Ok(processed)
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use tessera_cache::MemoryCache;

    use super::*;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: RenderArgs,
    }

    fn parse(args: &[&str]) -> RenderArgs {
        Wrapper::parse_from(std::iter::once("tessera").chain(args.iter().copied())).args
    }

    #[test]
    fn test_cache_flags() {
        assert_eq!(parse(&["a.md"]).resolve_cache_enabled(), None);
        assert_eq!(parse(&["a.md", "--no-cache"]).resolve_cache_enabled(), Some(false));
        assert_eq!(parse(&["a.md", "--cache", "true"]).resolve_cache_enabled(), Some(true));
    }

    #[test]
    fn test_render_document() {
        let processed = render_document(
            &Config::default(),
            &MemoryCache::new(),
            "# Title\n\n$x$",
            "page.md",
        )
        .unwrap();
        assert!(processed.html.starts_with("<script>\n</script>\n"));
        assert!(processed.html.contains("<h1>Title</h1>"));
        assert!(processed.html.contains(r#"<span class="math math-inline">\(x\)</span>"#));
        assert!(processed.diagnostics.is_empty());
    }

    #[test]
    fn test_render_reports_unclosed_math() {
        let processed =
            render_document(&Config::default(), &NullCache, "a $$b", "page.md").unwrap();
        assert_eq!(processed.diagnostics.len(), 1);
        assert_eq!(processed.diagnostics[0].line, 1);
    }
}
