//! Configuration management for tessera.
//!
//! Parses `tessera.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `cache.dir`
//! - `code.stylesheet`
//! - `math.script_src`

mod expand;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override cache enabled flag.
    pub cache_enabled: Option<bool>,
    /// Override cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Override GitHub Flavored Markdown support.
    pub gfm: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "tessera.toml";

/// Names that the template language already gives a meaning to.
pub const RESERVED_TAG_NAMES: &[&str] = &["script", "style", "svelte:head"];

/// Default MathJax bundle loaded when math is present.
const DEFAULT_MATHJAX_SRC: &str = "https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-chtml.js";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host markdown pass.
    pub markdown: MarkdownConfig,
    /// Code snippet processing.
    pub code: CodeConfig,
    /// Math snippet processing.
    pub math: MathConfig,
    /// Directive syntax detection.
    pub directives: DirectivesConfig,
    /// Verbatim environments keyed by tag name.
    pub verbatim: BTreeMap<String, VerbatimConfig>,
    /// Layout policies for user components keyed by tag name.
    pub components: BTreeMap<String, ComponentConfig>,
    /// Host preprocessing hook.
    pub preprocess: PreprocessConfig,
    /// Cache configuration (paths are relative strings from TOML).
    cache: CacheConfigRaw,

    /// Resolved cache configuration (set after loading).
    #[serde(skip)]
    pub cache_resolved: CacheConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Markdown engine selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkdownBackendKind {
    /// pulldown-cmark.
    #[default]
    PulldownCmark,
    /// No markdown processing; host text passes through unchanged.
    None,
}

/// Markdown configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MarkdownConfig {
    /// Markdown engine.
    pub backend: MarkdownBackendKind,
    /// Enable GitHub Flavored Markdown extensions (tables, strikethrough, task lists).
    pub gfm: bool,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            backend: MarkdownBackendKind::default(),
            gfm: true,
        }
    }
}

/// Code backend selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodeBackendKind {
    /// Escape code into `<pre><code>` without highlighting.
    #[default]
    Escape,
}

/// Code configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CodeConfig {
    /// Code backend.
    pub backend: CodeBackendKind,
    /// Stylesheet linked in the document head when code is present.
    pub stylesheet: Option<String>,
    /// Treat `~text~` runs as inline code spans.
    ///
    /// Off by default because it collides with strikethrough.
    pub tilde_spans: bool,
}

/// Math backend selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MathBackendKind {
    /// Client-side MathJax markup.
    #[default]
    Mathjax,
    /// Do not recognize math; `$` and `\(` reach the markdown engine as text.
    None,
}

/// Math configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MathConfig {
    /// Math backend.
    pub backend: MathBackendKind,
    /// Recognize `$...$` and `$$...$$`.
    pub dollars: bool,
    /// Recognize `\(...\)` and `\[...\]`.
    pub brackets: bool,
    /// Script loaded in the document head when math is present.
    pub script_src: String,
}

impl Default for MathConfig {
    fn default() -> Self {
        Self {
            backend: MathBackendKind::default(),
            dollars: true,
            brackets: true,
            script_src: DEFAULT_MATHJAX_SRC.to_owned(),
        }
    }
}

/// Directive configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DirectivesConfig {
    /// Shield `:name[...]{...}` attribute braces from mustache detection.
    pub enabled: bool,
}

/// How a verbatim environment renders its content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerbatimKind {
    /// HTML-escape the content into a wrapper element.
    #[default]
    Escape,
    /// Pass the content through untouched.
    Raw,
    /// Hand the content to the code backend.
    Code,
}

/// A verbatim environment.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VerbatimConfig {
    /// Rendering strategy.
    #[serde(rename = "type")]
    pub kind: VerbatimKind,
    /// Alternative tag names for the same environment.
    pub aliases: Vec<String>,
    /// Wrapper element for `escape` environments (default: `pre`).
    pub wrap: Option<String>,
    /// Language for `code` environments (default: the `lang` attribute).
    pub language: Option<String>,
    /// Strip a `<p>` that markdown wraps around the rendered output.
    pub remove_paragraph: bool,
    /// Cache rendered output by content hash.
    pub cache: bool,
}

impl Default for VerbatimConfig {
    fn default() -> Self {
        Self {
            kind: VerbatimKind::default(),
            aliases: Vec::new(),
            wrap: None,
            language: None,
            remove_paragraph: true,
            cache: false,
        }
    }
}

/// Layout policy for a user component.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct ComponentConfig {
    /// Collapse a single newline around the component instead of widening it to a paragraph break.
    pub prefers_inline: bool,
    /// Whether the component may contain paragraphs.
    pub can_contain_paragraph: bool,
    /// Whether the component may be wrapped in a paragraph.
    pub can_be_in_paragraph: bool,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            prefers_inline: false,
            can_contain_paragraph: true,
            can_be_in_paragraph: false,
        }
    }
}

/// Host hook configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// File extensions (with leading dot) the preprocessor claims.
    pub extensions: Vec<String>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            extensions: vec![".sveltex".to_owned(), ".md".to_owned()],
        }
    }
}

/// Raw cache configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CacheConfigRaw {
    enabled: Option<bool>,
    dir: Option<String>,
}

/// Resolved cache configuration with absolute paths.
#[derive(Debug, Default)]
pub struct CacheConfig {
    /// Whether caching is enabled.
    pub enabled: bool,
    /// Cache directory.
    pub dir: PathBuf,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`cache.dir`").
        field: String,
        /// Error message (e.g., "${`CACHE_DIR`} not set").
        message: String,
    },
}

/// Check that a name can be used as a tag name.
///
/// Accepts ASCII letters, digits, `-`, `_`, `.` and `:`, starting with a letter.
#[must_use]
pub fn is_valid_tag_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a tag name to be well formed and not reserved by the template language.
fn require_tag_name(name: &str, field: &str) -> Result<(), ConfigError> {
    if !is_valid_tag_name(name) {
        return Err(ConfigError::Validation(format!(
            "{field}: '{name}' is not a valid tag name"
        )));
    }
    if RESERVED_TAG_NAMES.contains(&name) {
        return Err(ConfigError::Validation(format!(
            "{field}: '{name}' is reserved by the template language"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `tessera.toml` in current directory and parents.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or validation fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Parse configuration from TOML text, resolving paths against `base`.
    ///
    /// # Errors
    ///
    /// Returns error if parsing, expansion or validation fails.
    pub fn from_toml_str(content: &str, base: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.expand_env_vars()?;
        config.resolve_paths(base);
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(enabled) = settings.cache_enabled {
            self.cache_resolved.enabled = enabled;
        }
        if let Some(dir) = &settings.cache_dir {
            self.cache_resolved.dir.clone_from(dir);
        }
        if let Some(gfm) = settings.gfm {
            self.markdown.gfm = gfm;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            markdown: MarkdownConfig::default(),
            code: CodeConfig::default(),
            math: MathConfig::default(),
            directives: DirectivesConfig::default(),
            verbatim: BTreeMap::new(),
            components: BTreeMap::new(),
            preprocess: PreprocessConfig::default(),
            cache: CacheConfigRaw::default(),
            cache_resolved: CacheConfig {
                enabled: true,
                dir: base.join(".tessera").join("cache"),
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config_dir = path.parent().unwrap_or(Path::new("."));
        let mut config = Self::from_toml_str(&content, config_dir)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_verbatim()?;
        self.validate_components()?;
        self.validate_preprocess()?;
        require_non_empty(&self.math.script_src, "math.script_src")?;
        Ok(())
    }

    /// Validate verbatim environment names, aliases and wrappers.
    fn validate_verbatim(&self) -> Result<(), ConfigError> {
        let mut seen: BTreeMap<&str, &str> = BTreeMap::new();

        for (name, env) in &self.verbatim {
            let field = format!("verbatim.{name}");
            for tag in std::iter::once(name).chain(&env.aliases) {
                require_tag_name(tag, &field)?;
                if let Some(owner) = seen.insert(tag.as_str(), name.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "{field}: tag name '{tag}' is already used by verbatim.{owner}"
                    )));
                }
            }
            if let Some(wrap) = &env.wrap
                && !is_valid_tag_name(wrap)
            {
                return Err(ConfigError::Validation(format!(
                    "{field}.wrap: '{wrap}' is not a valid tag name"
                )));
            }
            if env.wrap.is_some() && env.kind != VerbatimKind::Escape {
                return Err(ConfigError::Validation(format!(
                    "{field}.wrap is only supported for type = \"escape\""
                )));
            }
        }

        Ok(())
    }

    /// Validate component names.
    fn validate_components(&self) -> Result<(), ConfigError> {
        for name in self.components.keys() {
            require_tag_name(name, &format!("components.{name}"))?;
            if self.verbatim.contains_key(name) {
                return Err(ConfigError::Validation(format!(
                    "components.{name}: already declared as a verbatim environment"
                )));
            }
        }
        Ok(())
    }

    /// Validate claimed extensions.
    fn validate_preprocess(&self) -> Result<(), ConfigError> {
        if self.preprocess.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "preprocess.extensions cannot be empty".to_owned(),
            ));
        }
        for ext in &self.preprocess.extensions {
            if !ext.starts_with('.') || ext.len() < 2 {
                return Err(ConfigError::Validation(format!(
                    "preprocess.extensions: '{ext}' must start with a dot"
                )));
            }
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref dir) = self.cache.dir {
            self.cache.dir = Some(expand::expand_env(dir, "cache.dir")?);
        }
        if let Some(ref stylesheet) = self.code.stylesheet {
            self.code.stylesheet = Some(expand::expand_env(stylesheet, "code.stylesheet")?);
        }
        self.math.script_src = expand::expand_env(&self.math.script_src, "math.script_src")?;
        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        self.cache_resolved = CacheConfig {
            enabled: self.cache.enabled.unwrap_or(true),
            dir: config_dir.join(self.cache.dir.as_deref().unwrap_or(".tessera/cache")),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert_eq!(config.markdown.backend, MarkdownBackendKind::PulldownCmark);
        assert!(config.markdown.gfm);
        assert!(config.math.dollars);
        assert!(config.math.brackets);
        assert!(!config.code.tilde_spans);
        assert!(config.verbatim.is_empty());
        assert_eq!(
            config.cache_resolved.dir,
            PathBuf::from("/test/.tessera/cache")
        );
        assert!(config.cache_resolved.enabled);
        assert_eq!(config.preprocess.extensions, vec![".sveltex", ".md"]);
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = Config::from_toml_str("", Path::new("/project")).unwrap();
        assert_eq!(config.math.script_src, DEFAULT_MATHJAX_SRC);
        assert!(config.cache_resolved.enabled);
    }

    #[test]
    fn test_parse_verbatim_environments() {
        let toml = r#"
[verbatim.Verbatim]
type = "escape"
aliases = ["Verb"]
wrap = "div"

[verbatim.Raw]
type = "raw"
remove_paragraph = false

[verbatim.Example]
type = "code"
language = "svelte"
cache = true
"#;
        let config = Config::from_toml_str(toml, Path::new("/project")).unwrap();

        let verbatim = &config.verbatim["Verbatim"];
        assert_eq!(verbatim.kind, VerbatimKind::Escape);
        assert_eq!(verbatim.aliases, vec!["Verb"]);
        assert_eq!(verbatim.wrap.as_deref(), Some("div"));
        assert!(verbatim.remove_paragraph);

        assert_eq!(config.verbatim["Raw"].kind, VerbatimKind::Raw);
        assert!(!config.verbatim["Raw"].remove_paragraph);

        let example = &config.verbatim["Example"];
        assert_eq!(example.kind, VerbatimKind::Code);
        assert_eq!(example.language.as_deref(), Some("svelte"));
        assert!(example.cache);
    }

    #[test]
    fn test_parse_components() {
        let toml = r"
[components.Callout]
prefers_inline = false
can_contain_paragraph = true
can_be_in_paragraph = false

[components.Badge]
prefers_inline = true
can_be_in_paragraph = true
";
        let config = Config::from_toml_str(toml, Path::new("/project")).unwrap();
        assert!(!config.components["Callout"].prefers_inline);
        assert!(config.components["Badge"].prefers_inline);
        assert!(config.components["Badge"].can_contain_paragraph);
        assert!(config.components["Badge"].can_be_in_paragraph);
    }

    #[test]
    fn test_unknown_backend_is_a_parse_error() {
        let toml = r#"
[markdown]
backend = "markdown-it"
"#;
        let err = Config::from_toml_str(toml, Path::new("/project")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "got {err:?}");
    }

    #[test]
    fn test_markdown_backend_none() {
        let toml = r#"
[markdown]
backend = "none"
"#;
        let config = Config::from_toml_str(toml, Path::new("/project")).unwrap();
        assert_eq!(config.markdown.backend, MarkdownBackendKind::None);
    }

    #[test]
    fn test_math_backend_none() {
        let toml = r#"
[math]
backend = "none"
"#;
        let config = Config::from_toml_str(toml, Path::new("/project")).unwrap();
        assert_eq!(config.math.backend, MathBackendKind::None);
        assert_eq!(config.code.backend, CodeBackendKind::Escape);
    }

    #[test]
    fn test_duplicate_alias_is_rejected() {
        let toml = r#"
[verbatim.Verbatim]
aliases = ["Code"]

[verbatim.Code]
type = "code"
"#;
        let err = Config::from_toml_str(toml, Path::new("/project")).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("already used"));
    }

    #[test]
    fn test_reserved_verbatim_name_is_rejected() {
        let toml = r"
[verbatim.script]
";
        let err = Config::from_toml_str(toml, Path::new("/project")).unwrap_err();
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn test_invalid_tag_name_is_rejected() {
        let toml = r#"
[verbatim."1bad"]
"#;
        let err = Config::from_toml_str(toml, Path::new("/project")).unwrap_err();
        assert!(err.to_string().contains("not a valid tag name"));
    }

    #[test]
    fn test_wrap_requires_escape_type() {
        let toml = r#"
[verbatim.Raw]
type = "raw"
wrap = "div"
"#;
        let err = Config::from_toml_str(toml, Path::new("/project")).unwrap_err();
        assert!(err.to_string().contains("wrap"));
    }

    #[test]
    fn test_component_clashing_with_verbatim_is_rejected() {
        let toml = r"
[verbatim.Verbatim]

[components.Verbatim]
";
        let err = Config::from_toml_str(toml, Path::new("/project")).unwrap_err();
        assert!(err.to_string().contains("components.Verbatim"));
    }

    #[test]
    fn test_extensions_must_start_with_dot() {
        let toml = r#"
[preprocess]
extensions = ["md"]
"#;
        let err = Config::from_toml_str(toml, Path::new("/project")).unwrap_err();
        assert!(err.to_string().contains("must start with a dot"));
    }

    #[test]
    fn test_resolve_cache_dir() {
        let toml = r#"
[cache]
enabled = false
dir = "build/cache"
"#;
        let config = Config::from_toml_str(toml, Path::new("/project")).unwrap();
        assert!(!config.cache_resolved.enabled);
        assert_eq!(
            config.cache_resolved.dir,
            PathBuf::from("/project/build/cache")
        );
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            cache_enabled: Some(false),
            gfm: Some(false),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert!(!config.cache_resolved.enabled);
        assert!(!config.markdown.gfm);
        assert_eq!(
            config.cache_resolved.dir,
            PathBuf::from("/test/.tessera/cache")
        );
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let err = Config::load(Some(Path::new("/definitely/missing/tessera.toml")), None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_from_file_records_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[math]\ndollars = false\n").unwrap();

        let config = Config::load(Some(&path), None).unwrap();
        assert!(!config.math.dollars);
        assert_eq!(config.config_path, Some(path));
        assert_eq!(config.cache_resolved.dir, tmp.path().join(".tessera/cache"));
    }

    #[test]
    fn test_is_valid_tag_name() {
        assert!(is_valid_tag_name("Verbatim"));
        assert!(is_valid_tag_name("tex-figure"));
        assert!(is_valid_tag_name("svelte:head"));
        assert!(!is_valid_tag_name(""));
        assert!(!is_valid_tag_name("9lives"));
        assert!(!is_valid_tag_name("has space"));
    }
}
