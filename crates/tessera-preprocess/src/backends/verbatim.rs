use std::fmt::Write as _;

use tessera_cache::{CacheBucket, CacheBucketExt, ContentKey};
use tessera_html::{escape_html_and_braces, tag};

use crate::capability::{VerbatimOutput, VerbatimProcessor, VerbatimRequest};
use crate::error::CapabilityError;
use crate::snippet::CodeOptions;

/// Cache bucket for rendered verbatim regions.
pub const VERBATIM_BUCKET: &str = "verbatim";

/// Verbatim environment backend.
pub enum VerbatimBackend {
    /// HTML-escape the content into a wrapper element carrying the tag's attributes.
    Escape {
        /// Wrapper element name.
        wrap: String,
    },
    /// Emit the content untouched.
    Raw,
    /// Render the content through the pipeline's code capability.
    Code {
        /// Language; the `lang` attribute is used when unset.
        language: Option<String>,
    },
    /// User-supplied processor.
    Custom(Box<dyn VerbatimProcessor>),
    /// Another backend whose output is cached by content hash.
    Cached {
        /// Backend producing cache misses.
        inner: Box<VerbatimBackend>,
        /// Bucket holding rendered output.
        bucket: Box<dyn CacheBucket>,
        /// Mixed into every key so a backend upgrade never reuses stale output.
        version: String,
    },
}

impl VerbatimBackend {
    /// Escape into `<pre>`.
    #[must_use]
    pub fn escape() -> Self {
        Self::Escape {
            wrap: "pre".to_owned(),
        }
    }

    /// Wrap this backend in a content-hash cache.
    #[must_use]
    pub fn cached(self, bucket: Box<dyn CacheBucket>, version: impl Into<String>) -> Self {
        Self::Cached {
            inner: Box::new(self),
            bucket,
            version: version.into(),
        }
    }

    fn cache_key(request: &VerbatimRequest<'_>, version: &str) -> String {
        let mut key = ContentKey::new(request.environment).part(version);
        for (name, value) in request.attributes {
            key = key.part(name).part(value);
        }
        key.part(request.inner).digest()
    }
}

fn escape_into_wrapper(wrap: &str, request: &VerbatimRequest<'_>) -> String {
    let mut out = format!("<{wrap}");
    for (name, value) in request.attributes {
        if value.is_empty() {
            let _ = write!(out, " {name}");
        } else {
            let _ = write!(out, r#" {name}="{}""#, escape_html_and_braces(value));
        }
    }
    let _ = write!(out, ">{}</{wrap}>", escape_html_and_braces(request.inner));
    out
}

impl VerbatimProcessor for VerbatimBackend {
    fn process(&self, request: &VerbatimRequest<'_>) -> Result<VerbatimOutput, CapabilityError> {
        match self {
            Self::Escape { wrap } => Ok(VerbatimOutput::html(escape_into_wrapper(wrap, request))),
            Self::Raw => Ok(VerbatimOutput::html(request.inner)),
            Self::Code { language } => {
                let language = language
                    .clone()
                    .or_else(|| request.attribute("lang").map(str::to_owned));
                let options = CodeOptions {
                    language,
                    info_string: None,
                    inline: false,
                };
                let inner = request.inner.trim_matches('\n');
                request.side_channel.mark_code();
                Ok(VerbatimOutput::html(request.code.process(inner, &options)?))
            }
            Self::Custom(processor) => processor.process(request),
            Self::Cached {
                inner,
                bucket,
                version,
            } => {
                let key = Self::cache_key(request, version);
                if let Some(output) = bucket.get_json::<VerbatimOutput>(&key) {
                    tracing::debug!(environment = request.environment, %key, "Verbatim cache hit");
                    return Ok(output);
                }
                let output = inner.process(request)?;
                bucket.set_json(&key, &output);
                Ok(output)
            }
        }
    }
}

/// Whether `name` may be used as a wrapper element.
pub(crate) fn is_valid_wrapper(name: &str) -> bool {
    tag::parse_tag(&format!("<{name}>")).is_some_and(|t| t.name == name)
}
