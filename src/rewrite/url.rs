//! Resource reference resolution and proxied URL encoding.
//!
//! # Responsibilities
//! - Resolve a (possibly relative) reference against the document's base URL
//! - Wrap the resolved absolute URL as `<proxy-path>?url=<encoded>`
//! - Leave inert or unresolvable references untouched
//!
//! # Design Decisions
//! - Pure function of (base, reference); the proxy path is fixed at construction
//! - A failed rewrite never drops content: the caller gets the original text back

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;
use url::Url;

/// Characters escaped in the `url` query value.
///
/// `encodeURIComponent` minus `' ( )`: those stay escaped so a proxied URL
/// can sit inside a quoted or bare CSS `url(...)` token.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*');

/// Reason a single reference was left as written.
///
/// Never surfaced to the caller; the reference is kept verbatim instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RewriteSkipped {
    /// Empty attribute value.
    #[error("empty reference")]
    Empty,

    /// `data:` URIs are self-contained.
    #[error("inline data URI")]
    Inline,

    /// Already absolute in a stylesheet context.
    #[error("already absolute: {0}")]
    AlreadyAbsolute(String),

    /// Reference could not be resolved against the base.
    #[error("unresolvable reference {reference:?}: {reason}")]
    Unresolvable { reference: String, reason: url::ParseError },

    /// Resolved to a scheme the proxy refuses to fetch.
    #[error("unproxyable scheme: {0}")]
    Scheme(String),
}

/// Rewrites resource references into proxied URLs.
#[derive(Debug, Clone)]
pub struct UrlRewriter {
    proxy_path: String,
}

impl UrlRewriter {
    /// Create a rewriter emitting URLs under `proxy_path` (e.g. `/proxy`).
    pub fn new(proxy_path: impl Into<String>) -> Self {
        Self {
            proxy_path: proxy_path.into(),
        }
    }

    pub fn proxy_path(&self) -> &str {
        &self.proxy_path
    }

    /// Wrap an absolute URL in the proxied form.
    pub fn proxied(&self, absolute: &Url) -> String {
        format!(
            "{}?url={}",
            self.proxy_path,
            utf8_percent_encode(absolute.as_str(), COMPONENT)
        )
    }

    /// Resolve `reference` against `base` and wrap it.
    pub fn try_rewrite(&self, reference: &str, base: &Url) -> Result<String, RewriteSkipped> {
        if reference.trim().is_empty() {
            return Err(RewriteSkipped::Empty);
        }
        if is_data_uri(reference) {
            return Err(RewriteSkipped::Inline);
        }

        let resolved = base
            .join(reference)
            .map_err(|reason| RewriteSkipped::Unresolvable {
                reference: reference.to_string(),
                reason,
            })?;

        match resolved.scheme() {
            "http" | "https" => Ok(self.proxied(&resolved)),
            other => Err(RewriteSkipped::Scheme(other.to_string())),
        }
    }

    /// Rewrite a reference found in an HTML attribute.
    ///
    /// Returns the reference unchanged when it cannot or should not be proxied.
    pub fn rewrite(&self, reference: &str, base: &Url) -> String {
        match self.try_rewrite(reference, base) {
            Ok(proxied) => proxied,
            Err(skipped) => {
                tracing::debug!(reason = %skipped, "Reference left unchanged");
                reference.to_string()
            }
        }
    }

    /// Rewrite a reference found in stylesheet text.
    ///
    /// Author-written absolute URLs are kept as they are.
    pub fn rewrite_css_reference(&self, reference: &str, base: &Url) -> String {
        if is_absolute_reference(reference) {
            return reference.to_string();
        }
        self.rewrite(reference, base)
    }
}

/// True for `data:` URIs, ignoring case and leading whitespace.
pub fn is_data_uri(reference: &str) -> bool {
    has_prefix_ignore_case(reference.trim_start(), "data:")
}

/// True when a stylesheet reference already names its scheme or host.
pub fn is_absolute_reference(reference: &str) -> bool {
    let reference = reference.trim_start();
    has_prefix_ignore_case(reference, "http:")
        || has_prefix_ignore_case(reference, "https:")
        || reference.starts_with("//")
        || has_prefix_ignore_case(reference, "data:")
}

/// Recover the absolute URL carried by a proxied URL.
pub fn decode_proxied(proxied: &str) -> Option<String> {
    let (_, encoded) = proxied.split_once("?url=")?;
    percent_decode_str(encoded)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

fn has_prefix_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}
