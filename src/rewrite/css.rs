//! Stylesheet rewriting.
//!
//! Rewrites `url(...)` references and `@import "..."` strings. The scan is
//! content-agnostic: declarations, `@font-face` and `@import` are all covered
//! by the same patterns. Only the path span of each match is replaced.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

use crate::rewrite::url::UrlRewriter;

/// `url(...)` with a double-quoted, single-quoted or bare path.
static URL_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^"'\s)][^)]*?))\s*\)"#)
        .expect("url() pattern is valid")
});

/// `@import "..."` without a `url(` wrapper.
static IMPORT_STRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)@import\s+(?:"([^"]*)"|'([^']*)')"#).expect("@import pattern is valid")
});

/// Rewrite every resource reference in `css`, resolving against `base`.
pub fn transform(css: &str, base: &Url, rewriter: &UrlRewriter) -> String {
    let pass = URL_FUNCTION.replace_all(css, |caps: &Captures| replace_path(caps, base, rewriter));
    IMPORT_STRING
        .replace_all(&pass, |caps: &Captures| replace_path(caps, base, rewriter))
        .into_owned()
}

/// Substitute the first matched path group inside the whole match.
fn replace_path(caps: &Captures, base: &Url, rewriter: &UrlRewriter) -> String {
    let whole = caps.get(0).map_or("", |m| m.as_str());
    let Some(path) = (1..caps.len()).find_map(|i| caps.get(i)) else {
        return whole.to_string();
    };

    let rewritten = rewriter.rewrite_css_reference(path.as_str(), base);
    if rewritten == path.as_str() {
        return whole.to_string();
    }

    // Offsets of the path relative to the whole match.
    let start = path.start() - caps.get(0).map_or(0, |m| m.start());
    let end = start + path.len();
    format!("{}{}{}", &whole[..start], rewritten, &whole[end..])
}
