//! Content rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! upstream body + base URL
//!     → ContentKind::from_content_type (dispatch)
//!     → html.rs (attribute pass, <style>, <base> removal)
//!     → css.rs  (url(...) and @import pass)
//!     → url.rs  (resolve + wrap as <proxy-path>?url=<encoded>)
//!     → rewritten text
//! ```
//!
//! # Design Decisions
//! - One URL rewriter shared by both format drivers
//! - Everything is request-local; no state survives a rewrite pass

pub mod css;
pub mod html;
pub mod url;

pub use self::url::{RewriteSkipped, UrlRewriter};

/// How a response body is relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Css,
    /// Streamed unmodified.
    Passthrough,
}

impl ContentKind {
    /// Classify a `content-type` header value by its media type essence.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let essence = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase());

        match essence.as_deref() {
            Some("text/html") => ContentKind::Html,
            Some("text/css") => ContentKind::Css,
            _ => ContentKind::Passthrough,
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Html => "html",
            ContentKind::Css => "css",
            ContentKind::Passthrough => "passthrough",
        }
    }

    /// `content-type` emitted for a rewritten body.
    pub fn rewritten_content_type(&self) -> Option<&'static str> {
        match self {
            ContentKind::Html => Some("text/html; charset=utf-8"),
            ContentKind::Css => Some("text/css; charset=utf-8"),
            ContentKind::Passthrough => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_kind() {
        assert_eq!(ContentKind::from_content_type(Some("text/html")), ContentKind::Html);
        assert_eq!(
            ContentKind::from_content_type(Some("Text/HTML; charset=ISO-8859-1")),
            ContentKind::Html
        );
        assert_eq!(ContentKind::from_content_type(Some("text/css;charset=utf-8")), ContentKind::Css);
        assert_eq!(ContentKind::from_content_type(Some("image/png")), ContentKind::Passthrough);
        assert_eq!(
            ContentKind::from_content_type(Some("application/javascript")),
            ContentKind::Passthrough
        );
        assert_eq!(ContentKind::from_content_type(None), ContentKind::Passthrough);
    }
}
