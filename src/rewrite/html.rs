//! HTML document rewriting.
//!
//! # Responsibilities
//! - Rewrite the resource-bearing attribute of each known element
//! - Rewrite `srcset` candidates, `poster`, inline `style` and `<style>` text
//! - Normalize `form[method]` to an explicit upper-case verb
//! - Drop `<base>` so the browser never re-anchors unrewritten references
//!
//! # Design Decisions
//! - Parsing is permissive: malformed markup is rewritten best-effort, never rejected
//! - Untouched bytes are emitted as they were received
//! - A failed reference keeps its original value; the document is never aborted

use html_escape::decode_html_entities;
use lol_html::errors::RewritingError;
use lol_html::html_content::{ContentType, Element};
use lol_html::{element, text, HandlerResult, HtmlRewriter, Settings};
use url::Url;

use crate::rewrite::css;
use crate::rewrite::url::UrlRewriter;

/// Elements visited by the attribute pass.
const RESOURCE_SELECTOR: &str =
    "a, form, img, link, script, video, audio, source, iframe, embed, track, [style]";

/// The single resource-bearing attribute for a tag, if any.
pub fn resource_attribute(tag: &str) -> Option<&'static str> {
    match tag {
        "a" | "link" => Some("href"),
        "form" => Some("action"),
        "img" | "script" | "video" | "audio" | "iframe" | "source" | "embed" | "track" => {
            Some("src")
        }
        _ => None,
    }
}

/// Rewrite `html` so every resource it references routes through the proxy.
///
/// Falls back to the input when the rewriter itself fails.
pub fn transform(html: &str, base: &Url, rewriter: &UrlRewriter) -> String {
    match rewrite_document(html, base, rewriter) {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(base = %base, error = %e, "HTML rewrite failed, relaying document unchanged");
            html.to_string()
        }
    }
}

fn rewrite_document(html: &str, base: &Url, rewriter: &UrlRewriter) -> Result<String, RewritingError> {
    let mut output = Vec::with_capacity(html.len());
    // <style> text may arrive split across chunks; it is rewritten once whole.
    let mut style_text = String::new();

    let mut document = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("base", |el| {
                    el.remove();
                    Ok(())
                }),
                element!(RESOURCE_SELECTOR, |el| {
                    let tag = el.tag_name();

                    if let Some(attr) = resource_attribute(&tag) {
                        rewrite_attribute(el, attr, |v| rewriter.rewrite(v, base))?;
                    }

                    match tag.as_str() {
                        "form" => {
                            let method = normalize_method(el.get_attribute("method").as_deref());
                            el.set_attribute("method", &method)?;
                        }
                        "img" | "source" => {
                            rewrite_attribute(el, "srcset", |v| rewrite_srcset(v, base, rewriter))?;
                        }
                        "video" => {
                            rewrite_attribute(el, "poster", |v| rewriter.rewrite(v, base))?;
                        }
                        _ => {}
                    }

                    rewrite_attribute(el, "style", |v| css::transform(v, base, rewriter))
                }),
                text!("style", |t| {
                    style_text.push_str(t.as_str());
                    if t.last_in_text_node() {
                        let rewritten = css::transform(&style_text, base, rewriter);
                        t.replace(&rewritten, ContentType::Html);
                        style_text.clear();
                    } else {
                        t.remove();
                    }
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );

    document.write(html.as_bytes())?;
    document.end()?;

    Ok(String::from_utf8_lossy(&output).into_owned())
}

/// Explicit, upper-case form method. Absent or blank means GET.
pub fn normalize_method(method: Option<&str>) -> String {
    match method.map(str::trim) {
        Some(m) if !m.is_empty() => m.to_ascii_uppercase(),
        _ => "GET".to_string(),
    }
}

/// Rewrite the URL of every `srcset` candidate, keeping descriptors.
pub fn rewrite_srcset(srcset: &str, base: &Url, rewriter: &UrlRewriter) -> String {
    srcset_candidates(srcset)
        .into_iter()
        .map(|(url, descriptor)| {
            let url = rewriter.rewrite(url, base);
            if descriptor.is_empty() {
                url
            } else {
                format!("{url} {descriptor}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Split a `srcset` into (url, descriptor) pairs.
///
/// The URL is a run of non-whitespace, so commas inside `data:` URIs survive.
fn srcset_candidates(srcset: &str) -> Vec<(&str, &str)> {
    let mut candidates = Vec::new();
    let mut rest = srcset;

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }

        let url_end = rest
            .find(|c: char| c.is_ascii_whitespace())
            .unwrap_or(rest.len());
        let url = &rest[..url_end];
        rest = &rest[url_end..];

        if url.ends_with(',') {
            candidates.push((url.trim_end_matches(','), ""));
            continue;
        }

        let descriptor_end = rest.find(',').unwrap_or(rest.len());
        candidates.push((url, rest[..descriptor_end].trim()));
        rest = &rest[descriptor_end..];
    }

    candidates
}

/// Rewrite one attribute in place. Values arrive entity-encoded and are
/// decoded first; unchanged values are left byte-for-byte as written.
fn rewrite_attribute<F>(el: &mut Element<'_, '_>, attr: &str, rewrite: F) -> HandlerResult
where
    F: FnOnce(&str) -> String,
{
    if let Some(raw) = el.get_attribute(attr).filter(|v| !v.is_empty()) {
        let decoded = decode_html_entities(&raw);
        let rewritten = rewrite(&decoded);
        if rewritten != decoded {
            el.set_attribute(attr, &rewritten)?;
        }
    }
    Ok(())
}
