//! Long-description extraction from the object page's raw HTML.
//!
//! The page is fetched over plain HTTP (no browser) and run through a
//! fallback chain, stopping at the first step that yields text:
//!
//! 1. authored-content spans nested in a "read more" wrapper
//! 2. the longest authored-content span, if it has more than 30 words
//! 3. `<meta name="description">`
//! 4. `<meta property="og:description">`
//! 5. the first three non-empty paragraphs
//! 6. empty string

use super::http_client::HttpClient;
use crate::error::FetchResult;
use scraper::{ElementRef, Html, Selector};

/// Spans produced by the site's content-authoring component.
const CONTENT_SPAN_SELECTOR: &str = r#"span[data-sentry-component="LegacyOrMarkdownParser"]"#;

/// Class fragment marking the expandable description block.
const READ_MORE_CLASS: &str = "read-more-wrapper";

/// How far up the tree to look for the read-more wrapper.
const READ_MORE_MAX_DEPTH: usize = 6;

/// A bare content span must exceed this many words to be used.
const MIN_SPAN_WORDS: usize = 30;

const PARAGRAPH_FALLBACK_COUNT: usize = 3;

/// Fetch `url` and run the fallback chain over its HTML.
///
/// An empty URL yields an empty description without a request. Callers
/// collapse errors to an empty string.
pub async fn fetch_long_description(
    http: &HttpClient,
    url: &str,
    timeout_ms: u64,
) -> FetchResult<String> {
    if url.is_empty() {
        return Ok(String::new());
    }
    let html = http.get_text(url, timeout_ms).await?;
    Ok(extract_long_description(&html))
}

/// Run the fallback chain over raw HTML.
pub fn extract_long_description(html: &str) -> String {
    let document = Html::parse_document(html);
    let span_sel = selector(CONTENT_SPAN_SELECTOR);
    let spans: Vec<ElementRef<'_>> = document.select(&span_sel).collect();

    read_more_span(&spans)
        .or_else(|| longest_span(&spans))
        .or_else(|| meta_content(&document, r#"meta[name="description"]"#))
        .or_else(|| meta_content(&document, r#"meta[property="og:description"]"#))
        .or_else(|| leading_paragraphs(&document))
        .unwrap_or_default()
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

/// Text nodes of an element, each trimmed, joined by single spaces.
fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn read_more_span(spans: &[ElementRef<'_>]) -> Option<String> {
    spans
        .iter()
        .filter(|span| {
            span.ancestors()
                .take(READ_MORE_MAX_DEPTH)
                .filter_map(ElementRef::wrap)
                .any(|a| {
                    a.value()
                        .attr("class")
                        .is_some_and(|c| c.split_whitespace().any(|c| c.contains(READ_MORE_CLASS)))
                })
        })
        .map(element_text)
        .find(|t| !t.is_empty())
}

fn longest_span(spans: &[ElementRef<'_>]) -> Option<String> {
    let mut best: Option<(usize, String)> = None;
    for span in spans {
        let text = element_text(span);
        let words = text.split_whitespace().count();
        if words > MIN_SPAN_WORDS && best.as_ref().map_or(true, |(n, _)| words > *n) {
            best = Some((words, text));
        }
    }
    best.map(|(_, t)| t)
}

fn meta_content(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css);
    let content = document.select(&sel).next()?.value().attr("content")?.trim();
    (!content.is_empty()).then(|| content.to_string())
}

fn leading_paragraphs(document: &Html) -> Option<String> {
    let sel = selector("p");
    let texts: Vec<String> = document
        .select(&sel)
        .map(|p| element_text(&p))
        .filter(|t| !t.is_empty())
        .take(PARAGRAPH_FALLBACK_COUNT)
        .collect();
    (!texts.is_empty()).then(|| texts.join("\n\n"))
}
