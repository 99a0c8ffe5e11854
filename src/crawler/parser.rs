//! HTML and text parsing helpers
//!
//! Synchronous extraction of titles, links, and content text from fetched
//! pages, plus the plain-text and sitemap scanners used by the batch-style
//! strategies. Everything here is CPU-bound and runs inside the CPU worker
//! pool; `scraper::Html` is not `Send`, so nothing escapes these functions.

use scraper::{Html, Selector};
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// All links found on the page (absolute URLs)
    pub links: Vec<String>,

    /// Text of the main content region
    pub text: String,
}

/// Parses HTML content and extracts title, links, and content text
///
/// Link extraction skips `javascript:`, `mailto:`, `tel:`, data URIs,
/// fragment-only anchors, and links carrying a `download` attribute. The
/// content text is taken from the first element matching
/// `content_selector`; when nothing matches, the whole document text is
/// used (the selector affects where to look, never correctness).
pub fn parse_page(html: &str, base_url: &Url, content_selector: &str) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, base_url),
        text: extract_text(&document, content_selector),
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, base_url) {
                    links.push(absolute_url);
                }
            }
        }
    }

    links
}

fn extract_text(document: &Html, content_selector: &str) -> String {
    if let Ok(selector) = Selector::parse(content_selector) {
        if let Some(element) = document.select(&selector).next() {
            return collapse_whitespace(element.text());
        }
    }

    collapse_whitespace(document.root_element().text())
}

fn collapse_whitespace<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for part in parts {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(trimmed);
    }
    out
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None for javascript:/mailto:/tel: schemes, data URIs,
/// fragment-only anchors, and anything that does not resolve to http(s).
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    if href.starts_with('#') {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

/// Scans plain text for absolute http(s) links
///
/// Used on link-collection files (llms.txt and friends), where links appear
/// as whitespace-separated tokens or markdown `](url)` references.
pub fn extract_text_links(text: &str) -> Vec<String> {
    let mut links = Vec::new();

    for token in text.split_whitespace() {
        let token = token.trim_start_matches('(').trim_start_matches('<');
        if let Some(start) = token.find("http://").or_else(|| token.find("https://")) {
            let candidate = &token[start..];
            let candidate = candidate
                .trim_end_matches(|c: char| matches!(c, ')' | '>' | ',' | '.' | ';' | ':'));
            if candidate.len() > "https://".len() {
                links.push(candidate.to_string());
            }
        }
    }

    links
}

/// Collects `<loc>` text values from a sitemap XML document
pub fn extract_loc_values(xml: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut start = 0usize;
    while let Some(open_idx) = xml[start..].find("<loc>") {
        let open = start + open_idx + 5;
        let Some(close_rel) = xml[open..].find("</loc>") else {
            break;
        };
        let close = open + close_rel;
        let value = xml[open..close].trim();
        if !value.is_empty() {
            out.push(value.to_string());
        }
        start = close + 6;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    #[test]
    fn test_extract_title() {
        let html = r#"<html><head><title>Test Page</title></head><body></body></html>"#;
        let parsed = parse_page(html, &base_url(), "body");
        assert_eq!(parsed.title, Some("Test Page".to_string()));
    }

    #[test]
    fn test_no_title() {
        let html = r#"<html><head></head><body>content</body></html>"#;
        let parsed = parse_page(html, &base_url(), "body");
        assert_eq!(parsed.title, None);
    }

    #[test]
    fn test_extract_relative_link() {
        let html = r#"<html><body><a href="/other">Link</a></body></html>"#;
        let parsed = parse_page(html, &base_url(), "body");
        assert_eq!(parsed.links, vec!["https://example.com/other"]);
    }

    #[test]
    fn test_skip_special_schemes() {
        let html = r##"
            <html><body>
                <a href="javascript:void(0)">js</a>
                <a href="mailto:test@example.com">mail</a>
                <a href="tel:+1234567890">tel</a>
                <a href="#section">anchor</a>
                <a href="/valid">valid</a>
            </body></html>
        "##;
        let parsed = parse_page(html, &base_url(), "body");
        assert_eq!(parsed.links, vec!["https://example.com/valid"]);
    }

    #[test]
    fn test_skip_download_link() {
        let html = r#"<html><body><a href="/file.pdf" download>Download</a></body></html>"#;
        let parsed = parse_page(html, &base_url(), "body");
        assert!(parsed.links.is_empty());
    }

    #[test]
    fn test_content_selector_scopes_text() {
        let html = r#"
            <html><body>
                <nav>Navigation stuff</nav>
                <article>The actual content</article>
            </body></html>
        "#;
        let parsed = parse_page(html, &base_url(), "article");
        assert_eq!(parsed.text, "The actual content");
    }

    #[test]
    fn test_missing_selector_falls_back_to_document() {
        let html = r#"<html><body><p>Hello</p><p>world</p></body></html>"#;
        let parsed = parse_page(html, &base_url(), ".does-not-exist");
        assert_eq!(parsed.text, "Hello world");
    }

    #[test]
    fn test_extract_text_links_plain() {
        let text = "Docs:\nhttps://example.com/a\nhttps://example.com/b\nnot a link";
        let links = extract_text_links(text);
        assert_eq!(
            links,
            vec!["https://example.com/a", "https://example.com/b"]
        );
    }

    #[test]
    fn test_extract_text_links_markdown() {
        let text = "- [Intro](https://example.com/intro): start here";
        let links = extract_text_links(text);
        assert_eq!(links, vec!["https://example.com/intro"]);
    }

    #[test]
    fn test_extract_loc_values() {
        let xml = r#"<?xml version="1.0"?>
            <urlset>
                <url><loc>https://example.com/a</loc></url>
                <url><loc> https://example.com/b </loc></url>
                <url><loc></loc></url>
            </urlset>"#;
        let locs = extract_loc_values(xml);
        assert_eq!(
            locs,
            vec!["https://example.com/a", "https://example.com/b"]
        );
    }

    #[test]
    fn test_loc_unclosed_tag() {
        let xml = "<urlset><url><loc>https://example.com/a</url></urlset>";
        assert!(extract_loc_values(xml).is_empty());
    }
}
