//! Wait profiles for documentation-site frameworks
//!
//! A wait profile pairs a CSS selector (the page's main content region) with
//! a page timeout. The profile only decides how long to wait and where to
//! look for content; it never affects correctness.

use crate::config::WaitProfileEntry;
use std::time::Duration;

/// Selector/timeout pair applied to a fetch
#[derive(Debug, Clone)]
pub struct WaitProfile {
    /// Name of the matched framework, "generic" for the fallback
    pub framework: String,

    /// CSS selector scoping the main content region
    pub selector: String,

    /// Per-request page timeout
    pub timeout: Duration,
}

/// Built-in framework table: (URL substring, content selector)
///
/// Evaluated top-to-bottom; first match wins.
const FRAMEWORK_TABLE: &[(&str, &str)] = &[
    ("docusaurus", ".markdown, .theme-doc-markdown, article"),
    ("vitepress", ".VPDoc, .vp-doc, .content"),
    ("gitbook", ".markdown-section, .page-wrapper"),
    ("mkdocs", ".md-content, article"),
    ("docsify", "#main, .markdown-section"),
    ("readthedocs", ".document, [role=main]"),
    ("sphinx", ".body, [role=main]"),
    ("nextra", "main, article"),
    ("copilotkit", "div[class*=content], div[class*=doc], #__next"),
    ("milkdown", "main, article, .prose, [class*=content]"),
];

const DOCS_TIMEOUT: Duration = Duration::from_secs(30);
const GENERIC_TIMEOUT: Duration = Duration::from_secs(45);

/// Ordered list of (pattern, profile) pairs with a generic fallback
#[derive(Debug, Clone)]
pub struct WaitProfileTable {
    entries: Vec<(String, WaitProfile)>,
    generic: WaitProfile,
}

impl WaitProfileTable {
    /// Builds the table: configured entries first, then the built-in
    /// framework rows
    pub fn from_config(extra: &[WaitProfileEntry]) -> Self {
        let mut entries = Vec::with_capacity(extra.len() + FRAMEWORK_TABLE.len());

        for entry in extra {
            entries.push((
                entry.pattern.to_lowercase(),
                WaitProfile {
                    framework: entry.pattern.clone(),
                    selector: entry.selector.clone(),
                    timeout: Duration::from_millis(entry.timeout_ms),
                },
            ));
        }

        for (pattern, selector) in FRAMEWORK_TABLE {
            entries.push((
                (*pattern).to_string(),
                WaitProfile {
                    framework: (*pattern).to_string(),
                    selector: (*selector).to_string(),
                    timeout: DOCS_TIMEOUT,
                },
            ));
        }

        Self {
            entries,
            generic: WaitProfile {
                framework: "generic".to_string(),
                selector: "body".to_string(),
                timeout: GENERIC_TIMEOUT,
            },
        }
    }

    /// Selects the profile for a URL by substring match, falling back to the
    /// generic profile
    pub fn profile_for(&self, url: &str) -> &WaitProfile {
        let url_lower = url.to_lowercase();
        self.entries
            .iter()
            .find(|(pattern, _)| url_lower.contains(pattern.as_str()))
            .map(|(_, profile)| profile)
            .unwrap_or(&self.generic)
    }
}

impl Default for WaitProfileTable {
    fn default() -> Self {
        Self::from_config(&[])
    }
}
