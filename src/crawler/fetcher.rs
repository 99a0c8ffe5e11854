//! HTTP fetcher implementation
//!
//! One fetch-and-extract of a single URL with framework-specific wait
//! profiles and retry/backoff:
//! - attempt 1 may be served from intermediary caches; attempts >= 2 send
//!   `Cache-Control: no-cache` to force a fresh response
//! - backoff before retry n+1 is 2^(n-1) seconds (1s, 2s, 4s, ...)
//! - a response counts as successful only if the HTTP status is success and
//!   the extracted text reaches the minimum content length
//!
//! Exhausting all attempts yields a `FetchResult` with `success: false`,
//! terminal for that URL but never fatal for the operation. The fetcher does
//! not touch the dedup registry; claiming is the strategy's responsibility,
//! so a fetch can be retried without polluting dedup state.

use crate::config::{Config, UserAgentConfig};
use crate::crawler::controller::AdaptiveLimiter;
use crate::crawler::parser::{parse_page, ParsedPage};
use crate::crawler::wait::{WaitProfile, WaitProfileTable};
use crate::url::is_same_host;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::{header, Client};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Result of one fetch, successful or exhausted-retry
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// The URL as requested
    pub url: String,

    /// Whether an acceptable response was obtained
    pub success: bool,

    /// Extracted text of the main content region
    pub markdown: String,

    /// Raw response body
    pub html: String,

    /// Page title, "Untitled" when absent
    pub title: String,

    /// Same-host absolute links found on the page
    pub internal_links: Vec<String>,

    /// Last failure reason when `success` is false
    pub error: Option<String>,
}

impl FetchResult {
    /// Builds the terminal result for a URL whose attempts are exhausted
    pub fn failure(url: &str, error: String) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            markdown: String::new(),
            html: String::new(),
            title: String::new(),
            internal_links: Vec::new(),
            error: Some(error),
        }
    }
}

/// The fetch seam strategies depend on; tests substitute counting mocks
#[async_trait]
pub trait PageFetch: Send + Sync {
    /// Fetches and extracts one page
    async fn fetch(&self, url: &Url) -> FetchResult;

    /// Fetches a raw resource body (sitemap XML, link-collection text) with
    /// the same retry policy but no content extraction
    async fn fetch_raw(&self, url: &Url) -> Result<String, FetchError>;
}

/// Builds the HTTP client shared by all operations
///
/// The user agent follows the `name/version (+contact-url; contact-email)`
/// convention. Per-request timeouts come from wait profiles, so only the
/// connect timeout is set here.
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed page fetcher
pub struct PageFetcher {
    client: Client,
    profiles: WaitProfileTable,
    cpu: Arc<AdaptiveLimiter>,
    max_attempts: u32,
    min_content_length: usize,
}

impl PageFetcher {
    pub fn new(client: Client, config: &Config, cpu: Arc<AdaptiveLimiter>) -> Self {
        Self {
            client,
            profiles: WaitProfileTable::from_config(&config.wait_profiles),
            cpu,
            max_attempts: config.crawler.max_attempts.max(1),
            min_content_length: config.crawler.min_content_length,
        }
    }

    async fn attempt_page(
        &self,
        url: &Url,
        profile: &WaitProfile,
        attempt: u32,
    ) -> Result<FetchResult, FetchError> {
        let body = self.request(url, profile.timeout, attempt).await?;

        // Parsing is CPU-bound; gate it through the worker pool
        let _permit = self.cpu.acquire().await;
        let parse_url = url.clone();
        let selector = profile.selector.clone();
        let parse_body = body.clone();
        let parsed: ParsedPage =
            tokio::task::spawn_blocking(move || parse_page(&parse_body, &parse_url, &selector))
                .await
                .map_err(|e| FetchError::Network {
                    url: url.to_string(),
                    message: format!("parse task failed: {}", e),
                })?;

        let text_length = parsed.text.trim().len();
        if text_length < self.min_content_length {
            return Err(FetchError::ContentTooShort {
                url: url.to_string(),
                length: text_length,
            });
        }

        let internal_links = parsed
            .links
            .iter()
            .filter(|link| {
                Url::parse(link)
                    .map(|l| is_same_host(&l, url))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        Ok(FetchResult {
            url: url.to_string(),
            success: true,
            markdown: parsed.text,
            html: body,
            title: parsed.title.unwrap_or_else(|| "Untitled".to_string()),
            internal_links,
            error: None,
        })
    }

    async fn request(
        &self,
        url: &Url,
        timeout: Duration,
        attempt: u32,
    ) -> Result<String, FetchError> {
        let mut request = self.client.get(url.clone()).timeout(timeout);
        if attempt > 1 {
            request = request.header(header::CACHE_CONTROL, "no-cache");
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(url, e))
    }
}

#[async_trait]
impl PageFetch for PageFetcher {
    async fn fetch(&self, url: &Url) -> FetchResult {
        let fetch_url = rewrite_github_blob(url);
        let profile = self.profiles.profile_for(fetch_url.as_str()).clone();

        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                let backoff = Duration::from_secs(1u64 << (attempt - 2));
                tracing::debug!(url = %fetch_url, attempt, ?backoff, "retrying after backoff");
                tokio::time::sleep(backoff).await;
            }

            match self.attempt_page(&fetch_url, &profile, attempt).await {
                Ok(result) => {
                    tracing::debug!(
                        url = %fetch_url,
                        attempt,
                        framework = %profile.framework,
                        content_length = result.markdown.len(),
                        "fetched"
                    );
                    return result;
                }
                Err(e) => {
                    tracing::warn!(url = %fetch_url, attempt, error = %e, "fetch attempt failed");
                    last_error = e.to_string();
                }
            }
        }

        FetchResult::failure(url.as_str(), last_error)
    }

    async fn fetch_raw(&self, url: &Url) -> Result<String, FetchError> {
        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                let backoff = Duration::from_secs(1u64 << (attempt - 2));
                tokio::time::sleep(backoff).await;
            }

            match self.request(url, GENERIC_RAW_TIMEOUT, attempt).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    tracing::warn!(url = %url, attempt, error = %e, "raw fetch attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(FetchError::Network {
            url: url.to_string(),
            message: "no attempts made".to_string(),
        }))
    }
}

const GENERIC_RAW_TIMEOUT: Duration = Duration::from_secs(30);

fn classify_reqwest_error(url: &Url, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if let Some(status) = error.status() {
        FetchError::Http {
            url: url.to_string(),
            status: status.as_u16(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

/// Rewrites GitHub blob URLs to their raw-content form
fn rewrite_github_blob(url: &Url) -> Url {
    if url.host_str() == Some("github.com") && url.path().contains("/blob/") {
        let raw = url
            .as_str()
            .replace("github.com", "raw.githubusercontent.com")
            .replace("/blob/", "/");
        if let Ok(rewritten) = Url::parse(&raw) {
            return rewritten;
        }
    }
    url.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::time::Instant;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_fetcher(max_attempts: u32) -> PageFetcher {
        let mut config = Config::default();
        config.crawler.max_attempts = max_attempts;
        let client = build_http_client(&config.user_agent).unwrap();
        PageFetcher::new(client, &config, Arc::new(AdaptiveLimiter::new(2, 1)))
    }

    fn long_body(marker: &str) -> String {
        format!(
            r#"<html><head><title>{}</title></head><body>
            <a href="/next">next</a>
            <a href="https://elsewhere.test/out">out</a>
            <p>{}</p>
            </body></html>"#,
            marker,
            "sufficiently long page content for validation ".repeat(3)
        )
    }

    #[test]
    fn test_build_http_client() {
        let config = UserAgentConfig::default();
        assert!(build_http_client(&config).is_ok());
    }

    #[test]
    fn test_rewrite_github_blob() {
        let url = Url::parse("https://github.com/owner/repo/blob/main/README.md").unwrap();
        let rewritten = rewrite_github_blob(&url);
        assert_eq!(
            rewritten.as_str(),
            "https://raw.githubusercontent.com/owner/repo/main/README.md"
        );

        let plain = Url::parse("https://github.com/owner/repo").unwrap();
        assert_eq!(rewrite_github_blob(&plain), plain);
    }

    #[tokio::test]
    async fn test_successful_fetch_extracts_links_and_title() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string(long_body("A Title")))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(1);
        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
        let result = fetcher.fetch(&url).await;

        assert!(result.success);
        assert_eq!(result.title, "A Title");
        // Only the same-host link survives
        assert_eq!(result.internal_links.len(), 1);
        assert!(result.internal_links[0].ends_with("/next"));
    }

    #[tokio::test]
    async fn test_retry_backoff_then_success() {
        let server = MockServer::start().await;

        // Two failures, then success
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string(long_body("Recovered")))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(3);
        let url = Url::parse(&format!("{}/flaky", server.uri())).unwrap();

        let start = Instant::now();
        let result = fetcher.fetch(&url).await;
        let elapsed = start.elapsed();

        assert!(result.success);
        // Backoff of 1s then 2s; allow a little scheduling slack
        assert!(
            elapsed >= Duration::from_millis(2900),
            "expected >= 2.9s of backoff, got {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn test_exhausted_attempts_terminal_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(1);
        let url = Url::parse(&format!("{}/gone", server.uri())).unwrap();
        let result = fetcher.fetch(&url).await;

        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("404"), "unexpected error: {}", error);
    }

    #[tokio::test]
    async fn test_short_content_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/thin"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><body>tiny</body></html>"),
            )
            .mount(&server)
            .await;

        let fetcher = test_fetcher(1);
        let url = Url::parse(&format!("{}/thin", server.uri())).unwrap();
        let result = fetcher.fetch(&url).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("too short"));
    }

    #[tokio::test]
    async fn test_fetch_raw_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<urlset><url><loc>https://x.test/a</loc></url></urlset>"),
            )
            .mount(&server)
            .await;

        let fetcher = test_fetcher(1);
        let url = Url::parse(&format!("{}/sitemap.xml", server.uri())).unwrap();
        let body = fetcher.fetch_raw(&url).await.unwrap();
        assert!(body.contains("<loc>"));
    }
}
