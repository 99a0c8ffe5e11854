use crate::UrlError;
use url::{ParseError, Url};

/// Normalizes a URL into its deduplication key form
///
/// # Normalization Steps
///
/// 1. Resolve relative references against `base`
/// 2. Reject anything that is not http/https
/// 3. Remove the fragment (everything after #)
/// 4. Remove a single trailing slash, except when the path is exactly `/`
/// 5. Preserve the query string verbatim (URLs differing only in query are
///    distinct)
///
/// This is a pure function: the same input always yields the same output,
/// which is what makes it usable as the basis of the dedup invariant.
///
/// # Arguments
///
/// * `url_str` - The URL to normalize, absolute or relative
/// * `base` - Base URL used to resolve relative references
///
/// # Returns
///
/// * `Ok(Url)` - Normalized URL
/// * `Err(UrlError)` - Malformed input; the caller drops the URL, never
///   retries it
pub fn normalize(url_str: &str, base: &Url) -> Result<Url, UrlError> {
    // Step 1: parse, resolving relative references against the base
    let mut url = match Url::parse(url_str) {
        Ok(url) => url,
        Err(ParseError::RelativeUrlWithoutBase) => base
            .join(url_str)
            .map_err(|e| UrlError::Parse(e.to_string()))?,
        Err(e) => return Err(UrlError::Parse(e.to_string())),
    };

    // Step 2: only http and https are crawlable
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    // Step 3: drop the fragment
    url.set_fragment(None);

    // Step 4: single trailing slash removed, root path kept
    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed };
        let trimmed = trimmed.to_string();
        url.set_path(&trimmed);
    }

    Ok(url)
}
