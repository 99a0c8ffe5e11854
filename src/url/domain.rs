use url::Url;

/// Extracts the host portion of a URL, if present
pub fn extract_host(url: &Url) -> Option<&str> {
    url.host_str()
}

/// Returns true when both URLs share the same host
///
/// Port and scheme are ignored; recursive traversal treats
/// `http://docs.example.com` and `https://docs.example.com` as the same
/// site, but `example.com` and `docs.example.com` as different ones.
pub fn is_same_host(a: &Url, b: &Url) -> bool {
    match (a.host_str(), b.host_str()) {
        (Some(ha), Some(hb)) => ha.eq_ignore_ascii_case(hb),
        _ => false,
    }
}
