//! URL sanitization for evidence retrieval

use crate::core::error::EvidenceError;

/// Hard cap on pages retrieved per validation
pub const MAX_WEB_DOCUMENTS: usize = 3;

/// Normalize a URL for evidence retrieval.
///
/// Only `https://` URLs with a host are accepted; the fragment is dropped
/// and a trailing slash on a bare host is removed so duplicates collapse.
pub fn sanitize_url(raw: &str) -> Result<String, EvidenceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return Err(EvidenceError::InvalidUrl(raw.to_string()));
    }

    let Some((scheme, rest)) = trimmed.split_once("://") else {
        return Err(EvidenceError::InvalidUrl(raw.to_string()));
    };
    if !scheme.eq_ignore_ascii_case("https") {
        return Err(EvidenceError::NotHttps(raw.to_string()));
    }

    let rest = rest.split('#').next().unwrap_or_default();
    let (host, path) = match rest.find(['/', '?']) {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    };
    let host = host.to_ascii_lowercase();
    if host.is_empty() || host.contains('@') {
        return Err(EvidenceError::InvalidUrl(raw.to_string()));
    }

    let path = if path == "/" { "" } else { path };
    Ok(format!("https://{}{}", host, path))
}

/// Sanitize, deduplicate (first occurrence wins) and cap a URL list.
///
/// Rejected URLs are returned alongside so callers can log them.
pub fn sanitize_urls<'a, I>(urls: I, max: usize) -> (Vec<String>, Vec<EvidenceError>)
where
    I: IntoIterator<Item = &'a str>,
{
    let cap = max.min(MAX_WEB_DOCUMENTS);
    let mut accepted: Vec<String> = Vec::new();
    let mut rejected = Vec::new();

    for raw in urls {
        if accepted.len() >= cap {
            break;
        }
        match sanitize_url(raw) {
            Ok(url) => {
                if !accepted.contains(&url) {
                    accepted.push(url);
                }
            }
            Err(e) => rejected.push(e),
        }
    }

    (accepted, rejected)
}
