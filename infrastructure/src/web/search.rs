//! DuckDuckGo Instant Answer result parsing

use serde_json::Value;

/// DuckDuckGo Instant Answer API endpoint (no API key required)
pub(super) const DDG_API_URL: &str = "https://api.duckduckgo.com/";

/// Rank-ordered, de-duplicated result URLs from an Instant Answer response.
///
/// Order: `AbstractURL`, then `Results[].FirstURL`, then
/// `RelatedTopics[].FirstURL` (descending into topic groups).
pub fn result_urls(data: &Value) -> Vec<String> {
    let mut urls = Vec::new();

    push_url(&mut urls, &data["AbstractURL"]);

    if let Some(results) = data["Results"].as_array() {
        for result in results {
            push_url(&mut urls, &result["FirstURL"]);
        }
    }

    if let Some(topics) = data["RelatedTopics"].as_array() {
        for topic in topics {
            match topic["Topics"].as_array() {
                Some(group) => {
                    for nested in group {
                        push_url(&mut urls, &nested["FirstURL"]);
                    }
                }
                None => push_url(&mut urls, &topic["FirstURL"]),
            }
        }
    }

    urls
}

fn push_url(urls: &mut Vec<String>, value: &Value) {
    if let Some(url) = value.as_str().map(str::trim)
        && !url.is_empty()
        && !urls.iter().any(|u| u == url)
    {
        urls.push(url.to_string());
    }
}
