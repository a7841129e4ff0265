//! `reqwest`-backed web evidence source

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};
use verity_application::WebEvidenceSource;
use verity_domain::WebDocument;

use super::html::{extract_title, html_to_text};
use super::search::{DDG_API_URL, result_urls};

/// Maximum response body size (5 MB)
const MAX_BODY_SIZE: usize = 5 * 1024 * 1024;

const USER_AGENT: &str = concat!("verity/", env!("CARGO_PKG_VERSION"), " (evidence fetcher)");

/// Searches DuckDuckGo and scrapes result pages.
///
/// Pages are only read over HTTPS, including every redirect hop. Every
/// failure becomes an empty hit list or an error-status document.
pub struct HttpEvidenceSource {
    client: reqwest::Client,
    search_url: String,
}

impl HttpEvidenceSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            search_url: DDG_API_URL.to_string(),
        }
    }

    /// Source backed by its own client that refuses plain-HTTP requests,
    /// so a redirect to `http://` fails instead of being followed.
    pub fn https_only() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .https_only(true)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self::new(client))
    }

    /// Point search at a different Instant Answer compatible endpoint
    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }

    async fn fetch_page(&self, url: &str, timeout: Duration) -> Result<WebDocument, String> {
        let parsed = reqwest::Url::parse(url).map_err(|e| format!("invalid url: {}", e))?;
        if !is_https(&parsed) {
            return Err(format!("refusing non-https url ({})", parsed.scheme()));
        }

        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    "timed out".to_string()
                } else {
                    format!("request failed: {}", e)
                }
            })?;

        if !is_https(response.url()) {
            return Err(format!("redirected to non-https url {}", response.url()));
        }

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        if response.content_length().unwrap_or(0) > MAX_BODY_SIZE as u64 {
            return Err("response too large".to_string());
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("text/html") || ct.contains("application/xhtml"));

        let body = response
            .bytes()
            .await
            .map_err(|e| format!("failed to read body: {}", e))?;
        if body.len() > MAX_BODY_SIZE {
            return Err("response too large".to_string());
        }
        let body = String::from_utf8_lossy(&body);

        if is_html {
            let document = WebDocument::success(url, &html_to_text(&body));
            Ok(match extract_title(&body) {
                Some(title) => document.with_title(title),
                None => document,
            })
        } else {
            Ok(WebDocument::success(url, &body))
        }
    }
}

fn is_https(url: &reqwest::Url) -> bool {
    url.scheme() == "https"
}

#[async_trait]
impl WebEvidenceSource for HttpEvidenceSource {
    async fn search(&self, query: &str, limit: usize) -> Vec<WebDocument> {
        let response = match self
            .client
            .get(&self.search_url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!("Search API returned {}", r.status());
                return Vec::new();
            }
            Err(e) => {
                warn!("Search request failed: {}", e);
                return Vec::new();
            }
        };

        let body: serde_json::Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to parse search results: {}", e);
                return Vec::new();
            }
        };

        let urls = result_urls(&body);
        debug!("Search returned {} urls", urls.len());
        urls.into_iter()
            .take(limit)
            .map(|url| WebDocument::success(url, ""))
            .collect()
    }

    async fn fetch(&self, url: &str, timeout: Duration) -> WebDocument {
        match self.fetch_page(url, timeout).await {
            Ok(document) => document,
            Err(reason) => {
                debug!("Fetch of {} failed: {}", url, reason);
                WebDocument::error(url, reason)
            }
        }
    }
}
