//! Web evidence gathering use case
//!
//! search -> sanitize/dedupe/cap URLs -> scrape -> retry failures once at
//! the shorter timeout. Everything is bounded by the request deadline and
//! nothing here fails the request: the worst case is an empty page list.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use verity_domain::{WebDocument, sanitize_urls};

use crate::config::ValidationSettings;
use crate::ports::web_evidence::WebEvidenceSource;

pub struct EvidenceGatherer {
    source: Arc<dyn WebEvidenceSource>,
    settings: ValidationSettings,
}

impl EvidenceGatherer {
    pub fn new(source: Arc<dyn WebEvidenceSource>, settings: ValidationSettings) -> Self {
        Self { source, settings }
    }

    /// Retrieve up to `max_documents` pages relevant to `query`.
    ///
    /// Returned pages keep search rank order; pages that failed both
    /// attempts are included with `status = error`.
    pub async fn gather(&self, query: &str, deadline: Instant) -> Vec<WebDocument> {
        let deadline = tokio::time::Instant::from_std(deadline);

        let hits = match tokio::time::timeout_at(
            deadline,
            self.source.search(query, self.settings.search_results),
        )
        .await
        {
            Ok(hits) => hits,
            Err(_) => {
                warn!("Web search timed out");
                return Vec::new();
            }
        };

        let (urls, rejected) = sanitize_urls(
            hits.iter().map(|d| d.url.as_str()),
            self.settings.document_limit(),
        );
        for reason in &rejected {
            debug!("Dropped search hit: {}", reason);
        }
        if urls.is_empty() {
            info!("Web search returned no usable URLs");
            return Vec::new();
        }

        let mut pages = match tokio::time::timeout_at(
            deadline,
            self.source.scrape(&urls, self.settings.page_timeout),
        )
        .await
        {
            Ok(pages) => pages,
            Err(_) => {
                warn!("Page retrieval hit the request deadline");
                return urls
                    .into_iter()
                    .map(|url| WebDocument::error(url, "request deadline reached"))
                    .collect();
            }
        };

        let failed: Vec<String> = pages
            .iter()
            .filter(|p| !p.is_usable())
            .map(|p| p.url.clone())
            .collect();
        if failed.is_empty() {
            return pages;
        }

        debug!("Retrying {} page(s)", failed.len());
        let retried = match tokio::time::timeout_at(
            deadline,
            self.source.scrape(&failed, self.settings.retry_timeout),
        )
        .await
        {
            Ok(retried) => retried,
            Err(_) => return pages,
        };

        for page in retried.into_iter().filter(WebDocument::is_usable) {
            if let Some(slot) = pages.iter_mut().find(|p| p.url == page.url) {
                *slot = page;
            }
        }
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Serves canned search hits; each URL fails a scripted number of times
    struct StaticEvidence {
        hits: Vec<&'static str>,
        failures: Mutex<HashMap<String, usize>>,
        fetched: Mutex<Vec<(String, Duration)>>,
        search_delay: Duration,
    }

    impl StaticEvidence {
        fn new(hits: Vec<&'static str>) -> Self {
            Self {
                hits,
                failures: Mutex::new(HashMap::new()),
                fetched: Mutex::new(Vec::new()),
                search_delay: Duration::ZERO,
            }
        }

        fn failing(self, url: &str, times: usize) -> Self {
            self.failures.lock().insert(url.to_string(), times);
            self
        }
    }

    #[async_trait]
    impl WebEvidenceSource for StaticEvidence {
        async fn search(&self, _query: &str, limit: usize) -> Vec<WebDocument> {
            tokio::time::sleep(self.search_delay).await;
            self.hits
                .iter()
                .take(limit)
                .map(|url| WebDocument::success(*url, ""))
                .collect()
        }

        async fn fetch(&self, url: &str, timeout: Duration) -> WebDocument {
            self.fetched.lock().push((url.to_string(), timeout));
            let mut failures = self.failures.lock();
            match failures.get_mut(url) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    WebDocument::error(url, "connection reset")
                }
                _ => WebDocument::success(url, "Paris is the capital of France."),
            }
        }
    }

    fn settings() -> ValidationSettings {
        ValidationSettings {
            page_timeout: Duration::from_secs(5),
            retry_timeout: Duration::from_secs(2),
            ..ValidationSettings::default()
        }
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[tokio::test]
    async fn test_https_only_deduplicated_and_capped() {
        let source = Arc::new(StaticEvidence::new(vec![
            "http://insecure.example/a",
            "https://a.example/page#top",
            "https://a.example/page",
            "https://b.example/",
            "https://c.example/x",
            "https://d.example/y",
        ]));
        let gatherer = EvidenceGatherer::new(source.clone(), settings());

        let pages = gatherer.gather("capital of France", deadline()).await;
        let urls: Vec<_> = pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://a.example/page", "https://b.example", "https://c.example/x"]
        );
        assert!(pages.iter().all(WebDocument::is_usable));
    }

    #[tokio::test]
    async fn test_failed_page_is_retried_once_with_shorter_timeout() {
        let source = Arc::new(
            StaticEvidence::new(vec!["https://flaky.example/p"]).failing("https://flaky.example/p", 1),
        );
        let gatherer = EvidenceGatherer::new(source.clone(), settings());

        let pages = gatherer.gather("q", deadline()).await;
        assert!(pages[0].is_usable());

        let fetched = source.fetched.lock().clone();
        assert_eq!(
            fetched.iter().map(|(_, t)| *t).collect::<Vec<_>>(),
            vec![Duration::from_secs(5), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn test_page_failing_twice_is_kept_as_error() {
        let source = Arc::new(
            StaticEvidence::new(vec!["https://down.example", "https://up.example"])
                .failing("https://down.example", 5),
        );
        let gatherer = EvidenceGatherer::new(source.clone(), settings());

        let pages = gatherer.gather("q", deadline()).await;
        assert_eq!(pages.len(), 2);
        assert!(!pages[0].is_usable());
        assert!(pages[1].is_usable());
        assert_eq!(source.fetched.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_search_past_deadline_yields_nothing() {
        let mut source = StaticEvidence::new(vec!["https://a.example"]);
        source.search_delay = Duration::from_secs(10);
        let gatherer = EvidenceGatherer::new(Arc::new(source), settings());

        let pages = gatherer
            .gather("q", Instant::now() + Duration::from_millis(50))
            .await;
        assert!(pages.is_empty());
    }
}
