//! Web evidence port
//!
//! Search and page retrieval used to validate extracted facts. Both
//! operations fail soft: network problems yield an empty list or an
//! error-status document, never an `Err`.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use verity_domain::WebDocument;

#[async_trait]
pub trait WebEvidenceSource: Send + Sync {
    /// Rank-ordered search hits for `query`, at most `limit`
    async fn search(&self, query: &str, limit: usize) -> Vec<WebDocument>;

    /// Retrieve one page, giving up after `timeout`
    async fn fetch(&self, url: &str, timeout: Duration) -> WebDocument;

    /// Retrieve pages concurrently, preserving input order
    async fn scrape(&self, urls: &[String], timeout: Duration) -> Vec<WebDocument> {
        join_all(urls.iter().map(|url| self.fetch(url, timeout))).await
    }
}
