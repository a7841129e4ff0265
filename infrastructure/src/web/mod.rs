//! Web evidence adapter.
//!
//! [`HttpEvidenceSource`] implements the
//! [`WebEvidenceSource`](verity_application::WebEvidenceSource) port with
//! `reqwest`: search goes through the DuckDuckGo Instant Answer API (no API
//! key required) and pages are reduced to readable text with `scraper`.
//!
//! Only compiled with the `http` feature:
//!
//! ```toml
//! [features]
//! http = ["dep:reqwest", "dep:scraper"]
//! ```

mod html;
mod search;
mod source;

pub use html::{extract_title, html_to_text};
pub use search::result_urls;
pub use source::HttpEvidenceSource;
