//! Web evidence validation - classifying extracted facts against scraped pages.
//!
//! The pure scoring lives here; retrieval (search, scrape, retries) is an
//! application/infrastructure concern.

pub mod entities;
pub mod url;
pub mod validator;

pub use entities::{FactCheck, PageStatus, ValidationResult, Verdict, WebDocument};
pub use url::{MAX_WEB_DOCUMENTS, sanitize_url, sanitize_urls};
pub use validator::EvidenceValidator;
