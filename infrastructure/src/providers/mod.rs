//! Provider adapters.
//!
//! [`HttpProvider`] is a generic JSON-over-HTTP backend; any service that
//! accepts `{prompt, history}` and answers `{text, metadata?}` can take part
//! in consensus. [`build_providers`] turns `[[providers]]` tables into
//! ready-to-dispatch adapters.

mod http;

pub use http::{HttpProvider, ProviderBuildError, build_providers};
