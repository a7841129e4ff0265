//! Dispatch results - what each provider produced for one request.

pub mod response;

pub use response::{EmptyResultReason, ProviderErrorKind, ProviderResponse, classify_empty_result};
