//! Fact extraction - verifiable statements derived from provider output.

pub mod extractor;
pub mod fact;

pub use extractor::FactExtractor;
pub use fact::ExtractedFact;
