//! Query value object

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Context label used when a query carries no explicit context.
pub const DEFAULT_CONTEXT: &str = "default";

/// A query to be answered by the provider pool (Value Object)
///
/// Holds the prompt sent to every provider and an optional context string
/// that scopes caching (two identical prompts under different contexts
/// never share a cache entry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<String>,
}

impl Query {
    /// Create a new query, rejecting blank prompts
    pub fn new(prompt: impl Into<String>) -> Result<Self, DomainError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(DomainError::InvalidQuery("query cannot be empty".to_string()));
        }
        Ok(Self {
            prompt,
            context: None,
        })
    }

    /// Attach a context; blank contexts are treated as absent
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        self.context = if context.trim().is_empty() {
            None
        } else {
            Some(context)
        };
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Context string used for cache keying (`"default"` when absent)
    pub fn context_or_default(&self) -> &str {
        self.context.as_deref().unwrap_or(DEFAULT_CONTEXT)
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.prompt)
    }
}
