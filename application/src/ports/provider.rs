//! Provider port
//!
//! Defines the interface for calling an answer-generating backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use verity_domain::{ProviderErrorKind, ProviderId};

/// Errors a provider can report for a single call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Timed out")]
    Timeout,

    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl ProviderError {
    /// Classification recorded on the provider's response
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            ProviderError::Timeout => ProviderErrorKind::Timeout,
            ProviderError::Http { status, message } => {
                ProviderErrorKind::Http(format!("{} {}", status, message).trim().to_string())
            }
            ProviderError::Protocol(msg) => ProviderErrorKind::Protocol(msg.clone()),
        }
    }
}

/// One prior exchange passed along with the prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A single inference call
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub prompt: String,
    pub history: Vec<ConversationTurn>,
    /// Hard deadline the provider must respect
    pub deadline: Instant,
}

impl InferenceRequest {
    pub fn new(prompt: impl Into<String>, deadline: Instant) -> Self {
        Self {
            prompt: prompt.into(),
            history: Vec::new(),
            deadline,
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            deadline,
            ..self.clone()
        }
    }

    /// Time left before the deadline (zero once it has passed)
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Text plus opaque metadata returned by a provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderOutput {
    pub text: String,
    pub metadata: Value,
}

impl ProviderOutput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Self-reported confidence, when the metadata carries a numeric `confidence`
    pub fn confidence(&self) -> Option<f64> {
        self.metadata.get("confidence").and_then(Value::as_f64)
    }
}

/// An answer-generating backend
///
/// Implementations must be safe to retry and must give up by
/// `request.deadline`. Adapters live in the infrastructure layer.
#[async_trait]
pub trait Provider: Send + Sync {
    fn id(&self) -> &ProviderId;

    /// Fallback providers are only called when too few primaries succeed
    fn is_fallback(&self) -> bool {
        false
    }

    async fn infer(&self, request: &InferenceRequest) -> Result<ProviderOutput, ProviderError>;

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}
