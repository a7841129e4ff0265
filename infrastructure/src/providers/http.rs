//! JSON-over-HTTP provider adapter

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use verity_application::{
    ConversationTurn, InferenceRequest, Provider, ProviderError, ProviderOutput,
};
use verity_domain::{DomainError, ProviderId};

use crate::config::FileProviderConfig;

/// Longest error body excerpt kept in an `Http` error
const ERROR_BODY_EXCERPT: usize = 200;

#[derive(Error, Debug)]
pub enum ProviderBuildError {
    #[error("Invalid provider id '{id}': {source}")]
    InvalidId { id: String, source: DomainError },

    #[error("Provider '{provider}': environment variable {var} is not set")]
    MissingApiKey { provider: String, var: String },
}

#[derive(Serialize)]
struct InferBody<'a> {
    prompt: &'a str,
    history: &'a [ConversationTurn],
}

#[derive(Deserialize)]
struct InferReply {
    text: String,
    #[serde(default)]
    metadata: Value,
}

/// Provider reached with `POST {endpoint}`.
///
/// The request deadline becomes the per-request `reqwest` timeout.
pub struct HttpProvider {
    id: ProviderId,
    endpoint: String,
    api_key: Option<String>,
    health_url: Option<String>,
    fallback: bool,
    client: reqwest::Client,
}

impl HttpProvider {
    pub fn new(id: ProviderId, endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            id,
            endpoint: endpoint.into(),
            api_key: None,
            health_url: None,
            fallback: false,
            client,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_health_url(mut self, url: impl Into<String>) -> Self {
        self.health_url = Some(url.into());
        self
    }

    pub fn as_fallback(mut self) -> Self {
        self.fallback = true;
        self
    }

    /// Build from a `[[providers]]` table, reading the token from the environment
    pub fn from_config(
        config: &FileProviderConfig,
        client: reqwest::Client,
    ) -> Result<Self, ProviderBuildError> {
        let id = ProviderId::new(config.id.as_str()).map_err(|source| {
            ProviderBuildError::InvalidId {
                id: config.id.clone(),
                source,
            }
        })?;

        let mut provider = Self::new(id, config.endpoint.as_str(), client);

        if let Some(var) = &config.api_key_env {
            let key = std::env::var(var).map_err(|_| ProviderBuildError::MissingApiKey {
                provider: config.id.clone(),
                var: var.clone(),
            })?;
            provider = provider.with_api_key(key);
        }
        if let Some(url) = &config.health_url {
            provider = provider.with_health_url(url.as_str());
        }
        if config.fallback {
            provider = provider.as_fallback();
        }
        Ok(provider)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

/// Build every configured provider, failing on the first bad table
pub fn build_providers(
    configs: &[FileProviderConfig],
    client: &reqwest::Client,
) -> Result<Vec<Arc<dyn Provider>>, ProviderBuildError> {
    configs
        .iter()
        .map(|config| {
            HttpProvider::from_config(config, client.clone())
                .map(|p| Arc::new(p) as Arc<dyn Provider>)
        })
        .collect()
}

/// Transport failures carry status 0: no HTTP status was received
fn map_send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Http {
            status: 0,
            message: format!("transport error: {}", e),
        }
    }
}

async fn status_error(response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("").to_string()
    } else {
        body.trim().chars().take(ERROR_BODY_EXCERPT).collect()
    };
    ProviderError::Http {
        status: status.as_u16(),
        message,
    }
}

/// Decode a successful reply body
fn parse_reply(body: &[u8]) -> Result<ProviderOutput, ProviderError> {
    let reply: InferReply = serde_json::from_slice(body)
        .map_err(|e| ProviderError::Protocol(format!("undecodable reply: {}", e)))?;
    Ok(ProviderOutput::new(reply.text).with_metadata(reply.metadata))
}

#[async_trait]
impl Provider for HttpProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn is_fallback(&self) -> bool {
        self.fallback
    }

    async fn infer(&self, request: &InferenceRequest) -> Result<ProviderOutput, ProviderError> {
        let remaining = request.remaining();
        if remaining.is_zero() {
            return Err(ProviderError::Timeout);
        }

        let body = InferBody {
            prompt: &request.prompt,
            history: &request.history,
        };
        let response = self
            .authorize(self.client.post(&self.endpoint))
            .timeout(remaining)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let bytes = response.bytes().await.map_err(map_send_error)?;
        debug!("Provider {} replied with {} bytes", self.id, bytes.len());
        parse_reply(&bytes)
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let Some(url) = &self.health_url else {
            return Ok(());
        };

        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(map_send_error)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(response).await)
        }
    }
}
