//! HTTP odds source
//!
//! Transport is shared; everything source-specific (URL, auth headers,
//! response envelope) comes from the configured adapter.

use super::types::{RawPayload, SourceError};
use super::OddsSource;
use crate::config::SourceConfig;
use crate::odds::GameId;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Odds source reached over HTTP
pub struct HttpSource {
    config: SourceConfig,
    client: Client,
    api_key: RwLock<Option<String>>,
}

impl HttpSource {
    pub fn new(config: SourceConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let api_key = config.resolve_api_key();
        if api_key.is_none() {
            tracing::warn!(source = %config.name, "No API key configured");
        }
        Ok(Self {
            config,
            client,
            api_key: RwLock::new(api_key),
        })
    }
}

/// Map an HTTP status to the error taxonomy. `None` means success.
pub(crate) fn classify_status(status: StatusCode) -> Option<SourceError> {
    match status {
        s if s.is_success() => None,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Some(SourceError::AuthFailure(format!("HTTP {}", status.as_u16())))
        }
        StatusCode::TOO_MANY_REQUESTS => Some(SourceError::RateLimited),
        s if s.is_server_error() => Some(SourceError::TransientNetwork(format!(
            "HTTP {}",
            s.as_u16()
        ))),
        s => Some(SourceError::MalformedResponse(format!(
            "unexpected HTTP {}",
            s.as_u16()
        ))),
    }
}

fn transport_error(e: reqwest::Error) -> SourceError {
    if e.is_decode() {
        SourceError::MalformedResponse(e.to_string())
    } else {
        SourceError::TransientNetwork(e.to_string())
    }
}

#[async_trait]
impl OddsSource for HttpSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn fetch(&self, game_id: &GameId) -> Result<RawPayload, SourceError> {
        let api_key = self
            .api_key
            .read()
            .clone()
            .ok_or_else(|| SourceError::AuthFailure("no API key configured".to_string()))?;

        let adapter = self.config.kind.adapter();
        let request = adapter.build_request(&self.client, &self.config, game_id, &api_key);

        tracing::debug!(source = %self.config.name, game_id = %game_id, "Fetching odds");

        let response = request.send().await.map_err(transport_error)?;
        if let Some(err) = classify_status(response.status()) {
            return Err(err);
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        let body: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| SourceError::MalformedResponse(e.to_string()))?;
        let body = adapter.unwrap_envelope(body)?;

        Ok(RawPayload {
            source: self.config.name.clone(),
            game_id: game_id.clone(),
            body,
            received_at: Utc::now(),
        })
    }

    fn update_credentials(&self, token: String) {
        *self.api_key.write() = Some(token);
    }
}
