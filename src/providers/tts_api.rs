use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, error};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::app_config::SynthesisConfig;
use crate::errors::ProviderError;
use super::{Provider, SynthesisRequest, SynthesisResponse};

/// Client for the HTTP text-to-speech conversion API
///
/// The API is a single GET endpoint taking `input_text`, `voice` and `bit_rate` as query
/// parameters. It answers with a JSON object whose `download` field points at the
/// generated MP3.
#[derive(Debug)]
pub struct TtsApi {
    /// Conversion endpoint URL
    endpoint: String,
    /// HTTP client for making requests
    client: Client,
    /// Voice used by `test_connection`
    voice: String,
    /// Request timeout, kept for error reporting
    timeout_secs: u64,
}

/// Conversion response body
#[derive(Debug, Deserialize)]
pub struct ConvertResponse {
    /// Location of the generated audio
    #[serde(default)]
    pub download: Option<String>,
    /// Status text some API versions include
    #[serde(default)]
    pub message: Option<String>,
}

impl TtsApi {
    /// Create a new client for the given endpoint
    pub fn new(endpoint: impl Into<String>, voice: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                // Keep connections alive across the many small requests of a run
                .pool_idle_timeout(Duration::from_secs(90))
                .pool_max_idle_per_host(20)
                .tcp_keepalive(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            voice: voice.into(),
            timeout_secs,
        }
    }

    /// Create a client from the synthesis section of the configuration
    pub fn from_config(config: &SynthesisConfig) -> Self {
        Self::new(config.endpoint.clone(), config.voice.clone(), config.timeout_secs)
    }

    fn map_transport_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            ProviderError::ConnectionError(e.to_string())
        } else {
            ProviderError::RequestFailed(e.to_string())
        }
    }

    /// Extract the download URL from a raw response body
    pub fn parse_response(body: &str) -> Result<SynthesisResponse, ProviderError> {
        let parsed: ConvertResponse = serde_json::from_str(body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            ProviderError::ParseError(format!("{} (body: {})", e, preview))
        })?;

        match parsed.download {
            Some(url) if !url.trim().is_empty() => Ok(SynthesisResponse {
                download_url: url.trim().to_string(),
            }),
            _ => Err(ProviderError::MissingDownloadUrl(
                parsed.message.unwrap_or_else(|| "no message".to_string()),
            )),
        }
    }
}

#[async_trait]
impl Provider for TtsApi {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisResponse, ProviderError> {
        let response = self.client.get(&self.endpoint)
            .query(request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let body = response.text().await
            .map_err(|e| self.map_transport_error(e))?;

        if !status.is_success() {
            error!("TTS API error ({}): {}", status, body);
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message: body,
            });
        }

        Self::parse_response(&body)
    }

    async fn fetch_audio(&self, url: &str) -> Result<Bytes, ProviderError> {
        let response = self.client.get(url)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await
            .map_err(|e| self.map_transport_error(e))?;
        debug!("Downloaded {} bytes from {}", bytes.len(), url);

        if bytes.is_empty() {
            return Err(ProviderError::RequestFailed(format!("Empty audio body from {}", url)));
        }

        Ok(bytes)
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let request = SynthesisRequest::new("test", self.voice.clone(), 64000);
        self.synthesize(&request).await.map(|_| ())
    }
}
