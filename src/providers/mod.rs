/*!
 * Text-to-speech provider clients.
 *
 * This module contains the client used to turn subtitle text into downloadable audio:
 * - `tts_api`: HTTP conversion API (request returns a download location)
 * - `mock`: In-process provider for tests and dry runs
 */

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::errors::ProviderError;

/// Parameters of one synthesis request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SynthesisRequest {
    /// Text to speak
    pub input_text: String,
    /// Voice identifier
    pub voice: String,
    /// Requested bit rate, sent as a string the way the API expects it
    pub bit_rate: String,
}

impl SynthesisRequest {
    pub fn new(input_text: impl Into<String>, voice: impl Into<String>, bit_rate: u32) -> Self {
        Self {
            input_text: input_text.into(),
            voice: voice.into(),
            bit_rate: bit_rate.to_string(),
        }
    }
}

/// What the provider hands back: where the audio can be fetched from
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResponse {
    pub download_url: String,
}

/// Common trait for text-to-speech providers
///
/// Implementations are shared between concurrent synthesis tasks, so they must be
/// `Send + Sync`.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Ask the provider to synthesize speech for a request
    ///
    /// # Returns
    /// * `Result<SynthesisResponse, ProviderError>` - The download location or an error
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisResponse, ProviderError>;

    /// Fetch the synthesized audio from a download location
    async fn fetch_audio(&self, url: &str) -> Result<Bytes, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;
}

pub mod mock;
pub mod tts_api;
