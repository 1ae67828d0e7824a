/*!
 * Mock provider implementation for testing.
 *
 * The mock never touches the network. The "audio" it returns is a small text payload
 * (`duration=<seconds>`), which the recording media toolkit in the test suite knows how
 * to read back. Behaviours:
 * - `MockProvider::working()` - Always succeeds
 * - `MockProvider::fail_first(n)` - Fails the first `n` requests, then succeeds
 * - `MockProvider::failing()` - Always fails with an error
 * - `MockProvider::missing_download()` - Answers without a download location
 */

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::ProviderError;
use crate::providers::{Provider, SynthesisRequest, SynthesisResponse};

/// Duration reported for texts without an explicit entry
pub const DEFAULT_MOCK_DURATION: f64 = 1.0;

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Fails the first N synthesis requests
    FailFirst { failures: usize },
    /// Always fails with an error
    Failing,
    /// Returns a response without a download location
    MissingDownload,
}

/// Mock text-to-speech provider
#[derive(Debug)]
pub struct MockProvider {
    behavior: MockBehavior,
    /// Speech duration per input text
    durations: HashMap<String, f64>,
    synth_calls: Arc<AtomicUsize>,
    fetch_calls: Arc<AtomicUsize>,
    /// Every request seen, in arrival order
    requests: Arc<Mutex<Vec<SynthesisRequest>>>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            durations: HashMap::new(),
            synth_calls: Arc::new(AtomicUsize::new(0)),
            fetch_calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn fail_first(failures: usize) -> Self {
        Self::new(MockBehavior::FailFirst { failures })
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn missing_download() -> Self {
        Self::new(MockBehavior::MissingDownload)
    }

    /// Set the speech duration produced for a given text
    pub fn with_duration(mut self, text: impl Into<String>, seconds: f64) -> Self {
        self.durations.insert(text.into(), seconds);
        self
    }

    /// Number of synthesis requests received
    pub fn synth_calls(&self) -> usize {
        self.synth_calls.load(Ordering::SeqCst)
    }

    /// Number of audio downloads served
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Copy of every request received so far
    pub fn requests(&self) -> Vec<SynthesisRequest> {
        self.requests.lock().clone()
    }

    /// Payload the mock serves for a given duration
    pub fn audio_payload(seconds: f64) -> Bytes {
        Bytes::from(format!("duration={}\n", seconds))
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisResponse, ProviderError> {
        let call = self.synth_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().push(request.clone());

        match self.behavior {
            MockBehavior::Failing => {
                return Err(ProviderError::ConnectionError("Mock provider is offline".to_string()));
            }
            MockBehavior::FailFirst { failures } if call <= failures => {
                return Err(ProviderError::ApiError {
                    status_code: 503,
                    message: format!("Mock failure {} of {}", call, failures),
                });
            }
            MockBehavior::MissingDownload => {
                return Err(ProviderError::MissingDownloadUrl("mock response had no download field".to_string()));
            }
            _ => {}
        }

        let seconds = self.durations
            .get(&request.input_text)
            .copied()
            .unwrap_or(DEFAULT_MOCK_DURATION);

        Ok(SynthesisResponse {
            download_url: format!("mock://audio/{}?duration={}", call, seconds),
        })
    }

    async fn fetch_audio(&self, url: &str) -> Result<Bytes, ProviderError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let seconds = url
            .split_once("duration=")
            .and_then(|(_, value)| value.parse::<f64>().ok())
            .ok_or_else(|| ProviderError::RequestFailed(format!("Unknown mock url: {}", url)))?;

        Ok(Self::audio_payload(seconds))
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("Mock provider is offline".to_string())),
            _ => Ok(()),
        }
    }
}
