/*!
 * Speech synthesis for one segment.
 *
 * A segment's audio is produced by a synthesize, download, tempo-adjust and replace
 * sequence, retried as a whole with exponential backoff. The download lands on a raw
 * scratch path and only the adjusted file is moved over the artifact path, so a later
 * run cannot pick up an unadjusted download as a cache hit.
 */

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use rand::Rng;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::SynthesisConfig;
use crate::errors::SegmentError;
use crate::file_utils::FileManager;
use crate::media_tools::MediaToolkit;
use crate::providers::{Provider, SynthesisRequest};
use crate::subtitle_processor::SubtitleSegment;

use super::artifacts::{AudioArtifact, StageOutcome, WorkspaceLayout};

/// Settings for the synthesis worker
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    pub voice: String,
    pub bit_rate: u32,
    pub tempo: f64,
    pub max_attempts: u32,
    pub replace_attempts: u32,
    pub retry_backoff: Duration,
    pub replace_retry_delay: Duration,
}

impl SynthesisOptions {
    pub fn from_config(config: &SynthesisConfig) -> Self {
        Self {
            voice: config.voice.clone(),
            bit_rate: config.bit_rate,
            tempo: config.tempo,
            max_attempts: config.max_attempts.max(1),
            replace_attempts: config.replace_attempts.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            replace_retry_delay: Duration::from_millis(config.replace_retry_delay_ms),
        }
    }
}

/// Delay before retry number `attempt` (1-based): doubled each time, plus up to a
/// quarter of the base as jitter so parallel segments do not retry in lockstep
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let base_ms = base.as_millis() as u64;
    if base_ms == 0 {
        return Duration::ZERO;
    }
    let exponent = attempt.saturating_sub(1).min(10);
    let jitter = rand::rng().random_range(0..=base_ms / 4);
    Duration::from_millis(base_ms * (1u64 << exponent) + jitter)
}

/// Turns subtitle text into speed-adjusted audio artifacts
#[derive(Debug, Clone)]
pub struct SpeechSynthesizer {
    provider: Arc<dyn Provider>,
    media: Arc<dyn MediaToolkit>,
    layout: Arc<WorkspaceLayout>,
    options: SynthesisOptions,
}

impl SpeechSynthesizer {
    pub fn new(
        provider: Arc<dyn Provider>,
        media: Arc<dyn MediaToolkit>,
        layout: Arc<WorkspaceLayout>,
        options: SynthesisOptions,
    ) -> Self {
        Self {
            provider,
            media,
            layout,
            options,
        }
    }

    /// Produce the audio artifact for one segment
    ///
    /// Blank text yields `StageOutcome::Skipped`. An existing artifact at the segment's
    /// path is reused without contacting the provider.
    pub async fn synthesize(&self, segment: &SubtitleSegment) -> Result<StageOutcome<AudioArtifact>, SegmentError> {
        let index = segment.index;
        if !segment.has_speech() {
            debug!("Segment {} has no text, skipping synthesis", index);
            return Ok(StageOutcome::Skipped);
        }

        let path = self.layout.audio_path(index);
        let temp = self.layout.temp_audio_path(index);
        let raw = self.layout.raw_audio_path(index);

        if FileManager::file_exists(&path) {
            match self.media.probe_duration(&path).await {
                Ok(duration) => {
                    debug!("Reusing audio for segment {} ({:.3}s)", index, duration);
                    return Ok(StageOutcome::Reused(AudioArtifact {
                        segment_index: index,
                        path,
                        duration,
                    }));
                }
                Err(e) => {
                    warn!("Existing audio for segment {} is unreadable, regenerating: {}", index, e);
                    self.discard(&[&path, &temp, &raw]);
                }
            }
        }

        let max_attempts = self.options.max_attempts;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.produce(segment, &raw, &temp, &path).await {
                Ok(()) => break,
                Err(e) => {
                    self.discard(&[&path, &temp, &raw]);
                    if attempt >= max_attempts {
                        return Err(e.into_segment_error(index, attempt));
                    }
                    warn!("Synthesis attempt {}/{} for segment {} failed: {}", attempt, max_attempts, index, e);
                    tokio::time::sleep(backoff_delay(self.options.retry_backoff, attempt)).await;
                }
            }
        }

        let duration = match self.media.probe_duration(&path).await {
            Ok(duration) => duration,
            Err(e) => {
                self.discard(&[&path, &temp, &raw]);
                return Err(SegmentError::Synthesis {
                    index,
                    attempts: attempt,
                    message: e.to_string(),
                });
            }
        };

        debug!("Segment {} synthesized: {:.3}s of speech", index, duration);
        Ok(StageOutcome::Produced(AudioArtifact {
            segment_index: index,
            path,
            duration,
        }))
    }

    /// One full attempt: synthesize, download to `raw`, adjust into `temp`, move to `path`
    async fn produce(&self, segment: &SubtitleSegment, raw: &Path, temp: &Path, path: &Path) -> Result<(), AttemptError> {
        self.download_and_adjust(segment, raw, temp)
            .await
            .map_err(AttemptError::Produce)?;
        if let Err(e) = FileManager::remove_if_exists(raw) {
            warn!("Could not remove {:?}: {}", raw, e);
        }

        FileManager::replace_with_retry(temp, path, self.options.replace_attempts, self.options.replace_retry_delay)
            .await
            .map_err(AttemptError::Replace)
    }

    async fn download_and_adjust(&self, segment: &SubtitleSegment, raw: &Path, temp: &Path) -> Result<()> {
        let request = SynthesisRequest::new(segment.text.clone(), self.options.voice.clone(), self.options.bit_rate);
        let response = self.provider.synthesize(&request).await?;
        let audio = self.provider.fetch_audio(&response.download_url).await?;
        if audio.is_empty() {
            return Err(anyhow!("Downloaded audio is empty"));
        }

        tokio::fs::write(raw, &audio)
            .await
            .with_context(|| format!("Failed to write {:?}", raw))?;

        self.media
            .adjust_tempo(raw, self.options.tempo, temp)
            .await
            .context("Tempo adjustment failed")?;

        Ok(())
    }

    fn discard(&self, files: &[&Path]) {
        for file in files {
            if let Err(e) = FileManager::remove_if_exists(file) {
                warn!("Could not remove {:?}: {}", file, e);
            }
        }
    }
}

/// Why a single attempt failed
#[derive(Debug)]
enum AttemptError {
    Produce(anyhow::Error),
    Replace(std::io::Error),
}

impl AttemptError {
    fn into_segment_error(self, index: usize, attempts: u32) -> SegmentError {
        match self {
            Self::Produce(e) => SegmentError::Synthesis {
                index,
                attempts,
                message: format!("{:#}", e),
            },
            Self::Replace(e) => SegmentError::Replace {
                index,
                message: e.to_string(),
            },
        }
    }
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Produce(e) => write!(f, "{:#}", e),
            Self::Replace(e) => write!(f, "replace failed: {}", e),
        }
    }
}
