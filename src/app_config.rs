use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use url::Url;

use crate::file_utils::FileManager;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Text-to-speech settings
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Media tool and video stage settings
    #[serde(default)]
    pub video: VideoConfig,

    /// Where intermediate artifacts live
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// How many per-segment failures a run tolerates
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Text-to-speech request and retry settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SynthesisConfig {
    // @field: Conversion endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    // @field: Voice identifier sent with every request
    #[serde(default = "default_voice")]
    pub voice: String,

    // @field: Requested audio bit rate
    #[serde(default = "default_bit_rate")]
    pub bit_rate: u32,

    // @field: Tempo multiplier applied to every synthesized clip
    #[serde(default = "default_tempo")]
    pub tempo: f64,

    /// Attempts for the whole synthesize + download + adjust sequence
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Attempts for moving the adjusted clip over the artifact path
    #[serde(default = "default_replace_attempts")]
    pub replace_attempts: u32,

    /// Base backoff between synthesis attempts, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Pause between replace attempts
    #[serde(default = "default_replace_retry_delay_ms")]
    pub replace_retry_delay_ms: u64,

    /// HTTP request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Max concurrent synthesis tasks
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            voice: default_voice(),
            bit_rate: default_bit_rate(),
            tempo: default_tempo(),
            max_attempts: default_max_attempts(),
            replace_attempts: default_replace_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            replace_retry_delay_ms: default_replace_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
            concurrent_requests: default_concurrent_requests(),
        }
    }
}

/// Media tool settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VideoConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,

    /// Codec used when cutting and retiming clips
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    /// Codec used for the dubbed audio track
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Max concurrent cut/retime jobs
    #[serde(default = "default_concurrent_jobs")]
    pub concurrent_jobs: usize,

    /// Max concurrent merge jobs
    #[serde(default = "default_merge_concurrency")]
    pub merge_concurrency: usize,

    /// Upper bound for a single tool invocation
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            concurrent_jobs: default_concurrent_jobs(),
            merge_concurrency: default_merge_concurrency(),
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

/// Layout of the working directory
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkspaceConfig {
    /// Root for every intermediate directory
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    #[serde(default = "default_audio_dir")]
    pub audio_dir: String,

    #[serde(default = "default_clip_dir")]
    pub clip_dir: String,

    #[serde(default = "default_merged_dir")]
    pub merged_dir: String,

    /// File name of the concatenation manifest inside `merged_dir`
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,

    /// Skip cleanup after a successful run
    #[serde(default)]
    pub keep_intermediates: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            audio_dir: default_audio_dir(),
            clip_dir: default_clip_dir(),
            merged_dir: default_merged_dir(),
            manifest_name: default_manifest_name(),
            keep_intermediates: false,
        }
    }
}

/// Minimum share of segments that must succeed in a stage.
///
/// With the defaults a single exhausted synthesis aborts the run, while failed
/// video cuts only leave gaps in the output.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FailurePolicy {
    #[serde(default = "default_min_audio_success_ratio")]
    pub min_audio_success_ratio: f64,

    #[serde(default = "default_min_video_success_ratio")]
    pub min_video_success_ratio: f64,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            min_audio_success_ratio: default_min_audio_success_ratio(),
            min_video_success_ratio: default_min_video_success_ratio(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_endpoint() -> String {
    "https://mobifone.ai/api/v1/convert-tts".to_string()
}

fn default_voice() -> String {
    "hn_female_ngochuyen_fast_news_48k-thg".to_string()
}

fn default_bit_rate() -> u32 {
    64000
}

fn default_tempo() -> f64 {
    1.25
}

fn default_max_attempts() -> u32 {
    5
}

fn default_replace_attempts() -> u32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    500 // doubled on each retry
}

fn default_replace_retry_delay_ms() -> u64 {
    100
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_concurrent_requests() -> usize {
    20
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_concurrent_jobs() -> usize {
    10
}

fn default_merge_concurrency() -> usize {
    4
}

fn default_tool_timeout_secs() -> u64 {
    600
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_audio_dir() -> String {
    "audio_clip".to_string()
}

fn default_clip_dir() -> String {
    "clip_cut".to_string()
}

fn default_merged_dir() -> String {
    "merged_clips".to_string()
}

fn default_manifest_name() -> String {
    "filelist.txt".to_string()
}

fn default_min_audio_success_ratio() -> f64 {
    1.0
}

fn default_min_video_success_ratio() -> f64 {
    0.0
}

// atempo only accepts factors in this range
const MIN_TEMPO: f64 = 0.5;
const MAX_TEMPO: f64 = 100.0;

impl Config {
    /// Load a configuration file, or write and return the defaults when it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<(Self, bool)> {
        let path = path.as_ref();
        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let reader = BufReader::new(file);
            let config: Config = serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            return Ok((config, false));
        }

        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        FileManager::write_to_file(path, &config_json)
            .with_context(|| format!("Failed to write default config to file: {}", path.display()))?;

        Ok((config, true))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        let synthesis = &self.synthesis;

        Url::parse(&synthesis.endpoint)
            .map_err(|e| anyhow!("Invalid synthesis endpoint '{}': {}", synthesis.endpoint, e))?;

        if synthesis.voice.trim().is_empty() {
            return Err(anyhow!("A synthesis voice is required"));
        }

        if !synthesis.tempo.is_finite() || synthesis.tempo < MIN_TEMPO || synthesis.tempo > MAX_TEMPO {
            return Err(anyhow!(
                "Tempo must be between {} and {}, got {}",
                MIN_TEMPO, MAX_TEMPO, synthesis.tempo
            ));
        }

        if synthesis.max_attempts == 0 || synthesis.replace_attempts == 0 {
            return Err(anyhow!("Retry attempt counts must be at least 1"));
        }

        if synthesis.concurrent_requests == 0
            || self.video.concurrent_jobs == 0
            || self.video.merge_concurrency == 0
        {
            return Err(anyhow!("Concurrency limits must be at least 1"));
        }

        for (name, ratio) in [
            ("min_audio_success_ratio", self.failure_policy.min_audio_success_ratio),
            ("min_video_success_ratio", self.failure_policy.min_video_success_ratio),
        ] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(anyhow!("{} must be within [0, 1], got {}", name, ratio));
            }
        }

        let workspace = &self.workspace;
        for (name, value) in [
            ("audio_dir", &workspace.audio_dir),
            ("clip_dir", &workspace.clip_dir),
            ("merged_dir", &workspace.merged_dir),
            ("manifest_name", &workspace.manifest_name),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("Workspace setting '{}' must not be empty", name));
            }
        }

        Ok(())
    }
}
