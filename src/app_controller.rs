use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::app_config::Config;
use crate::dubbing::{DubbingPipeline, PipelineReport};
use crate::errors::AppError;
use crate::file_utils::{FileManager, FileType};
use crate::media_tools::{Ffmpeg, MediaToolkit};
use crate::progress::{BroadcastProgress, ProgressEvent, ProgressLevel};
use crate::providers::tts_api::TtsApi;
use crate::providers::Provider;
use crate::subtitle_processor::SubtitleTrack;

// @module: Application controller for dubbing jobs

/// File name of the final video when no output path is given
pub const DEFAULT_OUTPUT_NAME: &str = "final_video.mp4";

/// File collecting per-segment problems, inside the work directory
pub const ISSUES_LOG_NAME: &str = "yastdub.issues.log";

/// How a `run` call ended
#[derive(Debug)]
pub enum RunOutcome {
    /// The pipeline ran and wrote the output
    Completed(PipelineReport),
    /// The output already existed and `force` was not set
    Skipped(PathBuf),
}

/// Main application controller for dubbing jobs
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Text-to-speech client
    provider: Arc<dyn Provider>,
    // @field: Media tool used for every audio/video step
    media: Arc<dyn MediaToolkit>,
}

impl Controller {
    // @method: Create a new controller with the production clients
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;
        let provider: Arc<dyn Provider> = Arc::new(TtsApi::from_config(&config.synthesis));
        let media: Arc<dyn MediaToolkit> = Arc::new(Ffmpeg::from_config(&config.video));
        Ok(Self::with_components(config, provider, media))
    }

    /// Create a controller around caller-supplied clients
    pub fn with_components(config: Config, provider: Arc<dyn Provider>, media: Arc<dyn MediaToolkit>) -> Self {
        Self {
            config,
            provider,
            media,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Output path used when the caller does not choose one
    pub fn default_output_path(&self) -> PathBuf {
        self.config.workspace.work_dir.join(DEFAULT_OUTPUT_NAME)
    }

    pub fn issues_log_path(&self) -> PathBuf {
        self.config.workspace.work_dir.join(ISSUES_LOG_NAME)
    }

    /// Dub `video_file` with speech generated from `subtitle_file`
    pub async fn run(
        &self,
        subtitle_file: PathBuf,
        video_file: PathBuf,
        output: Option<PathBuf>,
        force_overwrite: bool,
    ) -> Result<RunOutcome> {
        let start_time = std::time::Instant::now();
        let output = output.unwrap_or_else(|| self.default_output_path());

        if output.exists() && !force_overwrite {
            warn!("Skipping, output already exists (use -f to force overwrite): {:?}", output);
            return Ok(RunOutcome::Skipped(output));
        }

        self.expect_file_type(&subtitle_file, FileType::Subtitle).await?;
        self.expect_file_type(&video_file, FileType::Video).await?;

        let track = SubtitleTrack::load(&subtitle_file)
            .with_context(|| format!("Failed to load subtitles from {:?}", subtitle_file))?;
        info!(
            "Loaded {} segment(s), {} with speech, from {:?}",
            track.len(),
            track.speech_count(),
            subtitle_file
        );

        let progress = Arc::new(BroadcastProgress::new(track.len() * 2 + 16));
        let listener = Self::spawn_progress_bar(&progress);

        let pipeline = DubbingPipeline::new(self.provider.clone(), self.media.clone(), &self.config, progress);
        let result = pipeline.run(&track.segments, &video_file, &output).await;
        drop(pipeline);

        let issues = match listener.await {
            Ok(issues) => issues,
            Err(e) => {
                debug!("Progress listener ended abnormally: {}", e);
                Vec::new()
            }
        };
        if !issues.is_empty() {
            let context = format!("{:?} + {:?} -> {:?}", subtitle_file, video_file, output);
            if let Err(e) = self.write_issues(&issues, &context) {
                warn!("Could not write issues log: {:#}", e);
            }
        }

        match result {
            Ok(report) => {
                info!(
                    "Dubbing completed in {}: {} merged, {} reused audio clip(s), {} intermediate file(s) removed",
                    Self::format_duration(start_time.elapsed()),
                    report.merged_indices.len(),
                    report.audio.reused,
                    report.removed_files
                );
                Ok(RunOutcome::Completed(report))
            }
            Err(e) => {
                error!("Dubbing failed after {}", Self::format_duration(start_time.elapsed()));
                Err(AppError::from(e).into())
            }
        }
    }

    /// Check that the media tool runs and the speech API answers
    pub async fn check(&self) -> Result<()> {
        let version = self.media.check_available().await.map_err(AppError::from)?;
        info!("Media tool available: {}", version);

        self.provider.test_connection().await.map_err(AppError::from)?;
        info!("Text-to-speech endpoint reachable: {}", self.config.synthesis.endpoint);

        Ok(())
    }

    async fn expect_file_type(&self, path: &Path, expected: FileType) -> Result<()> {
        let owned = path.to_path_buf();
        let ffprobe = self.config.video.ffprobe_path.clone();
        let detected = tokio::task::spawn_blocking(move || FileManager::detect_file_type(&owned, &ffprobe))
            .await
            .context("File type detection task failed")??;
        if detected != expected {
            return Err(anyhow!(
                "Expected a {:?} file but {:?} looks like {:?}",
                expected,
                path,
                detected
            ));
        }
        Ok(())
    }

    /// Drive a progress bar from the event stream, returning warnings and errors seen
    fn spawn_progress_bar(progress: &BroadcastProgress) -> JoinHandle<Vec<ProgressEvent>> {
        let mut receiver = progress.subscribe();
        let progress_bar = ProgressBar::new(100);
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}% {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(template_result.progress_chars("█▓▒░"));

        tokio::spawn(async move {
            let mut issues = Vec::new();
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        progress_bar.set_position(u64::from(event.percent));
                        if event.level != ProgressLevel::Info {
                            issues.push(event.clone());
                        }
                        if event.terminal {
                            if event.level == ProgressLevel::Info {
                                progress_bar.finish_with_message(event.message);
                            } else {
                                progress_bar.abandon_with_message(event.message);
                            }
                            break;
                        }
                        progress_bar.set_message(event.message);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Progress display skipped {} event(s)", skipped);
                    }
                    Err(RecvError::Closed) => {
                        progress_bar.abandon();
                        break;
                    }
                }
            }
            issues
        })
    }

    fn write_issues(&self, issues: &[ProgressEvent], context: &str) -> Result<()> {
        let path = self.issues_log_path();
        FileManager::append_to_log_file(&path, &format!("Run: {}", context))?;
        for event in issues {
            FileManager::append_to_log_file(
                &path,
                &format!("[{}] ({}) {}", event.level, event.state, event.message),
            )?;
        }
        Ok(())
    }

    fn format_duration(duration: std::time::Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
