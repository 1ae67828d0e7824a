/*!
 * Pipeline orchestration.
 *
 * Stages run strictly one after another. Within a stage, segments fan out over a
 * bounded pool and the stage joins completely before the next one starts, since video
 * cutting needs every audio duration (or its confirmed absence). Per-segment results
 * land in index-keyed slots, so completion order never affects output order.
 */

use futures::stream::{self, StreamExt};
use log::{debug, error, info};
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::{Config, FailurePolicy};
use crate::errors::{PipelineError, SegmentError};
use crate::media_tools::MediaToolkit;
use crate::progress::{ProgressLevel, ProgressSink, ProgressTracker};
use crate::providers::Provider;
use crate::subtitle_processor::SubtitleSegment;

use super::artifacts::{AudioArtifact, SegmentSlots, StageOutcome, VideoArtifact, WorkspaceLayout};
use super::concat::ConcatenationFinalizer;
use super::concurrency::StageLimits;
use super::merge::SegmentMerger;
use super::synthesis::{SpeechSynthesizer, SynthesisOptions};
use super::video::VideoCutter;

/// Orchestrator states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Idle,
    SynthesizingAudio,
    CuttingVideo,
    Merging,
    Concatenating,
    Done,
    Failed,
}

impl PipelineState {
    /// Percentage reported on entering this state
    pub fn progress_percent(self) -> Option<u8> {
        match self {
            Self::Idle => Some(0),
            Self::SynthesizingAudio => Some(10),
            Self::CuttingVideo => Some(50),
            Self::Merging => Some(70),
            Self::Concatenating => Some(90),
            Self::Done => Some(100),
            Self::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Stages advance one step at a time; any running state may fail
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, SynthesizingAudio)
                | (SynthesizingAudio, CuttingVideo)
                | (CuttingVideo, Merging)
                | (Merging, Concatenating)
                | (Concatenating, Done)
                | (Idle | SynthesizingAudio | CuttingVideo | Merging | Concatenating, Failed)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::SynthesizingAudio => "synthesizing audio",
            Self::CuttingVideo => "cutting video",
            Self::Merging => "merging",
            Self::Concatenating => "concatenating",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Settings for one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub synthesis: SynthesisOptions,
    pub limits: StageLimits,
    pub failure_policy: FailurePolicy,
    pub keep_intermediates: bool,
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            synthesis: SynthesisOptions::from_config(&config.synthesis),
            limits: StageLimits::from_config(config),
            failure_policy: config.failure_policy.clone(),
            keep_intermediates: config.workspace.keep_intermediates,
        }
    }
}

/// Per-stage tally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub produced: usize,
    pub reused: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl StageCounts {
    fn record<T>(&mut self, outcome: &StageOutcome<T>) {
        match outcome {
            StageOutcome::Produced(_) => self.produced += 1,
            StageOutcome::Reused(_) => self.reused += 1,
            StageOutcome::Skipped => self.skipped += 1,
        }
    }

    /// Segments that ended with an artifact
    pub fn succeeded(&self) -> usize {
        self.produced + self.reused
    }
}

/// Summary of a successful run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub segments: usize,
    pub audio: StageCounts,
    pub video: StageCounts,
    pub merged: StageCounts,
    /// Speed ratio each clip was actually cut at, `None` where the cut failed
    pub speed_ratios: Vec<Option<f64>>,
    /// Indices listed in the manifest, ascending
    pub merged_indices: Vec<usize>,
    pub output: PathBuf,
    pub removed_files: usize,
    pub elapsed: Duration,
}

/// Drives the stages for one dubbing job
///
/// A pipeline value runs once; construct a new one for another job.
pub struct DubbingPipeline {
    provider: Arc<dyn Provider>,
    media: Arc<dyn MediaToolkit>,
    layout: Arc<WorkspaceLayout>,
    options: PipelineOptions,
    tracker: ProgressTracker,
    state: Mutex<PipelineState>,
}

impl DubbingPipeline {
    pub fn new(
        provider: Arc<dyn Provider>,
        media: Arc<dyn MediaToolkit>,
        config: &Config,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self::with_options(
            provider,
            media,
            WorkspaceLayout::from_config(&config.workspace),
            PipelineOptions::from_config(config),
            progress,
        )
    }

    pub fn with_options(
        provider: Arc<dyn Provider>,
        media: Arc<dyn MediaToolkit>,
        layout: WorkspaceLayout,
        options: PipelineOptions,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            provider,
            media,
            layout: Arc::new(layout),
            options,
            tracker: ProgressTracker::new(progress),
            state: Mutex::new(PipelineState::Idle),
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    /// Run every stage and report exactly one terminal event
    pub async fn run(
        &self,
        segments: &[SubtitleSegment],
        source_video: &Path,
        output: &Path,
    ) -> Result<PipelineReport, PipelineError> {
        let started = Instant::now();

        match self.execute(segments, source_video, output, started).await {
            Ok(report) => {
                self.transition(PipelineState::Done)?;
                let message = format!(
                    "Dubbed video written to {} ({} of {} segments merged in {:.1}s)",
                    report.output.display(),
                    report.merged_indices.len(),
                    report.segments,
                    report.elapsed.as_secs_f64()
                );
                info!("{}", message);
                self.tracker.finish(PipelineState::Done, ProgressLevel::Info, message);
                Ok(report)
            }
            Err(e) => {
                let previous = {
                    let mut state = self.state.lock();
                    let previous = *state;
                    if previous.can_transition_to(PipelineState::Failed) {
                        *state = PipelineState::Failed;
                    }
                    previous
                };
                error!("Pipeline failed while {}: {}", previous, e);
                if previous != PipelineState::Done {
                    self.tracker.finish(
                        PipelineState::Failed,
                        ProgressLevel::Error,
                        format!("Dubbing failed while {}: {}", previous, e),
                    );
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        segments: &[SubtitleSegment],
        source_video: &Path,
        output: &Path,
        started: Instant,
    ) -> Result<PipelineReport, PipelineError> {
        check_segments(segments)?;
        self.layout.prepare()?;
        let total = segments.len();

        // Stage 1: speech
        self.enter(
            PipelineState::SynthesizingAudio,
            format!("Synthesizing audio for {} segment(s)", total),
        )?;
        let (audio, audio_counts, audio_failures) = self.synthesize_all(segments).await?;
        let speaking = total - audio_counts.skipped;
        self.report_failures(&audio_failures);
        check_threshold(
            "Audio synthesis",
            audio_failures,
            speaking,
            self.options.failure_policy.min_audio_success_ratio,
        )?;

        // Stage 2: video
        self.enter(
            PipelineState::CuttingVideo,
            format!("Cutting video ({} audio clip(s) ready)", audio.filled()),
        )?;
        let (video, video_counts, video_failures) = self.cut_all(segments, source_video, &audio).await?;
        self.report_failures(&video_failures);
        check_threshold(
            "Video cutting",
            video_failures,
            total,
            self.options.failure_policy.min_video_success_ratio,
        )?;

        // Stage 3: merge
        self.enter(PipelineState::Merging, format!("Merging {} clip(s)", video.filled()))?;
        let merger = SegmentMerger::new(self.media.clone(), self.layout.clone(), self.options.limits.merge);
        let summary = merger.merge_all(&audio, &video).await?;
        self.report_failures(&summary.failures);
        merger.write_manifest(&summary.merged).await?;
        let merged_counts = StageCounts {
            produced: summary.merged.filled() - summary.reused,
            reused: summary.reused,
            skipped: summary.skipped,
            failed: summary.failures.len(),
        };
        let merged_indices: Vec<usize> = summary.merged.iter().map(|(index, _)| index).collect();

        // Stage 4: concatenation
        self.enter(
            PipelineState::Concatenating,
            format!("Concatenating {} merged clip(s)", merged_indices.len()),
        )?;
        let finalizer = ConcatenationFinalizer::new(
            self.media.clone(),
            self.layout.clone(),
            self.options.keep_intermediates,
        );
        let finalized = finalizer.finalize(output).await?;

        Ok(PipelineReport {
            segments: total,
            audio: audio_counts,
            video: video_counts,
            merged: merged_counts,
            speed_ratios: (0..total).map(|i| video.get(i).map(|v| v.speed_ratio)).collect(),
            merged_indices,
            output: finalized.output,
            removed_files: finalized.removed_files,
            elapsed: started.elapsed(),
        })
    }

    async fn synthesize_all(
        &self,
        segments: &[SubtitleSegment],
    ) -> Result<(SegmentSlots<AudioArtifact>, StageCounts, Vec<SegmentError>), PipelineError> {
        let synthesizer = SpeechSynthesizer::new(
            self.provider.clone(),
            self.media.clone(),
            self.layout.clone(),
            self.options.synthesis.clone(),
        );

        let results = stream::iter(segments)
            .map(|segment| {
                let synthesizer = &synthesizer;
                async move { (segment.index, synthesizer.synthesize(segment).await) }
            })
            .buffer_unordered(self.options.limits.synthesis)
            .collect::<Vec<_>>()
            .await;

        collect_stage(segments.len(), results)
    }

    async fn cut_all(
        &self,
        segments: &[SubtitleSegment],
        source_video: &Path,
        audio: &SegmentSlots<AudioArtifact>,
    ) -> Result<(SegmentSlots<VideoArtifact>, StageCounts, Vec<SegmentError>), PipelineError> {
        let cutter = VideoCutter::new(self.media.clone(), self.layout.clone(), source_video)
            .with_replace_policy(
                self.options.synthesis.replace_attempts,
                self.options.synthesis.replace_retry_delay,
            );

        let results = stream::iter(segments)
            .map(|segment| {
                let cutter = &cutter;
                async move { (segment.index, cutter.cut(segment, audio.get(segment.index)).await) }
            })
            .buffer_unordered(self.options.limits.video)
            .collect::<Vec<_>>()
            .await;

        collect_stage(segments.len(), results)
    }

    fn enter(&self, next: PipelineState, message: String) -> Result<(), PipelineError> {
        self.transition(next)?;
        if let Some(percent) = next.progress_percent() {
            self.tracker.advance(percent, next, message);
        }
        Ok(())
    }

    fn transition(&self, next: PipelineState) -> Result<(), PipelineError> {
        let mut state = self.state.lock();
        if !state.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition(format!("{} -> {}", *state, next)));
        }
        debug!("Pipeline state: {} -> {}", *state, next);
        *state = next;
        Ok(())
    }

    fn report_failures(&self, failures: &[SegmentError]) {
        let state = self.state();
        for failure in failures {
            self.tracker.note(state, ProgressLevel::Warn, failure.to_string());
        }
    }
}

/// Segments must be indexed 0..n in order
fn check_segments(segments: &[SubtitleSegment]) -> Result<(), PipelineError> {
    if segments.is_empty() {
        return Err(PipelineError::InvalidInput("no subtitle segments to dub".to_string()));
    }
    for (position, segment) in segments.iter().enumerate() {
        if segment.index != position {
            return Err(PipelineError::InvalidInput(format!(
                "segment at position {} has index {}",
                position, segment.index
            )));
        }
        if segment.end_ms <= segment.start_ms {
            return Err(PipelineError::InvalidInput(format!(
                "segment {} ends before it starts",
                segment.index
            )));
        }
    }
    Ok(())
}

/// Fold joined task results into slots, counts and index-sorted failures
fn collect_stage<T>(
    len: usize,
    results: Vec<(usize, Result<StageOutcome<T>, SegmentError>)>,
) -> Result<(SegmentSlots<T>, StageCounts, Vec<SegmentError>), PipelineError> {
    let mut slots = SegmentSlots::new(len);
    let mut counts = StageCounts::default();
    let mut failures = Vec::new();

    for (index, result) in results {
        match result {
            Ok(outcome) => {
                counts.record(&outcome);
                if let Some(artifact) = outcome.artifact() {
                    slots.set(index, artifact)?;
                }
            }
            Err(e) => {
                counts.failed += 1;
                failures.push(e);
            }
        }
    }
    failures.sort_by_key(SegmentError::index);

    Ok((slots, counts, failures))
}

/// Apply the minimum success ratio for a stage.
///
/// With a strict policy (1.0) the lowest-index failure is returned as is; otherwise a
/// breach is summarized.
pub fn check_threshold(
    stage: &str,
    mut failures: Vec<SegmentError>,
    attempted: usize,
    min_success_ratio: f64,
) -> Result<(), PipelineError> {
    if failures.is_empty() || attempted == 0 {
        return Ok(());
    }
    let failed = failures.len();
    let success_ratio = attempted.saturating_sub(failed) as f64 / attempted as f64;
    if success_ratio >= min_success_ratio {
        return Ok(());
    }
    if min_success_ratio >= 1.0 {
        return Err(PipelineError::Segment(failures.remove(0)));
    }
    Err(PipelineError::TooManyFailures {
        stage: stage.to_string(),
        failed,
        total: attempted,
    })
}
