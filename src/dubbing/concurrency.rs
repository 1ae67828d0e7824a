/*!
 * Stage-specific concurrency tuning.
 *
 * Synthesis waits on the network and tolerates wide fan-out; cutting and merging
 * keep a decoder busy per task and are held lower.
 */

use crate::app_config::Config;

/// Pipeline stages that fan out over segments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Synthesis,
    Video,
    Merge,
}

/// Concurrency profile with tuned defaults for one stage
#[derive(Debug, Clone)]
pub struct StageProfile {
    /// Maximum concurrent tasks
    pub max_concurrent_tasks: usize,
}

impl StageProfile {
    /// Get the default profile for a stage
    pub fn for_stage(stage: Stage) -> Self {
        match stage {
            Stage::Synthesis => Self { max_concurrent_tasks: 20 },
            Stage::Video => Self { max_concurrent_tasks: 10 },
            // Stream copy for video, only the audio is encoded
            Stage::Merge => Self { max_concurrent_tasks: 4 },
        }
    }

    /// Get effective concurrency, respecting any user override
    pub fn effective_concurrency(&self, user_override: Option<usize>) -> usize {
        user_override.unwrap_or(self.max_concurrent_tasks).max(1)
    }
}

/// Resolved pool sizes for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageLimits {
    pub synthesis: usize,
    pub video: usize,
    pub merge: usize,
}

impl StageLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            synthesis: StageProfile::for_stage(Stage::Synthesis)
                .effective_concurrency(Some(config.synthesis.concurrent_requests)),
            video: StageProfile::for_stage(Stage::Video)
                .effective_concurrency(Some(config.video.concurrent_jobs)),
            merge: StageProfile::for_stage(Stage::Merge)
                .effective_concurrency(Some(config.video.merge_concurrency)),
        }
    }
}

impl Default for StageLimits {
    fn default() -> Self {
        Self {
            synthesis: StageProfile::for_stage(Stage::Synthesis).max_concurrent_tasks,
            video: StageProfile::for_stage(Stage::Video).max_concurrent_tasks,
            merge: StageProfile::for_stage(Stage::Merge).max_concurrent_tasks,
        }
    }
}
