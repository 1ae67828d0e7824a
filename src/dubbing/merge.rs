/*!
 * Per-segment muxing and the concatenation manifest.
 *
 * Merge tasks run concurrently and finish in any order. The manifest is written only
 * after they have all joined, from the index-ordered slot arena, so its line order
 * never depends on scheduling.
 */

use futures::stream::{self, StreamExt};
use log::{debug, warn};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::{PipelineError, SegmentError};
use crate::file_utils::FileManager;
use crate::media_tools::MediaToolkit;

use super::artifacts::{AudioArtifact, MergedArtifact, SegmentSlots, StageOutcome, VideoArtifact, WorkspaceLayout};

/// Result of the merge stage
#[derive(Debug)]
pub struct MergeSummary {
    pub merged: SegmentSlots<MergedArtifact>,
    /// Segments lacking audio or video
    pub skipped: usize,
    pub reused: usize,
    /// Failed muxes, each leaving a gap
    pub failures: Vec<SegmentError>,
}

/// Combines each segment's video with its dubbed audio
#[derive(Debug, Clone)]
pub struct SegmentMerger {
    media: Arc<dyn MediaToolkit>,
    layout: Arc<WorkspaceLayout>,
    concurrency: usize,
}

impl SegmentMerger {
    pub fn new(media: Arc<dyn MediaToolkit>, layout: Arc<WorkspaceLayout>, concurrency: usize) -> Self {
        Self {
            media,
            layout,
            concurrency: concurrency.max(1),
        }
    }

    /// Merge every index that has both halves
    pub async fn merge_all(
        &self,
        audio: &SegmentSlots<AudioArtifact>,
        video: &SegmentSlots<VideoArtifact>,
    ) -> Result<MergeSummary, PipelineError> {
        let total = video.len().max(audio.len());
        let pairs: Vec<(&VideoArtifact, &AudioArtifact)> = (0..total)
            .filter_map(|index| Some((video.get(index)?, audio.get(index)?)))
            .collect();
        let skipped = total - pairs.len();

        let results = stream::iter(pairs)
            .map(|(video, audio)| async move {
                (video.segment_index, self.merge_one(video, audio).await)
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        let mut merged = SegmentSlots::new(total);
        let mut reused = 0;
        let mut failures = Vec::new();
        for (index, result) in results {
            match result {
                Ok(outcome) => {
                    if outcome.is_reused() {
                        reused += 1;
                    }
                    if let Some(artifact) = outcome.artifact() {
                        merged.set(index, artifact)?;
                    }
                }
                Err(e) => {
                    warn!("{}", e);
                    failures.push(e);
                }
            }
        }
        failures.sort_by_key(SegmentError::index);

        Ok(MergeSummary {
            merged,
            skipped,
            reused,
            failures,
        })
    }

    /// Mux one pair, trimmed to the shorter stream
    pub async fn merge_one(
        &self,
        video: &VideoArtifact,
        audio: &AudioArtifact,
    ) -> Result<StageOutcome<MergedArtifact>, SegmentError> {
        let index = video.segment_index;
        let output = self.layout.merged_path(index);

        if FileManager::file_exists(&output) {
            debug!("Reusing merged clip for segment {}", index);
            return Ok(StageOutcome::Reused(MergedArtifact {
                segment_index: index,
                path: output,
            }));
        }

        if let Err(e) = self.media.mux(&video.path, &audio.path, &output).await {
            // A half-written clip must not be mistaken for a finished one later
            if let Err(remove_err) = FileManager::remove_if_exists(&output) {
                warn!("Could not remove {:?}: {}", output, remove_err);
            }
            return Err(SegmentError::Merge {
                index,
                message: e.to_string(),
            });
        }

        Ok(StageOutcome::Produced(MergedArtifact {
            segment_index: index,
            path: output,
        }))
    }

    /// Write the concatenation manifest in ascending index order
    pub async fn write_manifest(&self, merged: &SegmentSlots<MergedArtifact>) -> io::Result<PathBuf> {
        let content = manifest_content(merged);
        let path = self.layout.manifest_path().to_path_buf();
        tokio::fs::write(&path, content).await?;
        debug!("Wrote manifest with {} entries to {:?}", merged.filled(), path);
        Ok(path)
    }
}

/// Manifest text for the concat demuxer, one `file '<name>'` line per merged clip
pub fn manifest_content(merged: &SegmentSlots<MergedArtifact>) -> String {
    merged
        .iter()
        .map(|(index, _)| format!("file '{}'\n", WorkspaceLayout::merged_file_name(index)))
        .collect()
}
