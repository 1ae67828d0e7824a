/*!
 * Video cutting and retiming for one segment.
 */

use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::SegmentError;
use crate::file_utils::FileManager;
use crate::media_tools::MediaToolkit;
use crate::subtitle_processor::SubtitleSegment;

use super::artifacts::{AudioArtifact, StageOutcome, VideoArtifact, WorkspaceLayout};

/// Factor by which a segment's video must be sped up to last as long as its speech.
///
/// `None` when the audio duration cannot be used (zero, negative or not finite).
/// Without paired audio the caller passes the window itself, giving exactly 1.0.
pub fn speed_ratio(window_secs: f64, audio_secs: f64) -> Option<f64> {
    if !window_secs.is_finite() || !audio_secs.is_finite() || audio_secs <= 0.0 || window_secs <= 0.0 {
        return None;
    }
    Some(window_secs / audio_secs)
}

/// Cuts each segment's time range out of the source video
#[derive(Debug, Clone)]
pub struct VideoCutter {
    media: Arc<dyn MediaToolkit>,
    layout: Arc<WorkspaceLayout>,
    source: PathBuf,
    replace_attempts: u32,
    replace_retry_delay: Duration,
}

impl VideoCutter {
    pub fn new(media: Arc<dyn MediaToolkit>, layout: Arc<WorkspaceLayout>, source: impl Into<PathBuf>) -> Self {
        Self {
            media,
            layout,
            source: source.into(),
            replace_attempts: 5,
            replace_retry_delay: Duration::from_millis(100),
        }
    }

    pub fn with_replace_policy(mut self, attempts: u32, delay: Duration) -> Self {
        self.replace_attempts = attempts.max(1);
        self.replace_retry_delay = delay;
        self
    }

    /// Produce the video artifact for one segment
    ///
    /// A clip left by an earlier run is reused, with its ratio measured from the clip's
    /// own duration rather than from the current audio.
    pub async fn cut(
        &self,
        segment: &SubtitleSegment,
        audio: Option<&AudioArtifact>,
    ) -> Result<StageOutcome<VideoArtifact>, SegmentError> {
        let index = segment.index;
        let window = segment.duration_secs();
        let audio_secs = audio.map(|a| a.duration).unwrap_or(window);

        let ratio = speed_ratio(window, audio_secs).ok_or_else(|| SegmentError::VideoCut {
            index,
            message: format!("cannot fit a {:.3}s window to {:.3}s of audio", window, audio_secs),
        })?;

        let output = self.layout.clip_path(index);
        let temp = self.layout.temp_clip_path(index);
        if FileManager::file_exists(&output) {
            let measured = match self.media.probe_duration(&output).await {
                Ok(clip_secs) => speed_ratio(window, clip_secs),
                Err(e) => {
                    warn!("Existing clip for segment {} is unreadable, cutting again: {}", index, e);
                    None
                }
            };
            match measured {
                Some(measured) => {
                    debug!("Reusing clip for segment {} (speed ratio {:.4})", index, measured);
                    return Ok(StageOutcome::Reused(VideoArtifact {
                        segment_index: index,
                        path: output,
                        speed_ratio: measured,
                    }));
                }
                None => self.discard(&output),
            }
        }

        if ratio == 1.0 {
            // Unscaled: the cut itself is the clip
            if let Err(e) = self
                .media
                .cut_segment(&self.source, segment.start_secs(), window, &temp)
                .await
            {
                self.discard(&temp);
                return Err(SegmentError::VideoCut {
                    index,
                    message: e.to_string(),
                });
            }
        } else {
            // Raw cut lives in a scratch file that is deleted on every exit path
            let scratch = tempfile::Builder::new()
                .prefix(&format!("cut{}_", index))
                .suffix(".mp4")
                .tempfile_in(self.layout.clip_dir())
                .map_err(|e| SegmentError::VideoCut {
                    index,
                    message: format!("cannot create scratch file: {}", e),
                })?;

            self.media
                .cut_segment(&self.source, segment.start_secs(), window, scratch.path())
                .await
                .map_err(|e| SegmentError::VideoCut {
                    index,
                    message: e.to_string(),
                })?;

            if let Err(e) = self.media.retime_video(scratch.path(), ratio, &temp).await {
                self.discard(&temp);
                return Err(SegmentError::VideoCut {
                    index,
                    message: e.to_string(),
                });
            }
        }

        if let Err(e) = FileManager::replace_with_retry(&temp, &output, self.replace_attempts, self.replace_retry_delay).await {
            self.discard(&temp);
            return Err(SegmentError::Replace {
                index,
                message: e.to_string(),
            });
        }

        debug!("Segment {} cut with speed ratio {:.4}", index, ratio);
        Ok(StageOutcome::Produced(VideoArtifact {
            segment_index: index,
            path: output,
            speed_ratio: ratio,
        }))
    }

    fn discard(&self, path: &Path) {
        if let Err(e) = FileManager::remove_if_exists(path) {
            warn!("Could not remove {:?}: {}", path, e);
        }
    }
}
