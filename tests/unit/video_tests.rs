/*!
 * Tests for the video cutting worker
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use yastdub::dubbing::{AudioArtifact, StageOutcome, VideoCutter, WorkspaceLayout};
use yastdub::errors::SegmentError;
use yastdub::subtitle_processor::SubtitleSegment;
use crate::common;
use crate::common::mock_media::{MediaOp, MockMedia};

fn cutter(work_dir: &Path, media: Arc<MockMedia>) -> Result<(VideoCutter, Arc<WorkspaceLayout>)> {
    let config = common::test_config(work_dir);
    let layout = Arc::new(WorkspaceLayout::from_config(&config.workspace));
    layout.prepare()?;
    let source = common::create_source_video(work_dir)?;
    Ok((VideoCutter::new(media, layout.clone(), source), layout))
}

fn audio(index: usize, duration: f64) -> AudioArtifact {
    AudioArtifact {
        segment_index: index,
        path: PathBuf::from(format!("audio{}.mp3", index)),
        duration,
    }
}

/// Test that shorter speech speeds the clip up
#[tokio::test]
async fn test_cut_withShorterAudio_shouldRetimeFaster() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let media = Arc::new(MockMedia::new());
    let (worker, layout) = cutter(temp_dir.path(), media.clone())?;

    let outcome = worker
        .cut(&SubtitleSegment::new(0, 0, 2000, "Hi"), Some(&audio(0, 1.6)))
        .await?;

    let artifact = outcome.artifact().unwrap();
    assert_eq!(artifact.speed_ratio, 1.25);
    assert_eq!(media.retime_ratios(), vec![1.25]);
    let content = fs::read_to_string(layout.clip_path(0))?;
    assert!(content.contains("duration=1.6"));
    assert_eq!(common::list_files(layout.clip_dir()), vec!["clip0.mp4"]);

    Ok(())
}

/// Test that longer speech slows the clip down
#[tokio::test]
async fn test_cut_withLongerAudio_shouldRetimeSlower() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let media = Arc::new(MockMedia::new());
    let (worker, _) = cutter(temp_dir.path(), media.clone())?;

    let outcome = worker
        .cut(&SubtitleSegment::new(1, 2000, 5000, "Longer"), Some(&audio(1, 3.75)))
        .await?;

    assert_eq!(outcome.artifact().map(|a| a.speed_ratio), Some(0.8));
    assert_eq!(media.count(MediaOp::Cut), 1);
    assert_eq!(media.count(MediaOp::Retime), 1);

    Ok(())
}

/// Test that a segment without audio keeps its original timing
#[tokio::test]
async fn test_cut_withoutAudio_shouldKeepClipUnscaled() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let media = Arc::new(MockMedia::new());
    let (worker, layout) = cutter(temp_dir.path(), media.clone())?;

    let outcome = worker.cut(&SubtitleSegment::new(2, 5000, 6000, ""), None).await?;

    assert_eq!(outcome.artifact().map(|a| a.speed_ratio), Some(1.0));
    assert_eq!(media.count(MediaOp::Retime), 0);
    let content = fs::read_to_string(layout.clip_path(2))?;
    assert_eq!(content, "clip start=5\nduration=1\n");
    assert_eq!(common::list_files(layout.clip_dir()), vec!["clip2.mp4"]);

    Ok(())
}

/// Test that an existing clip is reused without cutting again
#[tokio::test]
async fn test_cut_withExistingClip_shouldReuse() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let media = Arc::new(MockMedia::new());
    let (worker, layout) = cutter(temp_dir.path(), media.clone())?;
    fs::write(layout.clip_path(0), "clip start=0\nduration=1.6\n")?;

    let outcome = worker
        .cut(&SubtitleSegment::new(0, 0, 2000, "Hi"), Some(&audio(0, 1.6)))
        .await?;

    assert!(outcome.is_reused());
    assert_eq!(outcome.artifact().map(|a| a.speed_ratio), Some(1.25));
    assert_eq!(media.work_calls(), 0);
    assert_eq!(media.count(MediaOp::Probe), 1);

    Ok(())
}

/// Test that a reused clip reports the ratio it was cut at, not the current target
#[tokio::test]
async fn test_cut_withUnscaledClipAndNewAudio_shouldReportMeasuredRatio() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let media = Arc::new(MockMedia::new());
    let (worker, layout) = cutter(temp_dir.path(), media.clone())?;
    // Left by a run where this segment had no audio
    fs::write(layout.clip_path(1), "clip start=2\nduration=3\n")?;

    let outcome = worker
        .cut(&SubtitleSegment::new(1, 2000, 5000, "Now spoken"), Some(&audio(1, 3.75)))
        .await?;

    assert!(outcome.is_reused());
    assert_eq!(outcome.artifact().map(|a| a.speed_ratio), Some(1.0));
    assert_eq!(media.count(MediaOp::Retime), 0);

    Ok(())
}

/// Test that an unreadable leftover clip is cut again
#[tokio::test]
async fn test_cut_withUnreadableClip_shouldCutAgain() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let media = Arc::new(MockMedia::new());
    let (worker, layout) = cutter(temp_dir.path(), media.clone())?;
    fs::write(layout.clip_path(2), "truncated")?;

    let outcome = worker.cut(&SubtitleSegment::new(2, 5000, 6000, ""), None).await?;

    assert!(matches!(outcome, StageOutcome::Produced(_)));
    assert_eq!(media.count(MediaOp::Cut), 1);
    assert_eq!(fs::read_to_string(layout.clip_path(2))?, "clip start=5\nduration=1\n");

    Ok(())
}

/// Test that unscaled and retimed clips get the same file mode
#[cfg(unix)]
#[tokio::test]
async fn test_cut_withUnscaledClip_shouldNotKeepScratchPermissions() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = common::create_temp_dir()?;
    let media = Arc::new(MockMedia::new());
    let (worker, layout) = cutter(temp_dir.path(), media)?;

    worker.cut(&SubtitleSegment::new(0, 0, 2000, "Fast"), Some(&audio(0, 1.6))).await?;
    worker.cut(&SubtitleSegment::new(2, 5000, 6000, ""), None).await?;

    let mode = |path: &Path| -> Result<u32> { Ok(fs::metadata(path)?.permissions().mode() & 0o777) };
    assert_eq!(mode(&layout.clip_path(2))?, mode(&layout.clip_path(0))?);

    Ok(())
}

/// Test that a failed cut releases its scratch file
#[tokio::test]
async fn test_cut_withToolFailure_shouldLeaveNoFiles() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let media = Arc::new(MockMedia::new().fail_cut_starting_at(2.0));
    let (worker, layout) = cutter(temp_dir.path(), media)?;

    let err = worker
        .cut(&SubtitleSegment::new(1, 2000, 5000, "Broken"), Some(&audio(1, 3.75)))
        .await
        .unwrap_err();

    assert!(matches!(err, SegmentError::VideoCut { index: 1, .. }));
    assert!(common::list_files(layout.clip_dir()).is_empty());

    Ok(())
}

/// Test that unusable audio durations are reported instead of dividing by zero
#[tokio::test]
async fn test_cut_withZeroAudioDuration_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let media = Arc::new(MockMedia::new());
    let (worker, _) = cutter(temp_dir.path(), media.clone())?;

    let result = worker.cut(&SubtitleSegment::new(0, 0, 2000, "Hi"), Some(&audio(0, 0.0))).await;

    assert!(matches!(result, Err(SegmentError::VideoCut { index: 0, .. })));
    assert_eq!(media.calls().len(), 0);

    Ok(())
}

/// Test the outcome type used by every worker
#[test]
fn test_stage_outcome_withSkipped_shouldHaveNoArtifact() {
    let outcome: StageOutcome<AudioArtifact> = StageOutcome::Skipped;
    assert!(outcome.is_skipped());
    assert!(outcome.artifact().is_none());
}
