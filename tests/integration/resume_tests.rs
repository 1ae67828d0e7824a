/*!
 * Re-running the pipeline over an existing workspace
 */

use anyhow::Result;
use std::fs;
use std::sync::Arc;
use yastdub::dubbing::DubbingPipeline;
use yastdub::progress::LogProgress;
use yastdub::providers::mock::MockProvider;
use yastdub::subtitle_processor::SubtitleTrack;
use crate::common;
use crate::common::mock_media::{MediaOp, MockMedia};

fn scenario_provider() -> MockProvider {
    MockProvider::working()
        .with_duration(common::SCENARIO_TEXTS[0], 2.0)
        .with_duration(common::SCENARIO_TEXTS[1], 4.6875)
}

/// Test that a second run over kept intermediates does no new work
#[tokio::test]
async fn test_run_twiceWithKeptIntermediates_shouldReuseEverything() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let subtitle = common::create_scenario_subtitle(temp_dir.path())?;
    let video = common::create_source_video(temp_dir.path())?;
    let segments = SubtitleTrack::load(&subtitle)?.segments;
    let mut config = common::test_config(temp_dir.path());
    config.workspace.keep_intermediates = true;
    let output = temp_dir.path().join("final_video.mp4");

    let first = DubbingPipeline::new(
        Arc::new(scenario_provider()),
        Arc::new(MockMedia::new()),
        &config,
        Arc::new(LogProgress),
    );
    first.run(&segments, &video, &output).await?;
    let first_output = fs::read(&output)?;

    let provider = Arc::new(scenario_provider());
    let media = Arc::new(MockMedia::new());
    let second = DubbingPipeline::new(provider.clone(), media.clone(), &config, Arc::new(LogProgress));
    let report = second.run(&segments, &video, &output).await?;

    assert_eq!(provider.synth_calls(), 0);
    assert_eq!(provider.fetch_calls(), 0);
    for op in [MediaOp::Tempo, MediaOp::Cut, MediaOp::Retime, MediaOp::Mux] {
        assert_eq!(media.count(op), 0, "{:?} should not run again", op);
    }
    assert_eq!(media.work_calls(), 1);
    assert_eq!(report.audio.reused, 2);
    assert_eq!(report.video.reused, 3);
    assert_eq!(report.merged.reused, 2);
    assert_eq!(fs::read(&output)?, first_output);

    Ok(())
}

/// Test that a run stopped by a concatenation failure resumes from its merged clips
#[tokio::test]
async fn test_run_afterConcatFailure_shouldOnlyConcatenate() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let subtitle = common::create_scenario_subtitle(temp_dir.path())?;
    let video = common::create_source_video(temp_dir.path())?;
    let segments = SubtitleTrack::load(&subtitle)?.segments;
    let config = common::test_config(temp_dir.path());
    let output = temp_dir.path().join("final_video.mp4");

    let failed = DubbingPipeline::new(
        Arc::new(scenario_provider()),
        Arc::new(MockMedia::new().fail_concat()),
        &config,
        Arc::new(LogProgress),
    );
    assert!(failed.run(&segments, &video, &output).await.is_err());
    assert!(!output.exists());

    let provider = Arc::new(scenario_provider());
    let media = Arc::new(MockMedia::new());
    let resumed = DubbingPipeline::new(provider.clone(), media.clone(), &config, Arc::new(LogProgress));
    let report = resumed.run(&segments, &video, &output).await?;

    assert_eq!(provider.synth_calls(), 0);
    assert_eq!(media.count(MediaOp::Mux), 0);
    assert_eq!(media.count(MediaOp::Concat), 1);
    assert_eq!(report.merged_indices, vec![0, 1]);
    assert!(output.exists());
    for dir in resumed.layout().intermediate_dirs() {
        assert!(!dir.exists(), "{:?} should be cleaned after success", dir);
    }

    Ok(())
}

/// Test that segments missing after a failed run are regenerated, and only those
#[tokio::test]
async fn test_run_afterSynthesisFailure_shouldRegenerateMissingAudio() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let subtitle = common::create_scenario_subtitle(temp_dir.path())?;
    let video = common::create_source_video(temp_dir.path())?;
    let segments = SubtitleTrack::load(&subtitle)?.segments;
    let config = common::test_config(temp_dir.path());
    let output = temp_dir.path().join("final_video.mp4");

    // Audio for segment 0 survives from an earlier attempt
    let layout = yastdub::dubbing::WorkspaceLayout::from_config(&config.workspace);
    layout.prepare()?;
    fs::write(layout.audio_path(0), "duration=1.6\n")?;

    let provider = Arc::new(scenario_provider());
    let pipeline = DubbingPipeline::new(provider.clone(), Arc::new(MockMedia::new()), &config, Arc::new(LogProgress));
    let report = pipeline.run(&segments, &video, &output).await?;

    assert_eq!(provider.synth_calls(), 1);
    assert_eq!(provider.requests()[0].input_text, common::SCENARIO_TEXTS[1]);
    assert_eq!(report.audio.reused, 1);
    assert_eq!(report.audio.produced, 1);
    assert_eq!(report.speed_ratios, vec![Some(1.25), Some(0.8), Some(1.0)]);

    Ok(())
}
