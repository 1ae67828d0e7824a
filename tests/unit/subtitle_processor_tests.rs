/*!
 * Tests for subtitle parsing into dubbing segments
 */

use anyhow::Result;
use std::time::Duration;
use yastdub::subtitle_processor::{SubtitleSegment, SubtitleTrack};
use crate::common;

/// Test parsing the three-cue scenario file
#[test]
fn test_load_withScenarioFile_shouldKeepSilenceSegment() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_scenario_subtitle(temp_dir.path())?;

    let track = SubtitleTrack::load(&path)?;

    assert_eq!(track.len(), 3);
    assert_eq!(track.speech_count(), 2);
    let windows: Vec<(u64, u64)> = track.segments.iter().map(|s| (s.start_ms, s.end_ms)).collect();
    assert_eq!(windows, vec![(0, 2000), (2000, 5000), (5000, 6000)]);
    assert_eq!(track.segments[0].text, common::SCENARIO_TEXTS[0]);
    assert!(!track.segments[2].has_speech());

    Ok(())
}

/// Test that indices always follow file order from zero
#[test]
fn test_parse_srt_string_withGappySequenceNumbers_shouldReindex() -> Result<()> {
    let content = "7\n00:00:01,000 --> 00:00:02,000\nA\n\n42\n00:00:03,000 --> 00:00:04,000\nB\n";

    let segments = SubtitleTrack::parse_srt_string(content)?;

    let indices: Vec<usize> = segments.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![0, 1]);

    Ok(())
}

/// Test that a missing sequence number does not lose the cue
#[test]
fn test_parse_srt_string_withoutSequenceNumber_shouldStillParse() -> Result<()> {
    let content = "00:00:01,000 --> 00:00:02,500\nNo number here\n";

    let segments = SubtitleTrack::parse_srt_string(content)?;

    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].duration(), Duration::from_millis(1500));

    Ok(())
}

/// Test that content without cues is rejected
#[test]
fn test_parse_srt_string_withNoCues_shouldFail() {
    assert!(SubtitleTrack::parse_srt_string("just some text\n").is_err());
    assert!(SubtitleTrack::parse_srt_string("").is_err());
}

/// Test timestamp parsing and formatting
#[test]
fn test_parse_timestamp_withValidInput_shouldReturnMillis() -> Result<()> {
    assert_eq!(SubtitleSegment::parse_timestamp("01:02:03,456")?, 3_723_456);
    assert_eq!(SubtitleSegment::parse_timestamp("00:00:05.000")?, 5_000);
    assert!(SubtitleSegment::parse_timestamp("00:61:00,000").is_err());
    assert_eq!(SubtitleSegment::format_timestamp(3_723_456), "01:02:03,456");
    Ok(())
}

/// Test the seconds helpers used for cutting
#[test]
fn test_duration_secs_withScenarioWindows_shouldBeExact() {
    let second = SubtitleSegment::new(1, 2000, 5000, "text");
    let third = SubtitleSegment::new(2, 5000, 6000, "");

    assert_eq!(second.start_secs(), 2.0);
    assert_eq!(second.duration_secs(), 3.0);
    assert_eq!(third.duration_secs(), 1.0);
    assert!(!third.has_speech());
}

/// Test that whitespace-only text counts as silence
#[test]
fn test_has_speech_withWhitespaceText_shouldBeFalse() {
    assert!(!SubtitleSegment::new(0, 0, 1000, "  \n ").has_speech());
}

/// Test the SRT rendering of a segment
#[test]
fn test_display_withSegment_shouldRenderSrtCue() {
    let segment = SubtitleSegment::new(0, 1000, 2500, "Hello");
    assert_eq!(segment.to_string(), "1\n00:00:01,000 --> 00:00:02,500\nHello\n\n");
}
