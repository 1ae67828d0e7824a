/*!
 * Tests for file utility functions
 */

use anyhow::Result;
use std::fs;
use std::time::Duration;
use yastdub::file_utils::{FileManager, FileType};
use crate::common;

/// Test that file_exists returns true for existing files
#[test]
fn test_file_exists_withExistingFile_shouldReturnTrue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let test_file = common::create_test_file(temp_dir.path(), "test_file_exists.tmp", "test content")?;

    assert!(FileManager::file_exists(&test_file));
    assert!(!FileManager::dir_exists(&test_file));

    Ok(())
}

/// Test that file_exists returns false for non-existent files
#[test]
fn test_file_exists_withNonExistentFile_shouldReturnFalse() {
    assert!(!FileManager::file_exists("non_existent_file.tmp"));
}

/// Test that remove_if_exists reports whether something was deleted
#[test]
fn test_remove_if_exists_withMissingFile_shouldReturnFalse() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let file = common::create_test_file(temp_dir.path(), "a.mp3", "x")?;

    assert!(FileManager::remove_if_exists(&file)?);
    assert!(!FileManager::remove_if_exists(&file)?);

    Ok(())
}

/// Test that replace_with_retry moves the file over the destination
#[tokio::test]
async fn test_replace_with_retry_withExistingTarget_shouldOverwrite() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let target = common::create_test_file(temp_dir.path(), "audio0.mp3", "raw")?;
    let temp = common::create_test_file(temp_dir.path(), "temp_audio0.mp3", "adjusted")?;

    FileManager::replace_with_retry(&temp, &target, 5, Duration::ZERO).await?;

    assert_eq!(fs::read_to_string(&target)?, "adjusted");
    assert!(!temp.exists());

    Ok(())
}

/// Test that replace_with_retry gives up after its attempts
#[tokio::test]
async fn test_replace_with_retry_withMissingSource_shouldFailAfterAttempts() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let missing = temp_dir.path().join("never_written.mp3");
    let target = temp_dir.path().join("audio0.mp3");

    let result = FileManager::replace_with_retry(&missing, &target, 3, Duration::from_millis(1)).await;

    assert!(result.is_err());
    assert!(!target.exists());

    Ok(())
}

/// Test that remove_dirs deletes trees and counts their files
#[test]
fn test_remove_dirs_withNestedFiles_shouldCountAndDelete() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let audio = temp_dir.path().join("audio_clip");
    let clips = temp_dir.path().join("clip_cut");
    fs::create_dir_all(&audio)?;
    fs::create_dir_all(clips.join("nested"))?;
    common::create_test_file(&audio, "audio0.mp3", "a")?;
    common::create_test_file(&audio, "audio1.mp3", "b")?;
    common::create_test_file(&clips.join("nested"), "clip0.mp4", "c")?;

    let removed = FileManager::remove_dirs(&[audio.clone(), clips.clone(), temp_dir.path().join("missing")])?;

    assert_eq!(removed, 3);
    assert!(!audio.exists());
    assert!(!clips.exists());

    Ok(())
}

/// Test that detect_file_type recognises subtitles by extension and by content
#[test]
fn test_detect_file_type_withSubtitleContent_shouldReturnSubtitle() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let by_extension = common::create_scenario_subtitle(temp_dir.path())?;
    let by_content = common::create_test_file(temp_dir.path(), "cues.txt", common::SCENARIO_SRT)?;

    assert_eq!(FileManager::detect_file_type(&by_extension, "ffprobe")?, FileType::Subtitle);
    assert_eq!(FileManager::detect_file_type(&by_content, "ffprobe")?, FileType::Subtitle);

    Ok(())
}

/// Test that detect_file_type trusts common video extensions
#[test]
fn test_detect_file_type_withVideoExtension_shouldReturnVideo() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_source_video(temp_dir.path())?;

    assert_eq!(FileManager::detect_file_type(&video, "ffprobe")?, FileType::Video);
    assert!(FileManager::detect_file_type(temp_dir.path().join("absent.mp4"), "ffprobe").is_err());

    Ok(())
}

/// Test that unrecognised files are judged by the configured ffprobe binary
#[cfg(unix)]
#[test]
fn test_detect_file_type_withConfiguredFfprobe_shouldUseIt() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = common::create_temp_dir()?;
    let tool = common::create_test_file(temp_dir.path(), "fake-ffprobe", "#!/bin/sh\necho mov,mp4,m4a\n")?;
    fs::set_permissions(&tool, fs::Permissions::from_mode(0o755))?;
    let blob = common::create_test_file(temp_dir.path(), "blob.bin", "not a subtitle\n")?;
    let tool_path = tool.to_string_lossy().into_owned();
    let missing_tool = temp_dir.path().join("no-such-ffprobe").to_string_lossy().into_owned();

    assert_eq!(FileManager::detect_file_type(&blob, &tool_path)?, FileType::Video);
    assert_eq!(FileManager::detect_file_type(&blob, &missing_tool)?, FileType::Unknown);

    Ok(())
}

/// Test that append_to_log_file keeps earlier lines
#[test]
fn test_append_to_log_file_withTwoWrites_shouldKeepBoth() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let log = temp_dir.path().join("logs").join("issues.log");

    FileManager::append_to_log_file(&log, "first")?;
    FileManager::append_to_log_file(&log, "second")?;

    let content = FileManager::read_to_string(&log)?;
    assert_eq!(content.lines().count(), 2);
    assert!(content.contains("] first"));
    assert!(content.contains("] second"));

    Ok(())
}
