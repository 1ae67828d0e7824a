/*!
 * Tests for application configuration
 */

use anyhow::Result;
use std::path::PathBuf;
use yastdub::app_config::{Config, LogLevel};
use crate::common;

/// Test the documented defaults
#[test]
fn test_default_withNoFile_shouldMatchDocumentedDefaults() {
    let config = Config::default();

    assert_eq!(config.synthesis.voice, "hn_female_ngochuyen_fast_news_48k-thg");
    assert_eq!(config.synthesis.bit_rate, 64000);
    assert_eq!(config.synthesis.tempo, 1.25);
    assert_eq!(config.synthesis.max_attempts, 5);
    assert_eq!(config.synthesis.replace_attempts, 5);
    assert_eq!(config.synthesis.concurrent_requests, 20);
    assert_eq!(config.video.concurrent_jobs, 10);
    assert_eq!(config.workspace.audio_dir, "audio_clip");
    assert_eq!(config.workspace.clip_dir, "clip_cut");
    assert_eq!(config.workspace.manifest_name, "filelist.txt");
    assert_eq!(config.workspace.work_dir, PathBuf::from("."));
    assert_eq!(config.failure_policy.min_audio_success_ratio, 1.0);
    assert_eq!(config.failure_policy.min_video_success_ratio, 0.0);
    assert!(!config.workspace.keep_intermediates);
}

/// Test that a missing file is created with defaults
#[test]
fn test_load_or_create_withMissingFile_shouldWriteDefaults() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("conf.json");

    let (config, created) = Config::load_or_create(&path)?;
    assert!(created);
    assert!(path.exists());
    assert_eq!(config.synthesis.max_attempts, 5);

    let (reloaded, created_again) = Config::load_or_create(&path)?;
    assert!(!created_again);
    assert_eq!(reloaded.synthesis.endpoint, config.synthesis.endpoint);

    Ok(())
}

/// Test that partial files are completed from defaults
#[test]
fn test_load_or_create_withPartialFile_shouldFillDefaults() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        temp_dir.path(),
        "conf.json",
        r#"{"synthesis": {"tempo": 1.1}, "workspace": {"keep_intermediates": true}, "log_level": "debug"}"#,
    )?;

    let (config, created) = Config::load_or_create(&path)?;

    assert!(!created);
    assert_eq!(config.synthesis.tempo, 1.1);
    assert_eq!(config.synthesis.bit_rate, 64000);
    assert!(config.workspace.keep_intermediates);
    assert_eq!(config.log_level, LogLevel::Debug);

    Ok(())
}

/// Test that malformed JSON is reported
#[test]
fn test_load_or_create_withInvalidJson_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "conf.json", "{ not json")?;

    assert!(Config::load_or_create(&path).is_err());

    Ok(())
}

/// Test validation of the individual settings
#[test]
fn test_validate_withInvalidSettings_shouldFail() {
    let mut config = Config::default();
    config.synthesis.endpoint = "not a url".to_string();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.synthesis.voice = "  ".to_string();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.synthesis.max_attempts = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.video.concurrent_jobs = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.failure_policy.min_video_success_ratio = 1.5;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.workspace.merged_dir = String::new();
    assert!(config.validate().is_err());
}
