/*!
 * Tests for error types and conversions
 */

use std::path::PathBuf;
use yastdub::errors::{AppError, FinalizeError, MediaError, PipelineError, ProviderError, SegmentError};

/// Test that segment errors carry their index
#[test]
fn test_segment_error_index_withEveryVariant_shouldReturnIndex() {
    let errors = [
        SegmentError::Synthesis { index: 0, attempts: 5, message: "x".into() },
        SegmentError::Replace { index: 1, message: "x".into() },
        SegmentError::VideoCut { index: 2, message: "x".into() },
        SegmentError::Merge { index: 3, message: "x".into() },
    ];
    let indices: Vec<usize> = errors.iter().map(SegmentError::index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
}

/// Test the user-facing messages
#[test]
fn test_display_withPipelineErrors_shouldBeReadable() {
    let err = PipelineError::from(SegmentError::Synthesis {
        index: 4,
        attempts: 5,
        message: "API responded with error: 503 - busy".into(),
    });
    assert_eq!(
        err.to_string(),
        "Synthesis failed for segment 4 after 5 attempt(s): API responded with error: 503 - busy"
    );

    let err = PipelineError::from(FinalizeError::ManifestMissing(PathBuf::from("merged_clips/filelist.txt")));
    assert!(err.to_string().contains("filelist.txt"));

    let err = PipelineError::TooManyFailures { stage: "Video cutting".into(), failed: 2, total: 3 };
    assert!(err.to_string().starts_with("Video cutting: 2 of 3"));
}

/// Test conversions into the application error
#[test]
fn test_app_error_from_withLowerErrors_shouldWrap() {
    let provider: AppError = ProviderError::Timeout(60).into();
    assert!(matches!(provider, AppError::Provider(ProviderError::Timeout(60))));

    let media: AppError = MediaError::Timeout { tool: "ffmpeg".into(), secs: 600 }.into();
    assert_eq!(media.to_string(), "Media error: ffmpeg timed out after 600 seconds");

    let io: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(io, AppError::File(_)));

    let pipeline: PipelineError = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
    assert!(matches!(pipeline, PipelineError::Io(_)));
}
