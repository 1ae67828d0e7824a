/*!
 * Error types for the yastdub application.
 *
 * This module contains custom error types for the different parts of the dubbing
 * pipeline, using the thiserror crate for ergonomic error definitions.
 */

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when talking to the text-to-speech API
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The response did not carry a downloadable audio location
    #[error("Response has no download URL: {0}")]
    MissingDownloadUrl(String),

    /// The request did not complete in time
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),
}

/// Errors raised by the external media tool (ffmpeg/ffprobe)
#[derive(Error, Debug)]
pub enum MediaError {
    /// The tool could not be started at all
    #[error("Failed to run {tool}: {message}")]
    Spawn { tool: String, message: String },

    /// The tool ran longer than the configured limit and was killed
    #[error("{tool} timed out after {secs} seconds")]
    Timeout { tool: String, secs: u64 },

    /// The tool exited with a non-zero status
    #[error("{tool} exited with status {code:?}: {stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The probe output could not be interpreted
    #[error("Failed to probe media: {0}")]
    Probe(String),
}

/// Errors scoped to a single segment of the pipeline
#[derive(Error, Debug)]
pub enum SegmentError {
    /// Synthesis, download or tempo adjustment failed on every attempt
    #[error("Synthesis failed for segment {index} after {attempts} attempt(s): {message}")]
    Synthesis {
        index: usize,
        attempts: u32,
        message: String,
    },

    /// The adjusted file could not be moved over the artifact path
    #[error("Failed to replace artifact for segment {index}: {message}")]
    Replace { index: usize, message: String },

    /// The video range could not be extracted or retimed
    #[error("Video cut failed for segment {index}: {message}")]
    VideoCut { index: usize, message: String },

    /// Video and audio could not be combined
    #[error("Merge failed for segment {index}: {message}")]
    Merge { index: usize, message: String },
}

impl SegmentError {
    /// Index of the segment this error belongs to
    pub fn index(&self) -> usize {
        match self {
            Self::Synthesis { index, .. }
            | Self::Replace { index, .. }
            | Self::VideoCut { index, .. }
            | Self::Merge { index, .. } => *index,
        }
    }
}

/// Errors from the final concatenation step
#[derive(Error, Debug)]
pub enum FinalizeError {
    /// The merge manifest was never written
    #[error("Manifest not found: {0}")]
    ManifestMissing(PathBuf),

    /// The manifest exists but lists nothing to concatenate
    #[error("Manifest lists no merged segments: {0}")]
    EmptyManifest(PathBuf),

    /// The concatenation tool failed
    #[error("Concatenation failed: {0}")]
    Concat(String),
}

/// Errors that stop a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A segment failure that the failure policy does not tolerate
    #[error(transparent)]
    Segment(#[from] SegmentError),

    /// Final assembly failed
    #[error(transparent)]
    Finalize(#[from] FinalizeError),

    /// Too many segments failed in one stage
    #[error("{stage}: {failed} of {total} segment(s) failed, above the allowed threshold")]
    TooManyFailures {
        stage: String,
        failed: usize,
        total: usize,
    },

    /// The orchestrator was asked to move to a state out of order
    #[error("Invalid pipeline transition: {0}")]
    InvalidTransition(String),

    /// The segment list cannot be processed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Workspace preparation failed
    #[error("Workspace error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PipelineError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from the text-to-speech provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from the media tool
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    /// Error from the dubbing pipeline
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
