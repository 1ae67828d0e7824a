/*!
 * # YASTdub - Yet Another Subtitle Dubber
 *
 * A Rust library for turning a subtitle file and a source video into a dubbed video.
 *
 * ## Features
 *
 * - Synthesize speech for every subtitle line through a text-to-speech API
 * - Speed up the speech by a fixed tempo without changing pitch
 * - Cut each line's video window and retime it to the length of its speech
 * - Mux speech and video per line, then concatenate everything in subtitle order
 * - Resume interrupted runs by reusing artifacts already on disk
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `subtitle_processor`: SRT parsing into timed segments
 * - `providers`: Text-to-speech clients:
 *   - `providers::tts_api`: HTTP conversion API client
 *   - `providers::mock`: In-process provider for tests
 * - `media_tools`: The ffmpeg/ffprobe boundary
 * - `dubbing`: The per-segment pipeline:
 *   - `dubbing::synthesis`: Speech synthesis with retries
 *   - `dubbing::video`: Video cutting and retiming
 *   - `dubbing::merge`: Per-segment muxing and the concat manifest
 *   - `dubbing::concat`: Final concatenation and cleanup
 *   - `dubbing::pipeline`: Stage orchestration
 * - `progress`: Progress events and sinks
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod dubbing;
pub mod errors;
pub mod file_utils;
pub mod media_tools;
pub mod progress;
pub mod providers;
pub mod subtitle_processor;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{Controller, RunOutcome};
pub use dubbing::{DubbingPipeline, PipelineReport, PipelineState};
pub use errors::{AppError, FinalizeError, MediaError, PipelineError, ProviderError, SegmentError};
pub use media_tools::{Ffmpeg, MediaToolkit};
pub use progress::{BroadcastProgress, LogProgress, ProgressEvent, ProgressSink};
pub use subtitle_processor::{SubtitleSegment, SubtitleTrack};
