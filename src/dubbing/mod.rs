/*!
 * The per-segment dubbing pipeline.
 *
 * - `artifacts`: Artifact records, the index-keyed slot arena and the workspace layout
 * - `concurrency`: Pool sizes per stage
 * - `synthesis`: Text to speed-adjusted speech, with retries
 * - `video`: Cutting and retiming the matching video range
 * - `merge`: Pairing audio and video per segment, plus the ordered manifest
 * - `concat`: Final concatenation and cleanup
 * - `pipeline`: The orchestrator and its state machine
 */

pub mod artifacts;
pub mod concat;
pub mod concurrency;
pub mod merge;
pub mod pipeline;
pub mod synthesis;
pub mod video;

pub use artifacts::{AudioArtifact, MergedArtifact, SegmentSlots, StageOutcome, VideoArtifact, WorkspaceLayout};
pub use concat::{ConcatenationFinalizer, FinalizeReport};
pub use concurrency::{Stage, StageLimits, StageProfile};
pub use merge::{MergeSummary, SegmentMerger};
pub use pipeline::{DubbingPipeline, PipelineOptions, PipelineReport, PipelineState, StageCounts};
pub use synthesis::{SpeechSynthesizer, SynthesisOptions};
pub use video::{speed_ratio, VideoCutter};
