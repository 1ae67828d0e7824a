/*!
 * External media tool integration.
 *
 * Every audio/video transformation in the pipeline goes through the `MediaToolkit`
 * trait. The production implementation shells out to ffmpeg/ffprobe with argument
 * vectors; success means exit status 0. Each invocation is bounded by a timeout and the
 * child process is killed if the limit is hit.
 */

use async_trait::async_trait;
use log::{debug, trace};
use std::fmt::Debug;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use crate::app_config::VideoConfig;
use crate::errors::MediaError;

/// Operations the pipeline needs from a media engine
#[async_trait]
pub trait MediaToolkit: Send + Sync + Debug {
    /// Change audio tempo by `tempo` without touching pitch, writing to `output`
    async fn adjust_tempo(&self, input: &Path, tempo: f64, output: &Path) -> Result<(), MediaError>;

    /// Duration of a media file in seconds
    async fn probe_duration(&self, input: &Path) -> Result<f64, MediaError>;

    /// Extract `[start, start + duration)` seconds of `source` into `output`
    async fn cut_segment(&self, source: &Path, start_secs: f64, duration_secs: f64, output: &Path) -> Result<(), MediaError>;

    /// Uniformly scale playback speed by `ratio` (ratio > 1 plays faster, output is shorter)
    async fn retime_video(&self, input: &Path, ratio: f64, output: &Path) -> Result<(), MediaError>;

    /// Take the video stream of `video` and the audio stream of `audio`, stopping at the shorter one
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), MediaError>;

    /// Concatenate the files listed in a concat manifest without re-encoding
    async fn concat(&self, manifest: &Path, output: &Path) -> Result<(), MediaError>;

    /// Check that the tool can be executed
    async fn check_available(&self) -> Result<String, MediaError>;
}

/// ffmpeg/ffprobe backed toolkit
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg_path: String,
    ffprobe_path: String,
    video_codec: String,
    audio_codec: String,
    timeout: Duration,
}

impl Ffmpeg {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            timeout,
        }
    }

    pub fn from_config(config: &VideoConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            ffprobe_path: config.ffprobe_path.clone(),
            video_codec: config.video_codec.clone(),
            audio_codec: config.audio_codec.clone(),
            timeout: Duration::from_secs(config.tool_timeout_secs),
        }
    }

    /// Arguments for a tempo change
    pub fn tempo_args(input: &Path, tempo: f64, output: &Path) -> Vec<String> {
        vec![
            "-y".to_owned(),
            "-i".to_owned(),
            input.display().to_string(),
            "-filter:a".to_owned(),
            format!("atempo={}", tempo),
            "-vn".to_owned(),
            output.display().to_string(),
        ]
    }

    /// Arguments for an accurate (re-encoding) cut
    pub fn cut_args(&self, source: &Path, start_secs: f64, duration_secs: f64, output: &Path) -> Vec<String> {
        vec![
            "-y".to_owned(),
            "-ss".to_owned(),
            format!("{:.3}", start_secs),
            "-i".to_owned(),
            source.display().to_string(),
            "-t".to_owned(),
            format!("{:.3}", duration_secs),
            "-c:v".to_owned(),
            self.video_codec.clone(),
            "-c:a".to_owned(),
            self.audio_codec.clone(),
            output.display().to_string(),
        ]
    }

    /// Arguments for a uniform speed change of the video stream
    pub fn retime_args(&self, input: &Path, ratio: f64, output: &Path) -> Vec<String> {
        vec![
            "-y".to_owned(),
            "-i".to_owned(),
            input.display().to_string(),
            "-filter:v".to_owned(),
            format!("setpts=PTS/{}", ratio),
            "-an".to_owned(),
            "-c:v".to_owned(),
            self.video_codec.clone(),
            output.display().to_string(),
        ]
    }

    /// Arguments for replacing the audio track, shortest stream wins
    pub fn mux_args(&self, video: &Path, audio: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_owned(),
            "-i".to_owned(),
            video.display().to_string(),
            "-i".to_owned(),
            audio.display().to_string(),
            "-c:v".to_owned(),
            "copy".to_owned(),
            "-c:a".to_owned(),
            self.audio_codec.clone(),
            "-map".to_owned(),
            "0:v:0".to_owned(),
            "-map".to_owned(),
            "1:a:0".to_owned(),
            "-shortest".to_owned(),
            output.display().to_string(),
        ]
    }

    /// Arguments for the concat demuxer in stream-copy mode
    pub fn concat_args(manifest: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_owned(),
            "-f".to_owned(),
            "concat".to_owned(),
            "-safe".to_owned(),
            "0".to_owned(),
            "-i".to_owned(),
            manifest.display().to_string(),
            "-c".to_owned(),
            "copy".to_owned(),
            output.display().to_string(),
        ]
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<Output, MediaError> {
        trace!("Running {} {}", program, args.join(" "));

        let child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = tokio::select! {
            result = child => {
                result.map_err(|e| MediaError::Spawn {
                    tool: program.to_string(),
                    message: e.to_string(),
                })?
            },
            _ = tokio::time::sleep(self.timeout) => {
                return Err(MediaError::Timeout {
                    tool: program.to_string(),
                    secs: self.timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::ToolFailed {
                tool: program.to_string(),
                code: output.status.code(),
                stderr: filter_ffmpeg_stderr(&stderr),
            });
        }

        Ok(output)
    }

    async fn run_ffmpeg(&self, args: Vec<String>) -> Result<(), MediaError> {
        self.run(&self.ffmpeg_path, &args).await.map(|_| ())
    }
}

#[async_trait]
impl MediaToolkit for Ffmpeg {
    async fn adjust_tempo(&self, input: &Path, tempo: f64, output: &Path) -> Result<(), MediaError> {
        self.run_ffmpeg(Self::tempo_args(input, tempo, output)).await
    }

    async fn probe_duration(&self, input: &Path) -> Result<f64, MediaError> {
        let args = vec![
            "-v".to_owned(),
            "error".to_owned(),
            "-show_entries".to_owned(),
            "format=duration".to_owned(),
            "-of".to_owned(),
            "default=noprint_wrappers=1:nokey=1".to_owned(),
            input.display().to_string(),
        ];
        let output = self.run(&self.ffprobe_path, &args).await?;
        parse_probe_duration(&String::from_utf8_lossy(&output.stdout))
    }

    async fn cut_segment(&self, source: &Path, start_secs: f64, duration_secs: f64, output: &Path) -> Result<(), MediaError> {
        self.run_ffmpeg(self.cut_args(source, start_secs, duration_secs, output)).await
    }

    async fn retime_video(&self, input: &Path, ratio: f64, output: &Path) -> Result<(), MediaError> {
        self.run_ffmpeg(self.retime_args(input, ratio, output)).await
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), MediaError> {
        self.run_ffmpeg(self.mux_args(video, audio, output)).await
    }

    async fn concat(&self, manifest: &Path, output: &Path) -> Result<(), MediaError> {
        let args = Self::concat_args(manifest, output);
        debug!("Running command: {} {}", self.ffmpeg_path, args.join(" "));
        self.run_ffmpeg(args).await
    }

    async fn check_available(&self) -> Result<String, MediaError> {
        let output = self.run(&self.ffmpeg_path, &["-version".to_owned()]).await?;
        let version = String::from_utf8_lossy(&output.stdout);
        Ok(version.lines().next().unwrap_or_default().to_string())
    }
}

/// Interpret ffprobe's `format=duration` output
pub fn parse_probe_duration(stdout: &str) -> Result<f64, MediaError> {
    let trimmed = stdout.trim();
    let secs = trimmed
        .parse::<f64>()
        .map_err(|_| MediaError::Probe(format!("unexpected duration output '{}'", trimmed)))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(MediaError::Probe(format!("non-positive duration {}", secs)));
    }
    Ok(secs)
}

/// Filter ffmpeg stderr to only show meaningful error lines, stripping the
/// version banner, build configuration, and stream metadata noise.
pub fn filter_ffmpeg_stderr(stderr: &str) -> String {
    const NOISE_PREFIXES: [&str; 14] = [
        "ffmpeg version",
        "ffprobe version",
        "built with",
        "configuration:",
        "lib",
        "Input #",
        "Metadata:",
        "Duration:",
        "Stream #",
        "Output #",
        "Stream mapping:",
        "Press [q]",
        "frame=",
        "size=",
    ];

    let meaningful: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !NOISE_PREFIXES.iter().any(|p| line.starts_with(p)))
        .collect();

    if meaningful.is_empty() {
        "unknown ffmpeg error (stderr was empty after filtering)".to_string()
    } else {
        meaningful.join("\n")
    }
}
