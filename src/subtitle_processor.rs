use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use regex::Regex;
use once_cell::sync::Lazy;
use anyhow::{Result, Context, anyhow};
use log::{warn, debug};

use crate::file_utils::FileManager;

// @module: Subtitle parsing into dubbing segments

// @const: SRT timestamp regex (accepts ',' or '.' before the milliseconds)
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})").unwrap()
});

// @struct: One subtitle cue and the time window it occupies in the video
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleSegment {
    // @field: 0-based position in the source file
    pub index: usize,

    // @field: Start time in ms
    pub start_ms: u64,

    // @field: End time in ms
    pub end_ms: u64,

    // @field: Cue text, may be blank
    pub text: String,
}

impl SubtitleSegment {
    /// Creates a segment without validation - used by tests and external consumers
    pub fn new(index: usize, start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        SubtitleSegment {
            index,
            start_ms,
            end_ms,
            text: text.into(),
        }
    }

    // @creates: Validated segment
    // @validates: end > start; blank text is allowed
    pub fn new_validated(index: usize, start_ms: u64, end_ms: u64, text: &str) -> Result<Self> {
        if end_ms <= start_ms {
            return Err(anyhow!(
                "Invalid time range: end time {} <= start time {}",
                end_ms, start_ms
            ));
        }

        Ok(SubtitleSegment {
            index,
            start_ms,
            end_ms,
            text: text.trim().to_string(),
        })
    }

    /// Length of the subtitle window
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.end_ms - self.start_ms)
    }

    pub fn start_secs(&self) -> f64 {
        self.start_ms as f64 / 1000.0
    }

    pub fn end_secs(&self) -> f64 {
        self.end_ms as f64 / 1000.0
    }

    /// Window length in seconds, computed the same way the cut tool receives it
    pub fn duration_secs(&self) -> f64 {
        self.end_secs() - self.start_secs()
    }

    /// Whether the cue carries anything to speak
    pub fn has_speech(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Parse an SRT timestamp (HH:MM:SS,mmm) to milliseconds
    pub fn parse_timestamp(timestamp: &str) -> Result<u64> {
        let parts: Vec<&str> = timestamp.trim().split(&[':', ',', '.'][..]).collect();

        if parts.len() != 4 {
            return Err(anyhow!("Invalid timestamp format: {}", timestamp));
        }

        let hours: u64 = parts[0].parse().context("Failed to parse hours")?;
        let minutes: u64 = parts[1].parse().context("Failed to parse minutes")?;
        let seconds: u64 = parts[2].parse().context("Failed to parse seconds")?;
        let millis: u64 = parts[3].parse().context("Failed to parse milliseconds")?;

        if minutes >= 60 || seconds >= 60 || millis >= 1000 {
            return Err(anyhow!("Invalid time components in timestamp: {}", timestamp));
        }

        Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
    }

    /// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }
}

impl fmt::Display for SubtitleSegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.index + 1)?;
        writeln!(
            f,
            "{} --> {}",
            Self::format_timestamp(self.start_ms),
            Self::format_timestamp(self.end_ms)
        )?;
        writeln!(f, "{}", self.text)?;
        writeln!(f)
    }
}

/// Ordered list of segments read from one subtitle file
#[derive(Debug, Clone)]
pub struct SubtitleTrack {
    /// Source filename
    pub source_file: PathBuf,

    /// Segments in file order, `segments[i].index == i`
    pub segments: Vec<SubtitleSegment>,
}

impl SubtitleTrack {
    /// Read and parse an SRT file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = FileManager::read_to_string(path)
            .with_context(|| format!("Failed to read subtitle file: {:?}", path))?;
        let segments = Self::parse_srt_string(&content)
            .with_context(|| format!("Failed to parse subtitle file: {:?}", path))?;

        debug!("Loaded {} segment(s) from {:?}", segments.len(), path);

        Ok(SubtitleTrack {
            source_file: path.to_path_buf(),
            segments,
        })
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments that will be sent for synthesis
    pub fn speech_count(&self) -> usize {
        self.segments.iter().filter(|s| s.has_speech()).count()
    }

    /// Parse SRT content into segments.
    ///
    /// Cues with blank text are kept as silence segments. Cues whose end is not after
    /// their start are dropped with a warning. File order is preserved and segments are
    /// re-indexed from 0.
    pub fn parse_srt_string(content: &str) -> Result<Vec<SubtitleSegment>> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        let mut segments = Vec::new();

        let mut current_seq: Option<usize> = None;
        let mut current_times: Option<(u64, u64)> = None;
        let mut current_text = String::new();

        for (line_no, line) in content.lines().enumerate() {
            let trimmed = line.trim();

            if trimmed.is_empty() {
                // A blank line closes the cue, even when it had no text
                if let (Some(seq), Some(times)) = (current_seq, current_times) {
                    Self::push_cue(&mut segments, seq, times, &current_text);
                }
                current_seq = None;
                current_times = None;
                current_text.clear();
                continue;
            }

            if current_times.is_none() {
                if let Some(caps) = TIMESTAMP_REGEX.captures(trimmed) {
                    let start_ms = Self::captures_to_ms(&caps, 1);
                    let end_ms = Self::captures_to_ms(&caps, 5);
                    if current_seq.is_none() {
                        warn!("Cue at line {} has no sequence number", line_no + 1);
                        current_seq = Some(segments.len() + 1);
                    }
                    current_times = Some((start_ms, end_ms));
                    continue;
                }

                if current_seq.is_none() {
                    if let Ok(num) = trimmed.parse::<usize>() {
                        current_seq = Some(num);
                        continue;
                    }
                }

                warn!("Unexpected text at line {} before timestamp: {}", line_no + 1, trimmed);
                continue;
            }

            if !current_text.is_empty() {
                current_text.push('\n');
            }
            current_text.push_str(trimmed);
        }

        if let (Some(seq), Some(times)) = (current_seq, current_times) {
            Self::push_cue(&mut segments, seq, times, &current_text);
        }

        if segments.is_empty() {
            return Err(anyhow!("No valid subtitle cues were found in the SRT content"));
        }

        let overlaps = segments
            .windows(2)
            .filter(|pair| pair[0].end_ms > pair[1].start_ms)
            .count();
        if overlaps > 0 {
            warn!("Found {} overlapping subtitle cue(s)", overlaps);
        }

        Ok(segments)
    }

    fn push_cue(segments: &mut Vec<SubtitleSegment>, seq: usize, (start_ms, end_ms): (u64, u64), text: &str) {
        let index = segments.len();
        match SubtitleSegment::new_validated(index, start_ms, end_ms, text) {
            Ok(segment) => segments.push(segment),
            Err(e) => warn!("Skipping invalid subtitle cue {}: {}", seq, e),
        }
    }

    fn captures_to_ms(caps: &regex::Captures, start_idx: usize) -> u64 {
        let field = |offset: usize| -> u64 {
            caps.get(start_idx + offset)
                .map_or(0, |m| m.as_str().parse().unwrap_or(0))
        };
        (field(0) * 3600 + field(1) * 60 + field(2)) * 1000 + field(3)
    }
}

impl fmt::Display for SubtitleTrack {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Subtitle Track")?;
        writeln!(f, "Source: {:?}", self.source_file)?;
        writeln!(f, "Segments: {} ({} with speech)", self.len(), self.speech_count())?;
        Ok(())
    }
}
