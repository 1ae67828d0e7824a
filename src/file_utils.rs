use anyhow::{Result, Context};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;
use std::fs::OpenOptions;
use std::io::Write;
use chrono::Local;
use std::process::Command;
use regex::Regex;
use once_cell::sync::Lazy;
use log::{debug, warn};

// @module: File and directory utilities

static SRT_CUE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d+\s*\r?\n\d{2}:\d{2}:\d{2}[,.]\d{3}\s+-->\s+\d{2}:\d{2}:\d{2}[,.]\d{3}").unwrap()
});

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        // Ensure the parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Append content to a log file with timestamp
    pub fn append_to_log_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file: {:?}", path.as_ref()))?;

        writeln!(file, "[{}] {}", timestamp, content)
            .with_context(|| format!("Failed to write to log file: {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Remove a file if it is there; a missing file is not an error
    pub fn remove_if_exists<P: AsRef<Path>>(path: P) -> Result<bool> {
        let path = path.as_ref();
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to remove file: {:?}", path)),
        }
    }

    /// Move `from` over `to`, retrying when the rename fails.
    ///
    /// A freshly written temp file is not always visible yet when the rename runs,
    /// so every failure is treated as transient until the attempts run out.
    pub async fn replace_with_retry<P1: AsRef<Path>, P2: AsRef<Path>>(
        from: P1,
        to: P2,
        attempts: u32,
        delay: Duration,
    ) -> std::io::Result<()> {
        let from = from.as_ref();
        let to = to.as_ref();
        let attempts = attempts.max(1);
        let mut attempt = 1;

        loop {
            match tokio::fs::rename(from, to).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < attempts => {
                    warn!("Attempt {}/{} to replace {:?} failed: {}", attempt, attempts, to, e);
                    attempt += 1;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Delete directories recursively, returning how many files were removed
    pub fn remove_dirs(dirs: &[PathBuf]) -> Result<usize> {
        let mut removed = 0;
        for dir in dirs {
            if !Self::dir_exists(dir) {
                continue;
            }
            removed += WalkDir::new(dir)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .count();
            fs::remove_dir_all(dir)
                .with_context(|| format!("Failed to remove directory: {:?}", dir))?;
            debug!("Removed {:?}", dir);
        }
        Ok(removed)
    }

    /// Detect if a file is a subtitle file (SRT) or a video file supported by ffmpeg
    ///
    /// Blocks on `ffprobe_path` when neither the extension nor the content decides.
    pub fn detect_file_type<P: AsRef<Path>>(path: P, ffprobe_path: &str) -> Result<FileType> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(anyhow::anyhow!("File does not exist: {:?}", path));
        }

        if let Some(ext) = path.extension() {
            let ext_str = ext.to_string_lossy().to_lowercase();

            if ext_str == "srt" {
                return Ok(FileType::Subtitle);
            }

            // Common video file extensions supported by ffmpeg
            let video_extensions = [
                "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v",
                "mpg", "mpeg", "ogv", "ts", "mts", "m2ts"
            ];

            if video_extensions.contains(&ext_str.as_str()) {
                return Ok(FileType::Video);
            }
        }

        // Fall back to examining file contents for SRT cues
        if let Ok(content) = fs::read_to_string(path) {
            if content.contains("-->") && SRT_CUE_REGEX.is_match(&content) {
                return Ok(FileType::Subtitle);
            }
        }

        // Let ffprobe decide for anything else
        let output = Command::new(ffprobe_path)
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=format_name")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(path)
            .output();

        if let Ok(output) = output {
            if output.status.success() {
                let format = String::from_utf8_lossy(&output.stdout).trim().to_lowercase();
                if !format.is_empty() {
                    return Ok(FileType::Video);
                }
            }
        }

        Ok(FileType::Unknown)
    }
}

/// Enum representing different file types
#[derive(Debug, PartialEq, Eq)]
pub enum FileType {
    /// Subtitle file (SRT)
    Subtitle,
    /// Video file supported by ffmpeg
    Video,
    /// Unknown file type
    Unknown,
}
