/*!
 * Per-segment artifacts and where they live on disk.
 *
 * Every artifact is keyed by its segment index. Paths are deterministic, so a re-run
 * finds the files of a previous (possibly failed) run and reuses them.
 */

use std::io;
use std::path::{Path, PathBuf};

use crate::app_config::WorkspaceConfig;
use crate::errors::PipelineError;

/// Speed-adjusted speech for one segment
#[derive(Debug, Clone, PartialEq)]
pub struct AudioArtifact {
    pub segment_index: usize,
    pub path: PathBuf,
    /// Duration in seconds after tempo adjustment
    pub duration: f64,
}

/// Cut (and possibly retimed) video for one segment
#[derive(Debug, Clone, PartialEq)]
pub struct VideoArtifact {
    pub segment_index: usize,
    pub path: PathBuf,
    /// Factor applied to the clip; 1.0 means untouched. Measured from the clip when reused
    pub speed_ratio: f64,
}

/// Video of one segment carrying its dubbed audio
#[derive(Debug, Clone, PartialEq)]
pub struct MergedArtifact {
    pub segment_index: usize,
    pub path: PathBuf,
}

/// How a worker resolved one segment
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    /// Freshly produced
    Produced(T),
    /// Found on disk from an earlier run
    Reused(T),
    /// Nothing to produce for this segment
    Skipped,
}

impl<T> StageOutcome<T> {
    pub fn artifact(self) -> Option<T> {
        match self {
            Self::Produced(artifact) | Self::Reused(artifact) => Some(artifact),
            Self::Skipped => None,
        }
    }

    pub fn is_reused(&self) -> bool {
        matches!(self, Self::Reused(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// Fixed-length arena with one write-once slot per segment
#[derive(Debug, Clone)]
pub struct SegmentSlots<T> {
    slots: Vec<Option<T>>,
}

impl<T> SegmentSlots<T> {
    pub fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| None).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Fill a slot. Writing an index twice or past the end is rejected.
    pub fn set(&mut self, index: usize, value: T) -> Result<(), PipelineError> {
        let len = self.slots.len();
        let slot = self.slots.get_mut(index).ok_or_else(|| {
            PipelineError::InvalidInput(format!("segment index {} out of range (0..{})", index, len))
        })?;
        if slot.is_some() {
            return Err(PipelineError::InvalidInput(format!("segment {} was written twice", index)));
        }
        *slot = Some(value);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Number of occupied slots
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Occupied slots in ascending index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|value| (index, value)))
    }
}

/// Deterministic file locations for one run
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    audio_dir: PathBuf,
    clip_dir: PathBuf,
    merged_dir: PathBuf,
    manifest: PathBuf,
}

impl WorkspaceLayout {
    pub fn from_config(config: &WorkspaceConfig) -> Self {
        let root = &config.work_dir;
        let merged_dir = root.join(&config.merged_dir);
        Self {
            audio_dir: root.join(&config.audio_dir),
            clip_dir: root.join(&config.clip_dir),
            manifest: merged_dir.join(&config.manifest_name),
            merged_dir,
        }
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    pub fn clip_dir(&self) -> &Path {
        &self.clip_dir
    }

    pub fn merged_dir(&self) -> &Path {
        &self.merged_dir
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest
    }

    pub fn audio_path(&self, index: usize) -> PathBuf {
        self.audio_dir.join(format!("audio{}.mp3", index))
    }

    pub fn temp_audio_path(&self, index: usize) -> PathBuf {
        self.audio_dir.join(format!("temp_audio{}.mp3", index))
    }

    /// Downloaded speech before the tempo adjustment
    pub fn raw_audio_path(&self, index: usize) -> PathBuf {
        self.audio_dir.join(format!("raw_audio{}.mp3", index))
    }

    pub fn clip_path(&self, index: usize) -> PathBuf {
        self.clip_dir.join(format!("clip{}.mp4", index))
    }

    pub fn temp_clip_path(&self, index: usize) -> PathBuf {
        self.clip_dir.join(format!("temp_clip{}.mp4", index))
    }

    /// Manifest-relative name of a merged clip
    pub fn merged_file_name(index: usize) -> String {
        format!("merged{}.mp4", index)
    }

    pub fn merged_path(&self, index: usize) -> PathBuf {
        self.merged_dir.join(Self::merged_file_name(index))
    }

    /// Create every intermediate directory
    pub fn prepare(&self) -> io::Result<()> {
        for dir in self.intermediate_dirs() {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Directories removed after a successful run
    pub fn intermediate_dirs(&self) -> Vec<PathBuf> {
        vec![self.audio_dir.clone(), self.clip_dir.clone(), self.merged_dir.clone()]
    }
}
