/*!
 * Final assembly of the merged clips.
 */

use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::FinalizeError;
use crate::file_utils::FileManager;
use crate::media_tools::MediaToolkit;

use super::artifacts::WorkspaceLayout;

/// What the finalizer did
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizeReport {
    pub output: PathBuf,
    /// Clips listed in the manifest
    pub clips: usize,
    /// Intermediate files deleted after success
    pub removed_files: usize,
}

/// Concatenates the manifest into the final output and cleans up
#[derive(Debug, Clone)]
pub struct ConcatenationFinalizer {
    media: Arc<dyn MediaToolkit>,
    layout: Arc<WorkspaceLayout>,
    keep_intermediates: bool,
}

impl ConcatenationFinalizer {
    pub fn new(media: Arc<dyn MediaToolkit>, layout: Arc<WorkspaceLayout>, keep_intermediates: bool) -> Self {
        Self {
            media,
            layout,
            keep_intermediates,
        }
    }

    /// Concatenate in manifest order without re-encoding.
    ///
    /// Intermediates are deleted only when the tool succeeds; on any failure they stay
    /// in place for inspection and resume.
    pub async fn finalize(&self, output: &Path) -> Result<FinalizeReport, FinalizeError> {
        let manifest = self.layout.manifest_path();
        if !FileManager::file_exists(manifest) {
            return Err(FinalizeError::ManifestMissing(manifest.to_path_buf()));
        }

        let content = tokio::fs::read_to_string(manifest)
            .await
            .map_err(|e| FinalizeError::Concat(format!("cannot read manifest {:?}: {}", manifest, e)))?;
        let clips = content.lines().filter(|line| line.trim_start().starts_with("file ")).count();
        if clips == 0 {
            return Err(FinalizeError::EmptyManifest(manifest.to_path_buf()));
        }

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            FileManager::ensure_dir(parent).map_err(|e| FinalizeError::Concat(format!("{:#}", e)))?;
        }

        self.media
            .concat(manifest, output)
            .await
            .map_err(|e| FinalizeError::Concat(e.to_string()))?;
        info!("Concatenated {} clip(s) into {:?}", clips, output);

        let removed_files = if self.keep_intermediates {
            0
        } else {
            match FileManager::remove_dirs(&self.layout.intermediate_dirs()) {
                Ok(count) => count,
                Err(e) => {
                    warn!("Cleanup of intermediate files failed: {:#}", e);
                    0
                }
            }
        };

        Ok(FinalizeReport {
            output: output.to_path_buf(),
            clips,
            removed_files,
        })
    }
}
