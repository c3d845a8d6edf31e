//! Local preview storage for held artifacts
//!
//! A preview is the locally addressable copy of an accepted upload that the page shell shows
//! next to the "analyse" trigger. It must only exist while its artifact is held, so every
//! preview is owned by a [`PreviewHandle`] and removed from disk when that handle is dropped.
//! Replacing the held artifact, clearing it, logging out and process teardown all release the
//! preview through the same `Drop` path.
//!
//! # Storage Layout
//!
//! ```text
//! <preview_root>/
//! └── previews/
//!     └── sha256/
//!         └── ab/
//!             └── cd/
//!                 └── abcdef…-<uuid>
//! ```
//!
//! The UUID suffix keeps two previews of identical content apart, so replacing an artifact
//! with a byte-identical one never removes the new preview when the old one is released.

use crate::{Artifact, FilesError, PREVIEWS_FOLDER_NAME};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Directory-scoped factory for preview files
#[derive(Debug, Clone)]
pub struct PreviewStore {
    root_directory: PathBuf,
}

/// Owner of one preview file.
///
/// Not `Clone`: there is exactly one owner, and dropping it releases the file.
#[derive(Debug)]
pub struct PreviewHandle {
    id: Uuid,
    path: PathBuf,
    media_type: String,
}

impl PreviewStore {
    /// Creates a store rooted at `root_directory`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidPreviewDirectory` if the path exists but is not a directory,
    /// cannot be created, or cannot be canonicalised.
    pub fn new(root_directory: &Path) -> Result<Self, FilesError> {
        if root_directory.exists() && !root_directory.is_dir() {
            return Err(FilesError::InvalidPreviewDirectory(format!(
                "Path is not a directory: {}",
                root_directory.display()
            )));
        }

        fs::create_dir_all(root_directory).map_err(|e| {
            FilesError::InvalidPreviewDirectory(format!(
                "Cannot create {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        let root_directory = root_directory.canonicalize().map_err(|e| {
            FilesError::InvalidPreviewDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        Ok(Self { root_directory })
    }

    /// Writes a preview for `artifact` and returns its owning handle.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::Io` if the shard directory or preview file cannot be written.
    pub fn create(&self, artifact: &Artifact) -> Result<PreviewHandle, FilesError> {
        let id = Uuid::new_v4();
        let path = self
            .root_directory
            .join(compute_relative_path(artifact.sha256(), id));

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                FilesError::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create preview directory {}: {}",
                        parent.display(),
                        e
                    ),
                ))
            })?;
        }

        fs::write(&path, artifact.content().as_ref()).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write preview to {}: {}", path.display(), e),
            ))
        })?;

        tracing::debug!(preview_id = %id, path = %path.display(), "preview created");

        Ok(PreviewHandle {
            id,
            path,
            media_type: artifact.media_type().to_string(),
        })
    }

    /// Counts preview files currently on disk.
    ///
    /// Anything above the number of held artifacts is a leaked preview.
    pub fn live_previews(&self) -> Result<usize, FilesError> {
        fn count_files(path: &Path) -> Result<usize, FilesError> {
            if !path.is_dir() {
                return Ok(0);
            }
            let mut total = 0;
            for entry in fs::read_dir(path)? {
                let entry_path = entry?.path();
                if entry_path.is_dir() {
                    total += count_files(&entry_path)?;
                } else {
                    total += 1;
                }
            }
            Ok(total)
        }

        count_files(&self.root_directory.join(PREVIEWS_FOLDER_NAME))
    }

    #[must_use]
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }
}

/// `previews/sha256/<shard1>/<shard2>/<hash>-<id>`
fn compute_relative_path(hash_hex: &str, id: Uuid) -> String {
    let shard1 = hash_hex.get(0..2).unwrap_or("00");
    let shard2 = hash_hex.get(2..4).unwrap_or("00");
    format!(
        "{}/sha256/{}/{}/{}-{}",
        PREVIEWS_FOLDER_NAME,
        shard1,
        shard2,
        hash_hex,
        id.simple()
    )
}

impl PreviewHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Reads the preview bytes back for display.
    pub fn read(&self) -> Result<Vec<u8>, FilesError> {
        fs::read(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FilesError::PreviewNotFound(self.id.to_string()),
            _ => FilesError::Io(e),
        })
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(preview_id = %self.id, "preview released"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                preview_id = %self.id,
                path = %self.path.display(),
                "failed to release preview: {}",
                e
            ),
        }
    }
}
