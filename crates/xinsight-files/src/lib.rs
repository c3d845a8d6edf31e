//! X-Insight File Intake
//!
//! This crate turns a user-supplied file into a held upload artifact and manages the local
//! preview that is shown while the artifact is held.
//!
//! ## Design Principles
//!
//! - Intake validation is synchronous and never touches the network
//! - An accepted file is immutable; a new selection produces a new [`Artifact`]
//! - Previews are owned by a [`PreviewHandle`] and removed from disk when the handle is dropped
//! - Preview storage is scoped to one directory and sharded by content hash
//!
//! ## Preview Layout
//!
//! ```text
//! <preview_root>/
//! └── previews/
//!     └── sha256/
//!         └── ab/
//!             └── cd/
//!                 └── abcd3f9e…-<preview-id>
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use xinsight_files::{CandidateFile, IntakePolicy, PreviewStore};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PreviewStore::new(Path::new("/tmp/xinsight-previews"))?;
//! let candidate = CandidateFile::from_path(Path::new("chest.png"), None)?;
//! let artifact = IntakePolicy::default().admit(candidate)?;
//! let preview = store.create(&artifact)?;
//! println!("preview at {}", preview.path().display());
//! # Ok(())
//! # }
//! ```

mod constants;
mod intake;
mod preview;

pub use constants::{
    DEFAULT_MAX_UPLOAD_BYTES, DICOM_MEDIA_TYPE, IMAGE_MEDIA_PREFIX, PREVIEWS_FOLDER_NAME,
};
pub use intake::{is_accepted_media_type, Artifact, CandidateFile, IntakePolicy, ValidationError};
pub use preview::{PreviewHandle, PreviewStore};

/// Errors that can occur while reading candidates or managing preview storage
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Preview directory could not be created or is not a directory
    #[error("Invalid preview directory: {0}")]
    InvalidPreviewDirectory(String),

    /// Preview file was requested after it had been released
    #[error("Preview not found: {0}")]
    PreviewNotFound(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
