//! Candidate validation and artifact construction.
//!
//! A [`CandidateFile`] is whatever the user dropped or picked: a name, the media type the
//! client declared (if any) and the raw bytes. [`IntakePolicy::admit`] decides whether the
//! candidate becomes a held [`Artifact`] or is rejected with a [`ValidationError`].
//!
//! # Media type resolution
//!
//! The declared media type is authoritative. When nothing useful was declared (missing, blank
//! or `application/octet-stream`) the type is resolved by content sniffing with `infer` and
//! then by file extension.

use crate::constants::{
    DEFAULT_MAX_UPLOAD_BYTES, DICOM_MEDIA_TYPE, EXTENSION_MEDIA_TYPES, IMAGE_MEDIA_PREFIX,
    OCTET_STREAM,
};
use crate::FilesError;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use xinsight_types::NonEmptyText;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Byte count in megabytes with two decimals.
fn megabytes(bytes: &u64) -> String {
    format!("{:.2}", *bytes as f64 / BYTES_PER_MB as f64)
}

/// A file offered for intake that has not been validated yet.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub file_name: String,
    pub declared_type: Option<String>,
    pub content: Vec<u8>,
}

/// Reasons a candidate is refused at intake.
///
/// The display text is the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unsupported file type. Please upload an image or DICOM file.")]
    UnsupportedType { media_type: Option<String> },

    #[error("File is too large. Maximum size is {} MB.", megabytes(.max_bytes))]
    TooLarge { size_bytes: u64, max_bytes: u64 },

    #[error("The selected file is empty.")]
    Empty,
}

/// An accepted upload.
///
/// Content is shared behind an `Arc` so a submission can carry it across the network call
/// without copying while the workflow keeps holding the artifact.
#[derive(Debug, Clone)]
pub struct Artifact {
    file_name: NonEmptyText,
    media_type: NonEmptyText,
    content: Arc<[u8]>,
    sha256: String,
    accepted_at: DateTime<Utc>,
}

/// Limits applied to every candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakePolicy {
    max_bytes: u64,
}

/// Returns true for `image/*` and the DICOM media type.
///
/// Parameters such as `; charset=...` are ignored and the comparison is case-insensitive.
pub fn is_accepted_media_type(media_type: &str) -> bool {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    (essence.starts_with(IMAGE_MEDIA_PREFIX) && essence.len() > IMAGE_MEDIA_PREFIX.len())
        || essence == DICOM_MEDIA_TYPE
}

impl CandidateFile {
    pub fn new(
        file_name: impl Into<String>,
        declared_type: Option<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            declared_type,
            content,
        }
    }

    /// Reads a candidate from disk, the command-line equivalent of the file picker.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::Io` if the file cannot be read.
    pub fn from_path(path: &Path, declared_type: Option<String>) -> Result<Self, FilesError> {
        let content = fs::read(path).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read candidate file {}: {}", path.display(), e),
            ))
        })?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        Ok(Self::new(file_name, declared_type, content))
    }

    /// Resolves the media type used for the acceptance decision.
    pub fn resolved_media_type(&self) -> Option<String> {
        let declared = self
            .declared_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case(OCTET_STREAM));
        if let Some(declared) = declared {
            return Some(declared.to_string());
        }

        if let Some(kind) = infer::get(&self.content) {
            return Some(kind.mime_type().to_string());
        }

        let extension = Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())?
            .to_ascii_lowercase();
        EXTENSION_MEDIA_TYPES
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, media_type)| (*media_type).to_string())
    }
}

impl Default for IntakePolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl IntakePolicy {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Validates a candidate and turns it into an [`Artifact`].
    ///
    /// Type is checked before size so that an unsupported file is always reported as such.
    ///
    /// # Errors
    ///
    /// - `ValidationError::UnsupportedType` if the resolved media type is not accepted
    /// - `ValidationError::Empty` if the file has no content
    /// - `ValidationError::TooLarge` if the file exceeds the configured limit
    pub fn admit(&self, candidate: CandidateFile) -> Result<Artifact, ValidationError> {
        let media_type = candidate.resolved_media_type();
        let media_type = match media_type {
            Some(mt) if is_accepted_media_type(&mt) => mt,
            other => return Err(ValidationError::UnsupportedType { media_type: other }),
        };

        let size_bytes = candidate.content.len() as u64;
        if size_bytes == 0 {
            return Err(ValidationError::Empty);
        }
        if size_bytes > self.max_bytes {
            return Err(ValidationError::TooLarge {
                size_bytes,
                max_bytes: self.max_bytes,
            });
        }

        let sha256 = hex::encode(Sha256::digest(&candidate.content));

        let file_name = NonEmptyText::new(&candidate.file_name)
            .or_else(|_| NonEmptyText::new("upload"))
            .map_err(|_| ValidationError::Empty)?;
        let media_type = NonEmptyText::new(media_type.to_ascii_lowercase())
            .map_err(|_| ValidationError::UnsupportedType { media_type: None })?;

        Ok(Artifact {
            file_name,
            media_type,
            content: Arc::from(candidate.content),
            sha256,
            accepted_at: Utc::now(),
        })
    }
}

impl Artifact {
    pub fn file_name(&self) -> &str {
        self.file_name.as_str()
    }

    pub fn media_type(&self) -> &str {
        self.media_type.as_str()
    }

    pub fn content(&self) -> &Arc<[u8]> {
        &self.content
    }

    pub fn size_bytes(&self) -> u64 {
        self.content.len() as u64
    }

    /// Size in megabytes with two decimals, as shown next to the preview.
    pub fn size_label(&self) -> String {
        format!("{} MB", megabytes(&self.size_bytes()))
    }

    /// Hex SHA-256 digest of the content
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    pub fn accepted_at(&self) -> DateTime<Utc> {
        self.accepted_at
    }

    pub fn is_dicom(&self) -> bool {
        self.media_type.as_str() == DICOM_MEDIA_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn png_bytes() -> Vec<u8> {
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 32]);
        bytes
    }

    #[test]
    fn test_accepted_media_types() {
        assert!(is_accepted_media_type("image/png"));
        assert!(is_accepted_media_type("IMAGE/JPEG"));
        assert!(is_accepted_media_type("application/dicom"));
        assert!(is_accepted_media_type("image/png; charset=binary"));
        assert!(!is_accepted_media_type("image/"));
        assert!(!is_accepted_media_type("application/pdf"));
        assert!(!is_accepted_media_type("text/plain"));
        assert!(!is_accepted_media_type(""));
    }

    #[test]
    fn test_admit_declared_image() {
        let candidate = CandidateFile::new("chest.png", Some("image/png".into()), png_bytes());
        let artifact = IntakePolicy::default()
            .admit(candidate)
            .expect("png should be admitted");

        assert_eq!(artifact.file_name(), "chest.png");
        assert_eq!(artifact.media_type(), "image/png");
        assert_eq!(artifact.size_bytes(), 40);
        assert_eq!(artifact.sha256().len(), 64);
        assert!(!artifact.is_dicom());
    }

    #[test]
    fn test_admit_rejects_unsupported_declared_type() {
        let candidate =
            CandidateFile::new("notes.pdf", Some("application/pdf".into()), b"%PDF".to_vec());
        let err = IntakePolicy::default().admit(candidate).unwrap_err();

        assert_eq!(
            err,
            ValidationError::UnsupportedType {
                media_type: Some("application/pdf".into())
            }
        );
        assert_eq!(
            err.to_string(),
            "Unsupported file type. Please upload an image or DICOM file."
        );
    }

    #[test]
    fn test_declared_type_wins_over_content() {
        // PNG bytes declared as plain text are still rejected
        let candidate = CandidateFile::new("chest.png", Some("text/plain".into()), png_bytes());
        assert!(matches!(
            IntakePolicy::default().admit(candidate),
            Err(ValidationError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_undeclared_type_is_sniffed() {
        let candidate = CandidateFile::new("scan", None, png_bytes());
        assert_eq!(candidate.resolved_media_type().as_deref(), Some("image/png"));

        let octet = CandidateFile::new(
            "scan",
            Some("application/octet-stream".into()),
            png_bytes(),
        );
        assert_eq!(octet.resolved_media_type().as_deref(), Some("image/png"));
    }

    #[test]
    fn test_undeclared_type_falls_back_to_extension() {
        let candidate = CandidateFile::new("study.DCM", None, vec![1, 2, 3, 4]);
        let artifact = IntakePolicy::default()
            .admit(candidate)
            .expect("dcm extension should be admitted");
        assert_eq!(artifact.media_type(), DICOM_MEDIA_TYPE);
        assert!(artifact.is_dicom());

        let unknown = CandidateFile::new("readme", None, b"hello".to_vec());
        assert_eq!(
            IntakePolicy::default().admit(unknown).unwrap_err(),
            ValidationError::UnsupportedType { media_type: None }
        );
    }

    #[test]
    fn test_admit_enforces_size_limit() {
        let policy = IntakePolicy::new(16);
        let candidate = CandidateFile::new("chest.png", Some("image/png".into()), png_bytes());
        let err = policy.admit(candidate).unwrap_err();

        assert!(matches!(
            err,
            ValidationError::TooLarge {
                size_bytes: 40,
                max_bytes: 16,
                ..
            }
        ));
    }

    #[test]
    fn test_default_limit_message_mentions_ten_mb() {
        let policy = IntakePolicy::default();
        let content = vec![0u8; (DEFAULT_MAX_UPLOAD_BYTES + 1) as usize];
        let candidate = CandidateFile::new("big.png", Some("image/png".into()), content);
        let err = policy.admit(candidate).unwrap_err();

        assert_eq!(err.to_string(), "File is too large. Maximum size is 10.00 MB.");
    }

    #[test]
    fn test_limit_message_keeps_fractional_megabytes() {
        let candidate = |len: usize| CandidateFile::new("big.png", Some("image/png".into()), vec![0u8; len]);

        let err = IntakePolicy::new(BYTES_PER_MB / 2).admit(candidate(BYTES_PER_MB as usize)).unwrap_err();
        assert_eq!(err.to_string(), "File is too large. Maximum size is 0.50 MB.");

        let limit = BYTES_PER_MB + BYTES_PER_MB / 2;
        let err = IntakePolicy::new(limit).admit(candidate(limit as usize + 1)).unwrap_err();
        assert_eq!(err.to_string(), "File is too large. Maximum size is 1.50 MB.");
    }

    #[test]
    fn test_admit_rejects_empty_file() {
        let candidate = CandidateFile::new("chest.png", Some("image/png".into()), Vec::new());
        assert_eq!(
            IntakePolicy::default().admit(candidate).unwrap_err(),
            ValidationError::Empty
        );
    }

    #[test]
    fn test_from_path_reads_name_and_content() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let path = temp.path().join("chest.png");
        fs::write(&path, png_bytes()).expect("Failed to write candidate");

        let candidate = CandidateFile::from_path(&path, None).expect("should read candidate");
        assert_eq!(candidate.file_name, "chest.png");
        assert_eq!(candidate.content.len(), 40);
        assert!(candidate.declared_type.is_none());
    }

    #[test]
    fn test_from_path_missing_file() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let result = CandidateFile::from_path(&temp.path().join("missing.png"), None);
        assert!(matches!(result, Err(FilesError::Io(_))));
    }

    #[test]
    fn test_size_label_two_decimals() {
        let candidate = CandidateFile::new(
            "chest.png",
            Some("image/png".into()),
            vec![0u8; 1024 * 1024 + 512 * 1024],
        );
        let artifact = IntakePolicy::default().admit(candidate).unwrap();
        assert_eq!(artifact.size_label(), "1.50 MB");
    }
}
