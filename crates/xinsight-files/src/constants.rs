//! Media type and storage constants for file intake.

/// Folder under the preview root that holds preview files.
pub const PREVIEWS_FOLDER_NAME: &str = "previews";

/// Media type prefix accepted for ordinary radiograph images.
pub const IMAGE_MEDIA_PREFIX: &str = "image/";

/// Media type token accepted for DICOM files.
pub const DICOM_MEDIA_TYPE: &str = "application/dicom";

/// Upload size limit advertised to users (10 MB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Generic binary media type sent by clients that do not know the real type.
pub(crate) const OCTET_STREAM: &str = "application/octet-stream";

/// File extensions resolved to a media type when none is declared and sniffing fails.
pub(crate) const EXTENSION_MEDIA_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("dcm", DICOM_MEDIA_TYPE),
];
