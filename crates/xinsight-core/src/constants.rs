//! Constants used throughout the X-Insight core crate.
//!
//! Endpoint paths, defaults and user-facing messages live here so the CLI and the REST shell
//! stay consistent.

/// Default base URL of the inference service.
pub const DEFAULT_ANALYSIS_BASE_URL: &str = "http://127.0.0.1:8000";

/// Path of the analysis endpoint, appended to the base URL.
pub const ANALYSIS_PATH: &str = "/predict";

/// Name of the multipart field carrying the image bytes.
pub const ANALYSIS_UPLOAD_FIELD: &str = "file";

/// Default file used to persist the signed-in user between CLI invocations.
pub const DEFAULT_SESSION_FILE: &str = ".xinsight_session.json";

/// Folder name (under the system temp directory) used for previews when none is configured.
pub const DEFAULT_PREVIEW_DIR_NAME: &str = "xinsight-previews";

/// Default listen address for the REST page shell.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

/// Message shown for every failed analysis attempt.
pub const ANALYSIS_FAILED_MESSAGE: &str =
    "Analysis failed. Please ensure the backend server is running and try again.";

/// Guidance shown before any file is held.
pub const PLACEHOLDER_MESSAGE: &str = "Upload and analyze an X-ray to see results";

/// Progress text shown while a submission is in flight.
pub const PROGRESS_MESSAGE: &str = "Analyzing X-ray image...";
