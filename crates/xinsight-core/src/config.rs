//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the workflow, the
//! analysis client and the session layer. Request handling never reads environment variables.
//!
//! # Environment Variables
//! - `XINSIGHT_ANALYSIS_URL`: inference service base URL (default `http://127.0.0.1:8000`)
//! - `XINSIGHT_ANALYSIS_TIMEOUT_SECS`: request timeout in seconds (unset: wait indefinitely)
//! - `XINSIGHT_MAX_UPLOAD_BYTES`: intake size limit (default 10 MB)
//! - `XINSIGHT_PREVIEW_DIR`: preview directory (default `<tmp>/xinsight-previews`)
//! - `XINSIGHT_SESSION_FILE`: persisted CLI session (default `.xinsight_session.json`)

use crate::constants::{
    ANALYSIS_PATH, DEFAULT_ANALYSIS_BASE_URL, DEFAULT_PREVIEW_DIR_NAME, DEFAULT_SESSION_FILE,
};
use crate::{XInsightError, XInsightResult};
use std::path::{Path, PathBuf};
use std::time::Duration;
use xinsight_files::{IntakePolicy, DEFAULT_MAX_UPLOAD_BYTES};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    analysis_base_url: reqwest::Url,
    analysis_timeout: Option<Duration>,
    max_upload_bytes: u64,
    preview_dir: PathBuf,
    session_file: PathBuf,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `XInsightError::InvalidConfig` if the base URL is not an absolute `http(s)` URL
    /// or the upload limit is zero.
    pub fn new(
        analysis_base_url: &str,
        analysis_timeout: Option<Duration>,
        max_upload_bytes: u64,
        preview_dir: PathBuf,
        session_file: PathBuf,
    ) -> XInsightResult<Self> {
        let analysis_base_url = reqwest::Url::parse(analysis_base_url.trim()).map_err(|e| {
            XInsightError::InvalidConfig(format!(
                "analysis base URL {analysis_base_url:?} is not valid: {e}"
            ))
        })?;
        if !matches!(analysis_base_url.scheme(), "http" | "https") {
            return Err(XInsightError::InvalidConfig(
                "analysis base URL must use http or https".into(),
            ));
        }
        if max_upload_bytes == 0 {
            return Err(XInsightError::InvalidConfig(
                "max upload size cannot be zero".into(),
            ));
        }

        Ok(Self {
            analysis_base_url,
            analysis_timeout,
            max_upload_bytes,
            preview_dir,
            session_file,
        })
    }

    /// Reads every `XINSIGHT_*` variable once.
    ///
    /// Call after `dotenvy::dotenv()` so `.env` values are visible.
    pub fn from_env() -> XInsightResult<Self> {
        let base_url = std::env::var("XINSIGHT_ANALYSIS_URL")
            .unwrap_or_else(|_| DEFAULT_ANALYSIS_BASE_URL.into());
        let timeout = timeout_from_env_value(std::env::var("XINSIGHT_ANALYSIS_TIMEOUT_SECS").ok())?;
        let max_upload_bytes =
            max_upload_bytes_from_env_value(std::env::var("XINSIGHT_MAX_UPLOAD_BYTES").ok())?;
        let preview_dir = std::env::var("XINSIGHT_PREVIEW_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_PREVIEW_DIR_NAME));
        let session_file = std::env::var("XINSIGHT_SESSION_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE));

        Self::new(
            &base_url,
            timeout,
            max_upload_bytes,
            preview_dir,
            session_file,
        )
    }

    /// Full analysis endpoint: base URL with the analysis path appended.
    pub fn analysis_url(&self) -> String {
        format!(
            "{}{}",
            self.analysis_base_url.as_str().trim_end_matches('/'),
            ANALYSIS_PATH
        )
    }

    pub fn analysis_timeout(&self) -> Option<Duration> {
        self.analysis_timeout
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    pub fn intake_policy(&self) -> IntakePolicy {
        IntakePolicy::new(self.max_upload_bytes)
    }

    pub fn preview_dir(&self) -> &Path {
        &self.preview_dir
    }

    pub fn session_file(&self) -> &Path {
        &self.session_file
    }
}

/// Parse the upload size limit from an optional string value.
///
/// If `value` is `None` or blank, returns the advertised 10 MB default.
pub fn max_upload_bytes_from_env_value(value: Option<String>) -> XInsightResult<u64> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    match value {
        None => Ok(DEFAULT_MAX_UPLOAD_BYTES),
        Some(v) => v.parse::<u64>().map_err(|e| {
            XInsightError::InvalidConfig(format!("XINSIGHT_MAX_UPLOAD_BYTES {v:?}: {e}"))
        }),
    }
}

/// Parse the optional request timeout in whole seconds.
///
/// `None`, blank and `0` all mean "no timeout".
pub fn timeout_from_env_value(value: Option<String>) -> XInsightResult<Option<Duration>> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let Some(v) = value else {
        return Ok(None);
    };
    let secs = v.parse::<u64>().map_err(|e| {
        XInsightError::InvalidConfig(format!("XINSIGHT_ANALYSIS_TIMEOUT_SECS {v:?}: {e}"))
    })?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cfg(base_url: &str) -> XInsightResult<CoreConfig> {
        CoreConfig::new(
            base_url,
            None,
            DEFAULT_MAX_UPLOAD_BYTES,
            PathBuf::from("/tmp/previews"),
            PathBuf::from("session.json"),
        )
    }

    #[test]
    fn test_analysis_url_appends_predict_path() {
        let cfg = test_cfg("http://127.0.0.1:8000").expect("valid config");
        assert_eq!(cfg.analysis_url(), "http://127.0.0.1:8000/predict");

        let cfg = test_cfg("https://inference.example.org/").expect("valid config");
        assert_eq!(cfg.analysis_url(), "https://inference.example.org/predict");
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(matches!(
            test_cfg("not a url"),
            Err(XInsightError::InvalidConfig(_))
        ));
        assert!(matches!(
            test_cfg("ftp://example.org"),
            Err(XInsightError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_zero_upload_limit() {
        let result = CoreConfig::new(
            DEFAULT_ANALYSIS_BASE_URL,
            None,
            0,
            PathBuf::from("/tmp/previews"),
            PathBuf::from("session.json"),
        );
        assert!(matches!(result, Err(XInsightError::InvalidConfig(_))));
    }

    #[test]
    fn test_max_upload_bytes_from_env_value() {
        assert_eq!(
            max_upload_bytes_from_env_value(None).unwrap(),
            DEFAULT_MAX_UPLOAD_BYTES
        );
        assert_eq!(
            max_upload_bytes_from_env_value(Some("  ".into())).unwrap(),
            DEFAULT_MAX_UPLOAD_BYTES
        );
        assert_eq!(
            max_upload_bytes_from_env_value(Some("2048".into())).unwrap(),
            2048
        );
        assert!(max_upload_bytes_from_env_value(Some("ten".into())).is_err());
    }

    #[test]
    fn test_timeout_from_env_value() {
        assert_eq!(timeout_from_env_value(None).unwrap(), None);
        assert_eq!(timeout_from_env_value(Some("0".into())).unwrap(), None);
        assert_eq!(
            timeout_from_env_value(Some("30".into())).unwrap(),
            Some(Duration::from_secs(30))
        );
        assert!(timeout_from_env_value(Some("-1".into())).is_err());
    }

    #[test]
    fn test_intake_policy_uses_configured_limit() {
        let cfg = CoreConfig::new(
            DEFAULT_ANALYSIS_BASE_URL,
            None,
            1024,
            PathBuf::from("/tmp/previews"),
            PathBuf::from("session.json"),
        )
        .unwrap();
        assert_eq!(cfg.intake_policy().max_bytes(), 1024);
    }
}
