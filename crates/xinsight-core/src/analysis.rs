//! Analysis result returned by the inference service.
//!
//! The wire payload is JSON:
//!
//! ```json
//! {
//!   "patient_status": "Abnormal",
//!   "flagged_conditions": [{"condition": "Pneumonia", "confidence": "High", "probability": 0.94}],
//!   "medical_validation": {"status": "ok", "match_category": "strong", "semantic_score": 0.91},
//!   "heatmaps": {"Pneumonia": "data:image/jpeg;base64,..."},
//!   "report_text": "# Findings\n..."
//! }
//! ```
//!
//! Parsing is strict about the parts the renderer depends on: the status must be one of the
//! known classifications and every probability and score must lie in `[0, 1]`. Unknown extra
//! fields are ignored.

use crate::AnalysisError;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use xinsight_types::{NonEmptyText, UnitInterval};

/// Overall classification of the radiograph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatientStatus {
    Normal,
    Abnormal,
}

impl PatientStatus {
    pub fn is_abnormal(self) -> bool {
        matches!(self, PatientStatus::Abnormal)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PatientStatus::Normal => "Normal",
            PatientStatus::Abnormal => "Abnormal",
        }
    }
}

impl std::fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedCondition {
    pub condition: NonEmptyText,
    /// Label chosen by the service, e.g. `"High"` or `"94.0%"`
    pub confidence: String,
    pub probability: UnitInterval,
}

impl FlaggedCondition {
    /// Chip text, e.g. `Pneumonia (High)`.
    pub fn chip_label(&self) -> String {
        format!("{} ({})", self.condition, self.confidence)
    }
}

/// Semantic cross-check of the flagged conditions against a medical knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalValidation {
    pub status: String,
    pub match_category: String,
    pub semantic_score: UnitInterval,
}

/// An inline-encoded attention heatmap.
///
/// Normally a `data:<media-type>;base64,<payload>` URI. A bare base64 payload is tolerated and
/// treated as JPEG, which is what the inference service encodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeatmapImage(String);

#[derive(Debug, thiserror::Error)]
pub enum HeatmapError {
    #[error("heatmap is not base64 encoded")]
    NotBase64,
    #[error("heatmap payload could not be decoded: {0}")]
    Decode(#[from] base64::DecodeError),
}

const DEFAULT_HEATMAP_MEDIA_TYPE: &str = "image/jpeg";

impl HeatmapImage {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Value suitable for an `<img src>` attribute.
    pub fn as_data_uri(&self) -> std::borrow::Cow<'_, str> {
        if self.0.starts_with("data:") {
            std::borrow::Cow::Borrowed(&self.0)
        } else {
            std::borrow::Cow::Owned(format!(
                "data:{DEFAULT_HEATMAP_MEDIA_TYPE};base64,{}",
                self.0
            ))
        }
    }

    pub fn media_type(&self) -> &str {
        self.split_data_uri()
            .map(|(header, _)| header.split(';').next().unwrap_or(DEFAULT_HEATMAP_MEDIA_TYPE))
            .filter(|mt| !mt.is_empty())
            .unwrap_or(DEFAULT_HEATMAP_MEDIA_TYPE)
    }

    /// File extension matching the media type, used when writing heatmaps to disk.
    pub fn file_extension(&self) -> &'static str {
        match self.media_type() {
            "image/png" => "png",
            "image/webp" => "webp",
            _ => "jpg",
        }
    }

    /// Decodes the image bytes.
    pub fn decode(&self) -> Result<Vec<u8>, HeatmapError> {
        let payload = match self.split_data_uri() {
            Some((header, payload)) => {
                if !header.ends_with(";base64") {
                    return Err(HeatmapError::NotBase64);
                }
                payload
            }
            None => self.0.as_str(),
        };
        Ok(base64::engine::general_purpose::STANDARD.decode(payload.trim())?)
    }

    fn split_data_uri(&self) -> Option<(&str, &str)> {
        self.0.strip_prefix("data:")?.split_once(',')
    }
}

/// Structured response of one successful analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub patient_status: PatientStatus,
    pub flagged_conditions: Vec<FlaggedCondition>,
    pub medical_validation: MedicalValidation,
    /// Condition name to heatmap; `None` where the service could not produce one
    #[serde(default)]
    pub heatmaps: BTreeMap<String, Option<HeatmapImage>>,
    /// Markdown narrative
    #[serde(default)]
    pub report_text: String,
}

impl AnalysisResult {
    /// Parses a response body.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::MalformedPayload` with the serde error (including its path).
    pub fn from_json_slice(body: &[u8]) -> Result<Self, AnalysisError> {
        serde_json::from_slice(body).map_err(|e| AnalysisError::MalformedPayload(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Payload used across the crate's tests; one flagged condition with a heatmap.
    pub(crate) fn sample_payload() -> serde_json::Value {
        serde_json::json!({
            "patient_status": "Abnormal",
            "flagged_conditions": [
                {"condition": "Pneumonia", "confidence": "High", "probability": 0.94}
            ],
            "medical_validation": {
                "status": "ok",
                "match_category": "strong",
                "semantic_score": 0.91
            },
            "heatmaps": {"Pneumonia": "data:image/jpeg;base64,/9j/4AAQ"},
            "report_text": "# Findings\nPatchy consolidation in the right lower lobe."
        })
    }

    #[test]
    fn test_parse_sample_payload() {
        let body = serde_json::to_vec(&sample_payload()).unwrap();
        let result = AnalysisResult::from_json_slice(&body).expect("payload should parse");

        assert_eq!(result.patient_status, PatientStatus::Abnormal);
        assert!(result.patient_status.is_abnormal());
        assert_eq!(result.flagged_conditions.len(), 1);
        assert_eq!(result.flagged_conditions[0].chip_label(), "Pneumonia (High)");
        assert_eq!(result.medical_validation.semantic_score.get(), 0.91);
        assert!(result.heatmaps["Pneumonia"].is_some());
        assert!(result.report_text.starts_with("# Findings"));
    }

    #[test]
    fn test_null_heatmap_is_kept() {
        let mut payload = sample_payload();
        payload["heatmaps"] = serde_json::json!({"Pneumonia": null});
        let body = serde_json::to_vec(&payload).unwrap();

        let result = AnalysisResult::from_json_slice(&body).unwrap();
        assert_eq!(result.heatmaps.len(), 1);
        assert!(result.heatmaps["Pneumonia"].is_none());
    }

    #[test]
    fn test_unknown_status_is_malformed() {
        let mut payload = sample_payload();
        payload["patient_status"] = serde_json::json!("Inconclusive");
        let body = serde_json::to_vec(&payload).unwrap();

        assert!(matches!(
            AnalysisResult::from_json_slice(&body),
            Err(AnalysisError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_probability_out_of_range_is_malformed() {
        let mut payload = sample_payload();
        payload["flagged_conditions"][0]["probability"] = serde_json::json!(1.4);
        let body = serde_json::to_vec(&payload).unwrap();

        assert!(matches!(
            AnalysisResult::from_json_slice(&body),
            Err(AnalysisError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_error_body_is_malformed() {
        let body = br#"{"error": "Vision model is not loaded."}"#;
        assert!(matches!(
            AnalysisResult::from_json_slice(body),
            Err(AnalysisError::MalformedPayload(_))
        ));
        assert!(AnalysisResult::from_json_slice(b"<html>").is_err());
    }

    #[test]
    fn test_heatmap_data_uri_decode() {
        let heatmap = HeatmapImage::new("data:image/png;base64,aGVsbG8=");
        assert_eq!(heatmap.media_type(), "image/png");
        assert_eq!(heatmap.file_extension(), "png");
        assert_eq!(heatmap.decode().unwrap(), b"hello");
        assert_eq!(heatmap.as_data_uri(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn test_bare_base64_heatmap_is_jpeg() {
        let heatmap = HeatmapImage::new("aGVsbG8=");
        assert_eq!(heatmap.media_type(), "image/jpeg");
        assert_eq!(heatmap.file_extension(), "jpg");
        assert_eq!(heatmap.decode().unwrap(), b"hello");
        assert_eq!(heatmap.as_data_uri(), "data:image/jpeg;base64,aGVsbG8=");
    }

    #[test]
    fn test_non_base64_data_uri_is_rejected() {
        let heatmap = HeatmapImage::new("data:image/svg+xml,<svg/>");
        assert!(matches!(heatmap.decode(), Err(HeatmapError::NotBase64)));

        let garbage = HeatmapImage::new("data:image/jpeg;base64,***");
        assert!(matches!(garbage.decode(), Err(HeatmapError::Decode(_))));
    }
}
