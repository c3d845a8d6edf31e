//! Result renderer.
//!
//! [`render`] is a pure function of the workflow state. It produces a [`PageView`] that the REST
//! shell serialises as JSON and the CLI prints through its `Display` implementation. Rendering
//! never changes the workflow.

use crate::analysis::{AnalysisResult, HeatmapImage};
use crate::constants::{PLACEHOLDER_MESSAGE, PROGRESS_MESSAGE};
use crate::markdown::MarkdownService;
use crate::workflow::{SubmissionState, UploadWorkflow};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageView {
    pub upload: UploadPanel,
    pub results: ResultsPanel,
    /// Error region; absent when there is nothing to report
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UploadPanel {
    DropZone,
    Held {
        file_name: String,
        media_type: String,
        size_label: String,
        preview_id: String,
        /// RFC 3339 time the file passed intake
        accepted_at: String,
        can_analyse: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultsPanel {
    Placeholder { message: String },
    Progress { message: String },
    Complete(Box<ResultView>),
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerTone {
    /// Abnormal findings, shown in red
    Alert,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusBanner {
    pub label: String,
    pub tone: BannerTone,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionChip {
    pub label: String,
    pub probability: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationSummary {
    pub status: String,
    pub match_category: String,
    pub semantic_score: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapTile {
    pub condition: String,
    pub label: String,
    /// `data:` URI, absent when the service could not produce the heatmap
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultView {
    pub banner: StatusBanner,
    pub chips: Vec<ConditionChip>,
    pub validation: ValidationSummary,
    pub heatmaps: Vec<HeatmapTile>,
    /// First heading of the report, shown above it
    pub report_title: Option<String>,
    pub report_markdown: String,
    pub report_html: String,
}

/// Renders the current workflow state.
pub fn render(workflow: &UploadWorkflow) -> PageView {
    let upload = match (workflow.artifact(), workflow.preview()) {
        (Some(artifact), Some(preview)) => UploadPanel::Held {
            file_name: artifact.file_name().to_string(),
            media_type: artifact.media_type().to_string(),
            size_label: artifact.size_label(),
            preview_id: preview.id().to_string(),
            accepted_at: artifact.accepted_at().to_rfc3339(),
            can_analyse: workflow.can_submit(),
        },
        _ => UploadPanel::DropZone,
    };

    let results = match workflow.state() {
        SubmissionState::Idle => ResultsPanel::Placeholder {
            message: PLACEHOLDER_MESSAGE.to_string(),
        },
        SubmissionState::Submitting { .. } => ResultsPanel::Progress {
            message: PROGRESS_MESSAGE.to_string(),
        },
        SubmissionState::Succeeded(result) => {
            ResultsPanel::Complete(Box::new(render_result(result)))
        }
        SubmissionState::Failed(_) => ResultsPanel::Failed,
    };

    PageView {
        upload,
        results,
        error: workflow.error_message(),
    }
}

/// Maps an analysis result onto its display sections.
pub fn render_result(result: &AnalysisResult) -> ResultView {
    let banner = StatusBanner {
        label: result.patient_status.to_string(),
        tone: if result.patient_status.is_abnormal() {
            BannerTone::Alert
        } else {
            BannerTone::Clear
        },
    };

    let chips = result
        .flagged_conditions
        .iter()
        .map(|c| ConditionChip {
            label: c.chip_label(),
            probability: c.probability.to_string(),
        })
        .collect();

    let validation = ValidationSummary {
        status: result.medical_validation.status.clone(),
        match_category: result.medical_validation.match_category.clone(),
        semantic_score: result.medical_validation.semantic_score.to_string(),
    };

    let heatmaps = result
        .heatmaps
        .iter()
        .map(|(condition, image)| HeatmapTile {
            condition: condition.clone(),
            label: tile_label(condition),
            image: image.as_ref().map(|i: &HeatmapImage| i.as_data_uri().into_owned()),
        })
        .collect();

    let markdown = MarkdownService::new();
    ResultView {
        banner,
        chips,
        validation,
        heatmaps,
        report_title: markdown.report_title(&result.report_text),
        report_markdown: result.report_text.clone(),
        report_html: markdown.report_to_html(&result.report_text),
    }
}

/// `Pleural_Thickening` → `PLEURAL THICKENING`
fn tile_label(condition: &str) -> String {
    condition.replace('_', " ").to_uppercase()
}

impl fmt::Display for PageView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.upload {
            UploadPanel::DropZone => writeln!(f, "Upload: no file selected")?,
            UploadPanel::Held {
                file_name,
                media_type,
                size_label,
                ..
            } => writeln!(f, "Upload: {file_name} ({size_label}, {media_type})")?,
        }

        match &self.results {
            ResultsPanel::Placeholder { message } | ResultsPanel::Progress { message } => {
                writeln!(f, "{message}")?
            }
            ResultsPanel::Complete(view) => write!(f, "{view}")?,
            ResultsPanel::Failed => {}
        }

        if let Some(error) = &self.error {
            writeln!(f, "An Error Occurred: {error}")?;
        }
        Ok(())
    }
}

impl fmt::Display for ResultView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.banner.tone {
            BannerTone::Alert => "!!",
            BannerTone::Clear => "OK",
        };
        writeln!(f, "[{marker}] Patient status: {}", self.banner.label)?;

        writeln!(f, "Flagged conditions:")?;
        for chip in &self.chips {
            writeln!(f, "  - {} {}", chip.label, chip.probability)?;
        }

        writeln!(
            f,
            "Validation: {} (category: {}, semantic score: {})",
            self.validation.status, self.validation.match_category, self.validation.semantic_score
        )?;

        if !self.heatmaps.is_empty() {
            writeln!(f, "Heatmaps:")?;
            for tile in &self.heatmaps {
                let availability = if tile.image.is_some() {
                    "available"
                } else {
                    "unavailable"
                };
                writeln!(f, "  - {} ({availability})", tile.label)?;
            }
        }

        if !self.report_markdown.trim().is_empty() {
            match &self.report_title {
                Some(title) => writeln!(f, "Report ({title}):")?,
                None => writeln!(f, "Report:")?,
            }
            writeln!(f, "{}", self.report_markdown.trim_end())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::sample_payload;
    use crate::workflow::tests::{png, sample_result, test_workflow, FixedClient};
    use crate::AnalysisError;
    use tempfile::TempDir;

    #[test]
    fn test_empty_workflow_shows_placeholder() {
        let temp = TempDir::new().unwrap();
        let view = render(&test_workflow(&temp));

        assert_eq!(view.upload, UploadPanel::DropZone);
        assert_eq!(
            view.results,
            ResultsPanel::Placeholder {
                message: PLACEHOLDER_MESSAGE.into()
            }
        );
        assert!(view.error.is_none());
    }

    #[test]
    fn test_held_artifact_offers_trigger() {
        let temp = TempDir::new().unwrap();
        let mut workflow = test_workflow(&temp);
        workflow.accept(png("chest.png")).unwrap();

        let view = render(&workflow);
        match view.upload {
            UploadPanel::Held {
                file_name,
                accepted_at,
                can_analyse,
                ..
            } => {
                assert_eq!(file_name, "chest.png");
                assert_eq!(
                    accepted_at,
                    workflow.artifact().unwrap().accepted_at().to_rfc3339()
                );
                assert!(can_analyse);
            }
            other => panic!("expected held upload, got {other:?}"),
        }
    }

    #[test]
    fn test_submitting_shows_progress_without_trigger() {
        let temp = TempDir::new().unwrap();
        let mut workflow = test_workflow(&temp);
        workflow.accept(png("chest.png")).unwrap();
        workflow.begin_submission().unwrap();

        let view = render(&workflow);
        assert!(matches!(view.results, ResultsPanel::Progress { .. }));
        assert!(matches!(
            view.upload,
            UploadPanel::Held {
                can_analyse: false,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_chest_png_scenario() {
        let temp = TempDir::new().unwrap();
        let mut workflow = test_workflow(&temp);
        workflow.accept(png("chest.png")).unwrap();
        workflow.submit(&FixedClient::ok()).await;

        let view = render(&workflow);
        let ResultsPanel::Complete(result) = &view.results else {
            panic!("expected complete results, got {:?}", view.results);
        };

        assert_eq!(result.banner.label, "Abnormal");
        assert_eq!(result.banner.tone, BannerTone::Alert);
        assert_eq!(result.chips.len(), 1);
        assert_eq!(result.chips[0].label, "Pneumonia (High)");
        assert_eq!(result.chips[0].probability, "94.0%");
        assert_eq!(result.validation.semantic_score, "91.0%");
        assert_eq!(result.heatmaps.len(), 1);
        assert_eq!(result.heatmaps[0].label, "PNEUMONIA");
        assert!(result.heatmaps[0]
            .image
            .as_deref()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
        assert_eq!(result.report_title.as_deref(), Some("Findings"));
        assert!(result.report_html.contains("<h1>Findings</h1>"));
        assert!(view.error.is_none());
    }

    #[test]
    fn test_chip_count_matches_payload() {
        let mut payload = sample_payload();
        payload["flagged_conditions"] = serde_json::json!([
            {"condition": "Effusion", "confidence": "41.2%", "probability": 0.412},
            {"condition": "Pleural_Thickening", "confidence": "30.0%", "probability": 0.3},
            {"condition": "Mass", "confidence": "22.1%", "probability": 0.221}
        ]);
        payload["heatmaps"] = serde_json::json!({
            "Effusion": "data:image/jpeg;base64,/9j/",
            "Pleural_Thickening": null
        });
        let result: AnalysisResult = serde_json::from_value(payload).unwrap();

        let view = render_result(&result);

        assert_eq!(view.chips.len(), result.flagged_conditions.len());
        assert_eq!(view.heatmaps.len(), 2);
        let thickening = view
            .heatmaps
            .iter()
            .find(|t| t.condition == "Pleural_Thickening")
            .unwrap();
        assert_eq!(thickening.label, "PLEURAL THICKENING");
        assert!(thickening.image.is_none());
    }

    #[test]
    fn test_normal_status_is_clear_tone() {
        let mut result = sample_result();
        result.patient_status = crate::analysis::PatientStatus::Normal;
        assert_eq!(render_result(&result).banner.tone, BannerTone::Clear);
    }

    #[test]
    fn test_failed_shows_error_without_results() {
        let temp = TempDir::new().unwrap();
        let mut workflow = test_workflow(&temp);
        workflow.accept(png("chest.png")).unwrap();
        let s = workflow.begin_submission().unwrap();
        workflow.complete_submission(s.generation(), Err(AnalysisError::Status(500)));

        let view = render(&workflow);
        assert_eq!(view.results, ResultsPanel::Failed);
        assert!(!view.error.as_deref().unwrap().is_empty());

        let text = view.to_string();
        assert!(text.contains("An Error Occurred"));
        assert!(!text.contains("Patient status"));
    }

    #[test]
    fn test_rendering_does_not_change_state() {
        let temp = TempDir::new().unwrap();
        let mut workflow = test_workflow(&temp);
        workflow.accept(png("chest.png")).unwrap();
        let generation = workflow.generation();

        let first = render(&workflow);
        let second = render(&workflow);

        assert_eq!(first, second);
        assert_eq!(workflow.generation(), generation);
    }

    #[test]
    fn test_terminal_text_lists_sections() {
        let text = render_result(&sample_result()).to_string();

        assert!(text.contains("[!!] Patient status: Abnormal"));
        assert!(text.contains("  - Pneumonia (High) 94.0%"));
        assert!(text.contains("category: strong"));
        assert!(text.contains("  - PNEUMONIA (available)"));
        assert!(text.contains("Report (Findings):"));
        assert!(text.contains("# Findings"));
    }

    #[test]
    fn test_report_without_heading_has_no_title() {
        let mut result = sample_result();
        result.report_text = "Lungs are clear.".into();

        let view = render_result(&result);
        assert!(view.report_title.is_none());
        assert!(view.to_string().contains("Report:\nLungs are clear."));
    }

    #[test]
    fn test_view_serialises_with_kind_tags() {
        let temp = TempDir::new().unwrap();
        let view = render(&test_workflow(&temp));
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["upload"]["kind"], "drop_zone");
        assert_eq!(json["results"]["kind"], "placeholder");
        assert!(json["error"].is_null());
    }
}
