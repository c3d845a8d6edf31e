//! Upload-and-analysis workflow
//!
//! [`UploadWorkflow`] holds at most one accepted artifact together with its preview, and drives
//! the submission state machine:
//!
//! ```text
//!            accept / clear                    accept / clear
//!   ┌──────────────────────────┐      ┌──────────────────────────────┐
//!   ▼                          │      │                              │
//! Idle ──begin──▶ Submitting ──┴──▶ Succeeded                        │
//!   ▲                 │                                              │
//!   │                 └──────────▶ Failed ──begin──▶ Submitting      │
//!   └────────────────────────────────┴───────────────────────────────┘
//! ```
//!
//! # Stale completions
//!
//! Every accept, clear and submission advances a generation counter. A [`Submission`] carries
//! the generation it was started with, and [`UploadWorkflow::complete_submission`] only applies
//! an outcome whose generation still matches the in-flight one. This lets callers release their
//! lock on the workflow while the request is outstanding: if the user clears or replaces the
//! artifact in the meantime, the late response is discarded instead of overwriting newer state.

use crate::analysis::AnalysisResult;
use crate::client::{AnalysisClient, AnalysisUpload};
use crate::{AnalysisError, XInsightError, XInsightResult};
use xinsight_files::{
    Artifact, CandidateFile, IntakePolicy, PreviewHandle, PreviewStore, ValidationError,
};

/// Submission controller state.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionState {
    Idle,
    Submitting { generation: u64 },
    Succeeded(Box<AnalysisResult>),
    Failed(AnalysisError),
}

impl SubmissionState {
    pub fn name(&self) -> &'static str {
        match self {
            SubmissionState::Idle => "idle",
            SubmissionState::Submitting { .. } => "submitting",
            SubmissionState::Succeeded(_) => "succeeded",
            SubmissionState::Failed(_) => "failed",
        }
    }
}

/// Result of offering a selection to intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeOutcome {
    Accepted,
    /// The selection contained no files; nothing changed
    NoSelection,
}

/// Result of handing a response back to the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    Applied,
    /// The artifact was cleared or replaced, or the submission was superseded
    Stale,
}

/// A started submission; pass it to the client and then back to `complete_submission`.
#[derive(Debug, Clone)]
pub struct Submission {
    generation: u64,
    upload: AnalysisUpload,
}

impl Submission {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn upload(&self) -> &AnalysisUpload {
        &self.upload
    }
}

#[derive(Debug)]
struct HeldArtifact {
    artifact: Artifact,
    preview: PreviewHandle,
}

#[derive(Debug)]
pub struct UploadWorkflow {
    policy: IntakePolicy,
    previews: PreviewStore,
    held: Option<HeldArtifact>,
    state: SubmissionState,
    rejection: Option<ValidationError>,
    generation: u64,
}

impl UploadWorkflow {
    pub fn new(policy: IntakePolicy, previews: PreviewStore) -> Self {
        Self {
            policy,
            previews,
            held: None,
            state: SubmissionState::Idle,
            rejection: None,
            generation: 0,
        }
    }

    /// Offers a drop or picker selection; only the first file is considered.
    ///
    /// On acceptance the held artifact is replaced (releasing the previous preview), any result
    /// and error are cleared and the controller returns to `Idle`. A rejected candidate leaves
    /// the held artifact and controller state untouched and is shown in the error region.
    ///
    /// # Errors
    ///
    /// - `XInsightError::Validation` if the candidate is rejected
    /// - `XInsightError::Files` if the preview cannot be written; nothing changes in that case
    pub fn accept_selection(
        &mut self,
        selection: impl IntoIterator<Item = CandidateFile>,
    ) -> XInsightResult<IntakeOutcome> {
        match selection.into_iter().next() {
            Some(candidate) => self.accept(candidate).map(|()| IntakeOutcome::Accepted),
            None => Ok(IntakeOutcome::NoSelection),
        }
    }

    /// Offers a single candidate. See [`Self::accept_selection`].
    pub fn accept(&mut self, candidate: CandidateFile) -> XInsightResult<()> {
        let artifact = match self.policy.admit(candidate) {
            Ok(artifact) => artifact,
            Err(rejection) => {
                tracing::info!("upload rejected: {}", rejection);
                self.rejection = Some(rejection.clone());
                return Err(XInsightError::Validation(rejection));
            }
        };

        let preview = self.previews.create(&artifact)?;

        tracing::info!(
            file_name = artifact.file_name(),
            media_type = artifact.media_type(),
            size_bytes = artifact.size_bytes(),
            sha256 = artifact.sha256(),
            "upload accepted"
        );

        // Dropping the previous holder releases its preview.
        self.held = Some(HeldArtifact { artifact, preview });
        self.state = SubmissionState::Idle;
        self.rejection = None;
        self.generation += 1;
        Ok(())
    }

    /// Discards the artifact, its preview, any result and any error.
    pub fn clear(&mut self) {
        if let Some(held) = self.held.take() {
            tracing::info!(file_name = held.artifact.file_name(), "upload cleared");
        }
        self.state = SubmissionState::Idle;
        self.rejection = None;
        self.generation += 1;
    }

    /// Whether the analyse trigger is available.
    pub fn can_submit(&self) -> bool {
        self.held.is_some()
            && matches!(
                self.state,
                SubmissionState::Idle | SubmissionState::Failed(_)
            )
    }

    /// Starts a submission if the trigger is available, otherwise returns `None`.
    pub fn begin_submission(&mut self) -> Option<Submission> {
        if !self.can_submit() {
            tracing::debug!(state = self.state.name(), "submission ignored");
            return None;
        }
        let held = self.held.as_ref()?;

        self.generation += 1;
        let generation = self.generation;
        let upload = AnalysisUpload {
            file_name: held.artifact.file_name().to_string(),
            media_type: held.artifact.media_type().to_string(),
            content: held.artifact.content().clone(),
        };
        self.state = SubmissionState::Submitting { generation };
        self.rejection = None;

        tracing::info!(generation, file_name = %upload.file_name, "submission started");
        Some(Submission { generation, upload })
    }

    /// Applies the outcome of a submission if it is still the one in flight.
    pub fn complete_submission(
        &mut self,
        generation: u64,
        outcome: Result<AnalysisResult, AnalysisError>,
    ) -> CompletionOutcome {
        let in_flight = matches!(
            self.state,
            SubmissionState::Submitting { generation: current } if current == generation
        );
        if !in_flight || self.held.is_none() {
            tracing::warn!(
                generation,
                current_generation = self.generation,
                state = self.state.name(),
                "discarding stale analysis response"
            );
            return CompletionOutcome::Stale;
        }

        self.state = match outcome {
            Ok(result) => {
                tracing::info!(
                    generation,
                    patient_status = %result.patient_status,
                    flagged = result.flagged_conditions.len(),
                    "analysis succeeded"
                );
                SubmissionState::Succeeded(Box::new(result))
            }
            Err(err) => {
                tracing::error!(generation, "analysis failed: {}", err);
                SubmissionState::Failed(err)
            }
        };
        CompletionOutcome::Applied
    }

    /// Runs one full submission against `client` while holding the workflow exclusively.
    ///
    /// Returns `None` when the trigger was not available. Dropping the future before the
    /// response arrives fails the submission as a network error, so the workflow never stays
    /// in `Submitting`.
    pub async fn submit<C>(&mut self, client: &C) -> Option<CompletionOutcome>
    where
        C: AnalysisClient + ?Sized,
    {
        let submission = self.begin_submission()?;
        let pending = PendingSubmission {
            workflow: self,
            generation: submission.generation(),
            settled: false,
        };
        let outcome = client.analyse(submission.upload()).await;
        Some(pending.settle(outcome))
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.held.as_ref().map(|h| &h.artifact)
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.held.as_ref().map(|h| &h.preview)
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match &self.state {
            SubmissionState::Succeeded(result) => Some(result.as_ref()),
            _ => None,
        }
    }

    pub fn rejection(&self) -> Option<&ValidationError> {
        self.rejection.as_ref()
    }

    /// Text for the error region: an intake rejection, or the generic analysis failure.
    pub fn error_message(&self) -> Option<String> {
        if let Some(rejection) = &self.rejection {
            return Some(rejection.to_string());
        }
        match &self.state {
            SubmissionState::Failed(err) => Some(err.user_message().to_string()),
            _ => None,
        }
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.state, SubmissionState::Submitting { .. })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn previews(&self) -> &PreviewStore {
        &self.previews
    }
}

/// Submission owned by [`UploadWorkflow::submit`] until its outcome is applied.
struct PendingSubmission<'a> {
    workflow: &'a mut UploadWorkflow,
    generation: u64,
    settled: bool,
}

impl PendingSubmission<'_> {
    fn settle(mut self, outcome: Result<AnalysisResult, AnalysisError>) -> CompletionOutcome {
        self.settled = true;
        self.workflow.complete_submission(self.generation, outcome)
    }
}

impl Drop for PendingSubmission<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(generation = self.generation, "submission dropped before completion");
            self.workflow.complete_submission(
                self.generation,
                Err(AnalysisError::Network("request cancelled".into())),
            );
        }
    }
}
