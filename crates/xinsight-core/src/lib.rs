//! # X-Insight Core
//!
//! Core logic for the X-Insight upload-and-analysis workflow.
//!
//! This crate contains:
//! - The upload workflow state machine with its stale-response guard ([`workflow`])
//! - The HTTP client for the inference service ([`client`])
//! - The analysis result model and its presentation ([`analysis`], [`render`], [`markdown`])
//! - Session identity and role portals ([`session`], [`portal`])
//!
//! **No API concerns**: HTTP servers and command-line parsing belong in `xinsight-api-rest` and
//! `xinsight-cli`. File intake rules and preview storage live in `xinsight-files`.

pub mod analysis;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod markdown;
pub mod portal;
pub mod render;
pub mod session;
pub mod workflow;

pub use analysis::{AnalysisResult, FlaggedCondition, HeatmapImage, PatientStatus};
pub use client::{AnalysisClient, AnalysisUpload, HttpAnalysisClient};
pub use config::CoreConfig;
pub use error::{AnalysisError, SessionError, XInsightError, XInsightResult};
pub use render::{render, render_result, PageView};
pub use session::{Role, Session, SessionStore, User, UserDirectory};
pub use workflow::{CompletionOutcome, IntakeOutcome, SubmissionState, UploadWorkflow};

pub use xinsight_files::{Artifact, CandidateFile, IntakePolicy, PreviewStore, ValidationError};
