use crate::constants::ANALYSIS_FAILED_MESSAGE;
use xinsight_files::{FilesError, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum XInsightError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("file storage error: {0}")]
    Files(#[from] FilesError),
}

pub type XInsightResult<T> = std::result::Result<T, XInsightError>;

/// Why an analysis attempt failed.
///
/// Every variant is shown to the user as the same generic message; the variants exist for
/// logging and for callers that want to distinguish a timeout from an HTTP error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("could not reach the analysis service: {0}")]
    Network(String),
    #[error("analysis request timed out")]
    Timeout,
    #[error("analysis service responded with HTTP {0}")]
    Status(u16),
    #[error("analysis response could not be parsed: {0}")]
    MalformedPayload(String),
}

impl AnalysisError {
    pub fn user_message(&self) -> &'static str {
        ANALYSIS_FAILED_MESSAGE
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid credentials. Please try again.")]
    InvalidCredentials,
    #[error("not signed in")]
    NotSignedIn,
    #[error("this page requires the {required} role")]
    WrongRole { required: crate::session::Role },
    #[error("failed to read session file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write session file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to remove session file: {0}")]
    FileRemove(std::io::Error),
    #[error("failed to serialize session: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize session: {0}")]
    Deserialization(serde_json::Error),
}
