//! Outbound call to the inference service.
//!
//! [`AnalysisClient`] is the seam between the workflow and the network so the workflow can be
//! driven by the real HTTP client in the binaries and by in-process fakes in tests.

use crate::analysis::AnalysisResult;
use crate::config::CoreConfig;
use crate::constants::ANALYSIS_UPLOAD_FIELD;
use crate::AnalysisError;
use std::sync::Arc;
use std::time::Duration;

/// What a submission sends: the held artifact's bytes with its name and media type.
#[derive(Debug, Clone)]
pub struct AnalysisUpload {
    pub file_name: String,
    pub media_type: String,
    pub content: Arc<[u8]>,
}

#[async_trait::async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Sends one upload and returns the parsed result.
    ///
    /// Implementations must not retry; a failure is final for that attempt.
    async fn analyse(&self, upload: &AnalysisUpload) -> Result<AnalysisResult, AnalysisError>;
}

/// `reqwest` implementation posting a multipart form to `<base>/predict`.
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpAnalysisClient {
    /// Builds a client for the configured endpoint and optional timeout.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::Network` if the underlying HTTP client cannot be constructed
    /// (for example when the TLS backend fails to initialise).
    pub fn new(cfg: &CoreConfig) -> Result<Self, AnalysisError> {
        Self::with_endpoint(cfg.analysis_url(), cfg.analysis_timeout())
    }

    pub fn with_endpoint(
        endpoint: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, AnalysisError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| AnalysisError::Network(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn classify(err: reqwest::Error) -> AnalysisError {
    if err.is_timeout() {
        AnalysisError::Timeout
    } else if let Some(status) = err.status() {
        AnalysisError::Status(status.as_u16())
    } else {
        AnalysisError::Network(err.to_string())
    }
}

#[async_trait::async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn analyse(&self, upload: &AnalysisUpload) -> Result<AnalysisResult, AnalysisError> {
        let part = reqwest::multipart::Part::bytes(upload.content.to_vec())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.media_type)
            .map_err(|e| AnalysisError::Network(format!("invalid media type: {e}")))?;
        let form = reqwest::multipart::Form::new().part(ANALYSIS_UPLOAD_FIELD, part);

        tracing::info!(
            endpoint = %self.endpoint,
            file_name = %upload.file_name,
            size_bytes = upload.content.len(),
            "submitting analysis request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(classify)?;
        AnalysisResult::from_json_slice(&body)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analysis::tests::sample_payload;
    use axum::extract::Multipart;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::net::SocketAddr;

    /// Starts an axum app on an ephemeral port and returns its `/predict` URL.
    pub(crate) async fn spawn_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr: SocketAddr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server");
        });
        format!("http://{addr}/predict")
    }

    pub(crate) fn upload() -> AnalysisUpload {
        AnalysisUpload {
            file_name: "chest.png".into(),
            media_type: "image/png".into(),
            content: Arc::from(vec![0x89, b'P', b'N', b'G']),
        }
    }

    async fn echo_predict(mut multipart: Multipart) -> (StatusCode, Json<serde_json::Value>) {
        let mut payload = sample_payload();
        while let Ok(Some(field)) = multipart.next_field().await {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field.bytes().await.unwrap_or_default();
            if name == ANALYSIS_UPLOAD_FIELD {
                payload["report_text"] = serde_json::json!(format!(
                    "{file_name}|{content_type}|{}",
                    bytes.len()
                ));
            }
        }
        (StatusCode::OK, Json(payload))
    }

    #[tokio::test]
    async fn test_posts_multipart_file_field() {
        let url = spawn_server(Router::new().route("/predict", post(echo_predict))).await;
        let client = HttpAnalysisClient::with_endpoint(url, None).unwrap();

        let result = client.analyse(&upload()).await.expect("analysis should succeed");

        assert_eq!(result.report_text, "chest.png|image/png|4");
        assert_eq!(result.flagged_conditions.len(), 1);
    }

    #[tokio::test]
    async fn test_server_error_is_status_error() {
        let app = Router::new().route(
            "/predict",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({"error": "Vision model is not loaded."})),
                )
            }),
        );
        let url = spawn_server(app).await;
        let client = HttpAnalysisClient::with_endpoint(url, None).unwrap();

        let err = client.analyse(&upload()).await.unwrap_err();
        assert_eq!(err, AnalysisError::Status(500));
    }

    #[tokio::test]
    async fn test_malformed_body_is_reported() {
        let app = Router::new().route("/predict", post(|| async { "not json" }));
        let url = spawn_server(app).await;
        let client = HttpAnalysisClient::with_endpoint(url, None).unwrap();

        let err = client.analyse(&upload()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_error() {
        // Bind then drop a listener so the port is very likely closed
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            HttpAnalysisClient::with_endpoint(format!("http://{addr}/predict"), None).unwrap();
        let err = client.analyse(&upload()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Network(_)));
    }

    #[tokio::test]
    async fn test_slow_service_times_out() {
        let app = Router::new().route(
            "/predict",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(sample_payload())
            }),
        );
        let url = spawn_server(app).await;
        let client =
            HttpAnalysisClient::with_endpoint(url, Some(Duration::from_millis(200))).unwrap();

        let err = client.analyse(&upload()).await.unwrap_err();
        assert_eq!(err, AnalysisError::Timeout);
    }
}
