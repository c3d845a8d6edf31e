//! # API REST
//!
//! REST page shell for X-Insight.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - Page sessions: one signed-in user and one upload workflow per token
//!
//! Workflow logic lives in `xinsight-core`; this crate only maps it onto HTTP.

#![warn(rust_2018_idioms)]

mod handlers;
pub mod registry;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use xinsight_core::{AnalysisClient, CoreConfig, UserDirectory, XInsightResult};
use xinsight_files::PreviewStore;

pub use handlers::{ApiError, ErrorRes, HealthRes, LoginReq, LoginRes, SessionRes, UserRes};
pub use registry::{PageSession, SessionRegistry, SESSION_TOKEN_HEADER};

/// Multipart framing allowance on top of the intake size limit, so an oversized file reaches
/// intake and is reported as a validation error rather than a bare 413.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Application state shared by all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<CoreConfig>,
    pub client: Arc<dyn AnalysisClient>,
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    /// Builds the state, creating the preview directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `XInsightError::Files` if the preview directory cannot be created.
    pub fn new(cfg: Arc<CoreConfig>, client: Arc<dyn AnalysisClient>) -> XInsightResult<Self> {
        let previews = PreviewStore::new(cfg.preview_dir())?;
        let registry = SessionRegistry::new(UserDirectory::mock(), cfg.intake_policy(), previews);
        Ok(Self {
            cfg,
            client,
            registry: Arc::new(registry),
        })
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::login,
        handlers::current_session,
        handlers::logout,
        handlers::portal,
        handlers::upload,
        handlers::clear_upload,
        handlers::preview,
        handlers::analyse,
        handlers::view,
    ),
    components(schemas(
        handlers::HealthRes,
        handlers::LoginReq,
        handlers::LoginRes,
        handlers::SessionRes,
        handlers::UserRes,
        handlers::ErrorRes,
        handlers::UploadForm,
    ))
)]
pub struct ApiDoc;

/// Builds the page shell router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.cfg.max_upload_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/session",
            post(handlers::login)
                .get(handlers::current_session)
                .delete(handlers::logout),
        )
        .route("/portal/:role", get(handlers::portal))
        .route(
            "/upload",
            post(handlers::upload).delete(handlers::clear_upload),
        )
        .route("/upload/preview", get(handlers::preview))
        .route("/analysis", post(handlers::analyse))
        .route("/view", get(handlers::view))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds `addr` and serves the page shell until the server fails.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("++ X-Insight REST listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
