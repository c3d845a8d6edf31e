use axum::{
    extract::{Multipart, Path as AxumPath, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use xinsight_core::portal::{portal_view, PortalView};
use xinsight_core::{
    render, CandidateFile, CompletionOutcome, PageView, Role, SessionError, User, XInsightError,
};

use crate::registry::{parse_token, SharedPageSession, SESSION_TOKEN_HEADER};
use crate::AppState;

#[derive(Serialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginReq {
    pub email: String,
    pub password: String,
    /// `patient`, `doctor` or `admin`
    pub role: String,
}

#[derive(Serialize, ToSchema)]
pub struct UserRes {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub avatar: String,
}

impl From<&User> for UserRes {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role.to_string(),
            avatar: user.avatar.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LoginRes {
    /// Send back in the `x-session-token` header
    pub token: String,
    pub user: UserRes,
    pub greeting: String,
    pub portal_path: String,
}

#[derive(Serialize, ToSchema)]
pub struct SessionRes {
    pub user: UserRes,
    pub greeting: String,
    pub portal_path: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

/// Multipart form accepted by `POST /upload`; only the first part is read.
#[derive(ToSchema)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PortalQuery {
    /// Tab to open; unknown tabs fall back to the first
    pub tab: Option<String>,
}

/// Error response carrying a status and a JSON `{ "error": ... }` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorRes {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let status = match err {
            SessionError::InvalidCredentials | SessionError::NotSignedIn => {
                StatusCode::UNAUTHORIZED
            }
            SessionError::WrongRole { .. } => StatusCode::FORBIDDEN,
            _ => {
                tracing::error!("session error: {:?}", err);
                return ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal error");
            }
        };
        ApiError::new(status, err.to_string())
    }
}

impl From<XInsightError> for ApiError {
    fn from(err: XInsightError) -> Self {
        match err {
            XInsightError::Validation(rejection) => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, rejection.to_string())
            }
            XInsightError::Session(err) => err.into(),
            other => {
                tracing::error!("request failed: {:?}", other);
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
            }
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Looks up the page session named by the `x-session-token` header.
async fn page_session(state: &AppState, headers: &HeaderMap) -> ApiResult<SharedPageSession> {
    let value = headers
        .get(SESSION_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    let token = parse_token(value)?;
    state
        .registry
        .get(&token)
        .await
        .ok_or_else(|| SessionError::NotSignedIn.into())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
pub async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "X-Insight REST API is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/session",
    request_body = LoginReq,
    responses(
        (status = 200, description = "Signed in", body = LoginRes),
        (status = 400, description = "Unknown role", body = ErrorRes),
        (status = 401, description = "Invalid credentials", body = ErrorRes)
    )
)]
/// Sign in and open a page session
///
/// The returned token identifies the page session; it owns one upload workflow.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginReq>,
) -> ApiResult<Json<LoginRes>> {
    let role: Role = req
        .role
        .parse()
        .map_err(|e: String| ApiError::new(StatusCode::BAD_REQUEST, e))?;
    let (token, user) = state
        .registry
        .login(&req.email, &req.password, role)
        .await?;

    Ok(Json(LoginRes {
        token: token.to_string(),
        greeting: user.greeting(),
        portal_path: user.role.portal_path().to_string(),
        user: UserRes::from(&user),
    }))
}

#[utoipa::path(
    get,
    path = "/session",
    params(("x-session-token" = String, Header, description = "Page session token")),
    responses(
        (status = 200, description = "Current user", body = SessionRes),
        (status = 401, description = "Not signed in", body = ErrorRes)
    )
)]
/// Current user with greeting text and portal path.
#[axum::debug_handler]
pub async fn current_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<SessionRes>> {
    let page = page_session(&state, &headers).await?;
    let page = page.lock().await;
    Ok(Json(SessionRes {
        user: UserRes::from(&page.user),
        greeting: page.user.greeting(),
        portal_path: page.user.role.portal_path().to_string(),
    }))
}

#[utoipa::path(
    delete,
    path = "/session",
    params(("x-session-token" = String, Header, description = "Page session token")),
    responses(
        (status = 204, description = "Signed out"),
        (status = 401, description = "Not signed in", body = ErrorRes)
    )
)]
/// Sign out
///
/// Tears the page session down, releasing any held upload and its preview.
#[axum::debug_handler]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<StatusCode> {
    let value = headers
        .get(SESSION_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    let token = parse_token(value)?;
    if state.registry.logout(&token).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(SessionError::NotSignedIn.into())
    }
}

#[utoipa::path(
    get,
    path = "/portal/{role}",
    params(
        ("role" = String, Path, description = "patient, doctor or admin"),
        ("x-session-token" = String, Header, description = "Page session token"),
        PortalQuery
    ),
    responses(
        (status = 200, description = "Portal landing page"),
        (status = 401, description = "Not signed in", body = ErrorRes),
        (status = 403, description = "Signed in with a different role", body = ErrorRes),
        (status = 404, description = "Unknown portal", body = ErrorRes)
    )
)]
/// Portal landing page for a role
///
/// Only the signed-in user's own role portal is reachable.
#[axum::debug_handler]
pub async fn portal(
    State(state): State<AppState>,
    AxumPath(role): AxumPath<String>,
    Query(query): Query<PortalQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<PortalView>> {
    let role: Role = role
        .parse()
        .map_err(|e: String| ApiError::new(StatusCode::NOT_FOUND, e))?;
    let page = page_session(&state, &headers).await?;
    let page = page.lock().await;
    if page.user.role != role {
        return Err(SessionError::WrongRole { required: role }.into());
    }
    Ok(Json(portal_view(&page.user, query.tab.as_deref())))
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    params(("x-session-token" = String, Header, description = "Page session token")),
    responses(
        (status = 200, description = "Rendered page after intake"),
        (status = 401, description = "Not signed in", body = ErrorRes),
        (status = 422, description = "Unsupported, empty or too large file", body = ErrorRes)
    )
)]
/// Offer a file to intake
///
/// The first multipart part is the candidate. Its filename and content type are taken from the
/// part headers. A rejected file leaves any held upload untouched; an empty form is a no-op.
#[axum::debug_handler]
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Json<PageView>> {
    let page = page_session(&state, &headers).await?;

    let field = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
    let candidate = match field {
        Some(field) => {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let declared_type = field.content_type().map(str::to_string);
            let content = field
                .bytes()
                .await
                .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
            Some(CandidateFile::new(file_name, declared_type, content.to_vec()))
        }
        None => None,
    };

    let mut page = page.lock().await;
    page.workflow.accept_selection(candidate)?;
    Ok(Json(render(&page.workflow)))
}

#[utoipa::path(
    delete,
    path = "/upload",
    params(("x-session-token" = String, Header, description = "Page session token")),
    responses(
        (status = 200, description = "Rendered empty page"),
        (status = 401, description = "Not signed in", body = ErrorRes)
    )
)]
/// Clear the held upload, its preview, any result and any error.
#[axum::debug_handler]
pub async fn clear_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<PageView>> {
    let page = page_session(&state, &headers).await?;
    let mut page = page.lock().await;
    page.workflow.clear();
    Ok(Json(render(&page.workflow)))
}

#[utoipa::path(
    get,
    path = "/upload/preview",
    params(("x-session-token" = String, Header, description = "Page session token")),
    responses(
        (status = 200, description = "Preview bytes with the upload's media type"),
        (status = 401, description = "Not signed in", body = ErrorRes),
        (status = 404, description = "No upload held", body = ErrorRes)
    )
)]
/// Local preview of the held upload.
#[axum::debug_handler]
pub async fn preview(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    let page = page_session(&state, &headers).await?;
    let page = page.lock().await;
    let preview = page
        .workflow
        .preview()
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "No file selected"))?;
    let bytes = preview.read().map_err(XInsightError::from)?;
    Ok(([(header::CONTENT_TYPE, preview.media_type().to_string())], bytes).into_response())
}

#[utoipa::path(
    post,
    path = "/analysis",
    params(("x-session-token" = String, Header, description = "Page session token")),
    responses(
        (status = 200, description = "Rendered page after the analysis completed or failed"),
        (status = 401, description = "Not signed in", body = ErrorRes),
        (status = 409, description = "No upload held or an analysis is already running", body = ErrorRes)
    )
)]
/// Submit the held upload for analysis and wait for the outcome
///
/// The page session is unlocked while the request is in flight, so the upload can be cleared
/// or replaced meanwhile. In that case the late response is discarded and the current page is
/// returned.
///
/// The request and its completion run on their own task. If the caller goes away, the outcome
/// is still applied to the page session and shows up on the next `/view`.
#[axum::debug_handler]
pub async fn analyse(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<PageView>> {
    let page = page_session(&state, &headers).await?;

    let submission = page.lock().await.workflow.begin_submission().ok_or_else(|| {
        ApiError::new(
            StatusCode::CONFLICT,
            "Analysis is not available: select a file first or wait for the running analysis",
        )
    })?;

    let client = state.client.clone();
    let task = tokio::spawn(async move {
        let outcome = client.analyse(submission.upload()).await;

        let mut page = page.lock().await;
        if page
            .workflow
            .complete_submission(submission.generation(), outcome)
            == CompletionOutcome::Stale
        {
            tracing::info!(
                generation = submission.generation(),
                "analysis response arrived after the upload changed"
            );
        }
        render(&page.workflow)
    });

    let view = task.await.map_err(|e| {
        tracing::error!("analysis task failed: {:?}", e);
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    })?;
    Ok(Json(view))
}

#[utoipa::path(
    get,
    path = "/view",
    params(("x-session-token" = String, Header, description = "Page session token")),
    responses(
        (status = 200, description = "Rendered page"),
        (status = 401, description = "Not signed in", body = ErrorRes)
    )
)]
/// Rendered upload panel, results panel and error region.
#[axum::debug_handler]
pub async fn view(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<PageView>> {
    let page = page_session(&state, &headers).await?;
    let page = page.lock().await;
    Ok(Json(render(&page.workflow)))
}
