//! Route table and request handlers.
//!
//! Handlers translate HTTP into [`ImageLab`] calls. Every lab call blocks
//! on disk and image work, so it runs on tokio's blocking pool. The
//! session is identified by an `HttpOnly` cookie set on upload.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use imagelab_session::lab::{DOWNLOAD_ROUTE, FILES_ROUTE};
use imagelab_session::{ImageLab, LabError, SessionId, SessionView};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "imagelab_session";

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "image";

/// Form field naming the operation in `/process`.
pub const OPERATION_FIELD: &str = "operation";

/// Slack on top of the upload limit for multipart framing.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared handler state.
pub type AppState = Arc<ImageLab>;

/// Build the application router.
pub fn router(lab: AppState) -> Router {
    let upload_limit = lab.max_upload_bytes().saturating_add(MULTIPART_OVERHEAD);
    Router::new()
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/process", post(process))
        .route("/undo", post(undo))
        .route("/reset", post(reset))
        .route("/clear", post(clear))
        .route("/session", get(session))
        .route(&format!("{FILES_ROUTE}/{{filename}}"), get(file))
        .route(&format!("{DOWNLOAD_ROUTE}/{{filename}}"), get(download))
        .layer(TraceLayer::new_for_http())
        .with_state(lab)
}

#[derive(Debug, Serialize)]
struct UndoResponse {
    #[serde(flatten)]
    view: SessionView,
    undone_operation: String,
}

async fn upload(
    State(lab): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let previous = session_id(&headers);
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_owned();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some((file_name, bytes));
    }
    let (file_name, bytes) = upload
        .ok_or_else(|| ApiError::BadRequest(format!("missing `{UPLOAD_FIELD}` file field")))?;

    let (id, view) = blocking(move || lab.upload(previous, &file_name, &bytes)).await?;
    let cookie = session_cookie(id)?;
    Ok(([(header::SET_COOKIE, cookie)], Json(view)).into_response())
}

async fn process(
    State(lab): State<AppState>,
    headers: HeaderMap,
    Form(mut fields): Form<HashMap<String, String>>,
) -> Result<Json<SessionView>, ApiError> {
    let id = require_session(&headers)?;
    let operation = fields
        .remove(OPERATION_FIELD)
        .ok_or_else(|| ApiError::BadRequest(format!("missing `{OPERATION_FIELD}` field")))?;
    let view = blocking(move || lab.process(id, &operation, &fields)).await?;
    Ok(Json(view))
}

async fn undo(
    State(lab): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UndoResponse>, ApiError> {
    let id = require_session(&headers)?;
    let (view, undone_operation) = blocking(move || lab.undo(id)).await?;
    Ok(Json(UndoResponse {
        view,
        undone_operation,
    }))
}

async fn reset(
    State(lab): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionView>, ApiError> {
    let id = require_session(&headers)?;
    Ok(Json(blocking(move || lab.reset(id)).await?))
}

async fn clear(State(lab): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    if let Some(id) = session_id(&headers) {
        match blocking(move || lab.clear(id)).await {
            Ok(()) | Err(ApiError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }
    }
    let expired = HeaderValue::from_static(
        "imagelab_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
    );
    Ok((StatusCode::OK, [(header::SET_COOKIE, expired)]).into_response())
}

async fn session(
    State(lab): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionView>, ApiError> {
    let id = require_session(&headers)?;
    Ok(Json(blocking(move || lab.view(id)).await?))
}

async fn file(
    State(lab): State<AppState>,
    headers: HeaderMap,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    serve_file(lab, &headers, filename, false).await
}

async fn download(
    State(lab): State<AppState>,
    headers: HeaderMap,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    serve_file(lab, &headers, filename, true).await
}

async fn serve_file(
    lab: AppState,
    headers: &HeaderMap,
    filename: String,
    attachment: bool,
) -> Result<Response, ApiError> {
    let id = require_session(headers)?;
    let resolved = blocking(move || lab.resolve_file(id, &filename)).await?;
    let bytes = tokio::fs::read(&resolved.path).await.map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            ApiError::NotFound("file not found".into())
        } else {
            ApiError::Internal(format!("reading {}: {err}", resolved.name))
        }
    })?;

    let disposition = if attachment {
        format!("attachment; filename=\"{}\"", resolved.name)
    } else {
        "inline".to_owned()
    };
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|err| ApiError::Internal(format!("content disposition: {err}")))?;

    let mut response = bytes.into_response();
    let response_headers = response.headers_mut();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(resolved.mime_type()),
    );
    response_headers.insert(header::CONTENT_DISPOSITION, disposition);
    response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}

/// Run a lab call on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, LabError> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// The session id from the request cookies, if present and well formed.
fn session_id(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| value.parse().ok())
}

fn require_session(headers: &HeaderMap) -> Result<SessionId, ApiError> {
    session_id(headers).ok_or_else(|| ApiError::NotFound("no active session".into()))
}

fn session_cookie(id: SessionId) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax"
    ))
    .map_err(|err| ApiError::Internal(format!("session cookie: {err}")))
}
