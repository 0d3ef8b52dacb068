//! Snapshot endpoint: one route, dispatched on HTTP method.
//!
//! # Responsibility
//! - `OPTIONS` answers CORS pre-flight without touching storage.
//! - `GET` exports every registered table.
//! - `POST` restores every registered table from the request body.
//! - Any other method gets 405.
//!
//! # Invariants
//! - Every response carries the permissive CORS headers, including body
//!   rejections such as an oversized upload.
//! - Storage work runs on the blocking pool, never on the async workers.

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::{header, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use gearvault_core::{
    core_version, RestoreFailure, RestoreProgress, Snapshot, SnapshotBackend, SnapshotError,
    TablePhase,
};
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
const ALLOWED_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    backend: Arc<dyn SnapshotBackend>,
}

impl AppState {
    pub fn new(backend: Arc<dyn SnapshotBackend>) -> Self {
        Self { backend }
    }
}

#[derive(Debug, Serialize)]
struct RestoreBody<'a> {
    success: bool,
    #[serde(flatten)]
    progress: &'a RestoreProgress,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    table: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phase: Option<TablePhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rolled_back: Option<bool>,
    #[serde(flatten)]
    progress: Option<&'a RestoreProgress>,
}

impl<'a> ErrorBody<'a> {
    fn from_error(err: &'a SnapshotError) -> Self {
        let context = err.table_context();
        Self {
            error: err.to_string(),
            table: context.map(|(table, _)| table),
            phase: context.map(|(_, phase)| phase),
            rolled_back: None,
            progress: None,
        }
    }

    fn from_failure(failure: &'a RestoreFailure) -> Self {
        Self {
            error: failure.to_string(),
            rolled_back: Some(failure.rolled_back),
            progress: Some(&failure.progress),
            ..Self::from_error(&failure.error)
        }
    }

    fn message(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            table: None,
            phase: None,
            rolled_back: None,
            progress: None,
        }
    }
}

fn cors_headers() -> [(HeaderName, &'static str); 3] {
    [
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        (header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOWED_HEADERS),
        (header::ACCESS_CONTROL_ALLOW_METHODS, ALLOWED_METHODS),
    ]
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    (status, cors_headers(), Json(body)).into_response()
}

fn status_for(err: &SnapshotError) -> StatusCode {
    match err {
        SnapshotError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
        SnapshotError::Connectivity(_)
        | SnapshotError::TableOperation { .. }
        | SnapshotError::Transaction(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Single snapshot endpoint.
pub async fn snapshot_endpoint(
    State(state): State<AppState>,
    method: Method,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let request_id = Uuid::new_v4();
    let started_at = Instant::now();
    info!("event=http_request module=server status=start request_id={request_id} method={method}");

    let response = match method {
        Method::OPTIONS => (StatusCode::OK, cors_headers()).into_response(),
        Method::GET => export(&state, request_id).await,
        Method::POST => restore(&state, body, request_id).await,
        _ => {
            warn!(
                "event=http_request module=server status=rejected request_id={request_id} method={method} error_code=method_not_allowed"
            );
            (
                StatusCode::METHOD_NOT_ALLOWED,
                cors_headers(),
                [(header::ALLOW, ALLOWED_METHODS)],
                "Method not allowed",
            )
                .into_response()
        }
    };

    info!(
        "event=http_request module=server status=ok request_id={request_id} method={method} http_status={} duration_ms={}",
        response.status().as_u16(),
        started_at.elapsed().as_millis()
    );
    response
}

/// Liveness check; never touches storage.
pub async fn health() -> Response {
    json_response(
        StatusCode::OK,
        serde_json::json!({"status": "ok", "version": core_version()}),
    )
}

async fn export(state: &AppState, request_id: Uuid) -> Response {
    let backend = Arc::clone(&state.backend);
    match tokio::task::spawn_blocking(move || backend.export_all()).await {
        Ok(Ok(snapshot)) => json_response(StatusCode::OK, snapshot),
        Ok(Err(err)) => {
            error!(
                "event=http_export module=server status=error request_id={request_id} error_code={} error={err}",
                err.code()
            );
            json_response(status_for(&err), ErrorBody::from_error(&err))
        }
        Err(join_err) => job_aborted(request_id, join_err),
    }
}

async fn restore(
    state: &AppState,
    body: Result<Bytes, BytesRejection>,
    request_id: Uuid,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!(
                "event=http_restore module=server status=rejected request_id={request_id} error_code=body_rejected http_status={}",
                rejection.status().as_u16()
            );
            return json_response(
                rejection.status(),
                ErrorBody::message(rejection.body_text()),
            );
        }
    };

    let snapshot = match Snapshot::from_json(&body) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            let err = SnapshotError::MalformedPayload(err.message().to_string());
            warn!(
                "event=http_restore module=server status=rejected request_id={request_id} error_code={} bytes={}",
                err.code(),
                body.len()
            );
            return json_response(status_for(&err), ErrorBody::from_error(&err));
        }
    };

    let backend = Arc::clone(&state.backend);
    match tokio::task::spawn_blocking(move || backend.restore_all(&snapshot)).await {
        Ok(Ok(progress)) => json_response(
            StatusCode::OK,
            RestoreBody {
                success: true,
                progress: &progress,
            },
        ),
        Ok(Err(failure)) => {
            error!(
                "event=http_restore module=server status=error request_id={request_id} error_code={} rolled_back={} error={}",
                failure.error.code(),
                failure.rolled_back,
                failure.error
            );
            json_response(
                status_for(&failure.error),
                ErrorBody::from_failure(&failure),
            )
        }
        Err(join_err) => job_aborted(request_id, join_err),
    }
}

fn job_aborted(request_id: Uuid, join_err: tokio::task::JoinError) -> Response {
    error!(
        "event=http_request module=server status=error request_id={request_id} error_code=job_aborted error={join_err}"
    );
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorBody::message(format!("snapshot job aborted: {join_err}")),
    )
}
