//! Acknowledgment HTTP API.
//!
//! Serves the pending-acknowledgment resolver, the recorder and the
//! completion statistics over JSON. Caller identity is asserted by the
//! upstream identity middleware in the `x-user-email` header; the caller's
//! role is always read from the local user record.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/acknowledgments/pending` | Documents the caller still has to acknowledge |
//! | `POST` | `/acknowledgments` | Acknowledge one document (`201` created, `200` existing) |
//! | `POST` | `/acknowledgments/bulk` | Acknowledge several documents, or everything pending |
//! | `GET`  | `/acknowledgments/stats` | Completion statistics (ADMIN/EDITOR) |
//! | `GET`  | `/acknowledgments/document/{document_id}` | Paginated per-document detail (ADMIN/EDITOR) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "documentId must be a valid UUID", "fields": ["documentId"] } }
//! ```
//!
//! Error codes: `bad_request` (400), `invalid_state` (400), `unauthenticated` (401),
//! `forbidden` (403), `not_found` (404), `internal` (500).
//!
//! Internal failures are logged with the operation, caller and document id
//! and answered with a generic per-endpoint message. The underlying error
//! text is appended only when `server.expose_error_details` is set.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use grc_ack_core::pending::{pending_documents, PendingDocument};
use grc_ack_core::recorder::{acknowledge, acknowledge_bulk, AckOutcome, BulkOutcome};
use grc_ack_core::stats::{
    completion_stats, document_detail, DocumentDetail, PageRequest, StatsAccess, StatsFilter,
    StatsReport,
};
use grc_ack_core::store::AckStore;
use grc_ack_core::{AckError, Caller};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Header carrying the authenticated caller's email.
pub const CALLER_HEADER: &str = "x-user-email";

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn AckStore>,
    config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn AckStore>, config: Arc<Config>) -> Self {
        Self { store, config }
    }
}

/// Build the router over any [`AckStore`].
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/acknowledgments", post(handle_acknowledge))
        .route("/acknowledgments/pending", get(handle_pending))
        .route("/acknowledgments/bulk", post(handle_bulk))
        .route("/acknowledgments/stats", get(handle_stats))
        .route(
            "/acknowledgments/document/{document_id}",
            get(handle_document_detail),
        )
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind`.
///
/// Opens the database pool, serves until Ctrl-C, then closes the pool.
/// The schema must already exist (`grcack init`).
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    let store = Arc::new(SqliteStore::new(pool.clone()));
    let state = AppState::new(store, Arc::new(config.clone()));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "acknowledgment API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<String>,
}

/// Error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    fields: Vec<String>,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        AppError {
            status,
            code,
            message: message.into(),
            fields: Vec::new(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                fields: self.fields,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>, fields: Vec<String>) -> AppError {
    AppError {
        fields,
        ..AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }
}

/// One endpoint's identity for logging and its generic failure message.
struct Operation {
    name: &'static str,
    failure: &'static str,
}

const PENDING: Operation = Operation {
    name: "pending",
    failure: "Failed to fetch pending acknowledgments",
};
const ACKNOWLEDGE: Operation = Operation {
    name: "acknowledge",
    failure: "Failed to create acknowledgment",
};
const BULK: Operation = Operation {
    name: "acknowledge_bulk",
    failure: "Failed to create acknowledgments",
};
const STATS: Operation = Operation {
    name: "stats",
    failure: "Failed to fetch acknowledgment statistics",
};
const DETAIL: Operation = Operation {
    name: "document_detail",
    failure: "Failed to fetch document acknowledgment details",
};

/// Per-request context attached to failures.
struct RequestContext<'a> {
    state: &'a AppState,
    op: &'static Operation,
    caller: Option<&'a Caller>,
    document_id: Option<&'a str>,
}

impl RequestContext<'_> {
    fn fail(&self, err: AckError) -> AppError {
        match err {
            AckError::InvalidInput { message, fields } => bad_request(message, fields),
            AckError::Unauthenticated => AppError::new(
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "Authentication required",
            ),
            AckError::Forbidden { reason } => {
                tracing::debug!(
                    operation = self.op.name,
                    caller = ?self.caller.map(Caller::email),
                    %reason,
                    "access denied"
                );
                AppError::new(StatusCode::FORBIDDEN, "forbidden", "Insufficient permissions")
            }
            AckError::NotFound { entity, .. } => AppError::new(
                StatusCode::NOT_FOUND,
                "not_found",
                format!("{} not found", capitalize(entity)),
            ),
            AckError::InvalidState { reason } => {
                AppError::new(StatusCode::BAD_REQUEST, "invalid_state", reason)
            }
            AckError::Internal(e) => {
                tracing::error!(
                    operation = self.op.name,
                    caller = ?self.caller.map(Caller::email),
                    document_id = ?self.document_id,
                    error = ?e,
                    "request failed"
                );
                let message = if self.state.config.server.expose_error_details {
                    format!("{}: {:#}", self.op.failure, e)
                } else {
                    self.op.failure.to_string()
                };
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
            }
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn caller_from(headers: &HeaderMap) -> Result<Caller, AppError> {
    let raw = headers
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    Caller::new(raw).map_err(|_| {
        AppError::new(
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            "Authentication required",
        )
    })
}

/// Parse a JSON body, treating an empty body as `{}`.
fn parse_body<T: for<'de> Deserialize<'de> + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| bad_request(format!("Invalid request body: {}", e), Vec::new()))
}

/// Lenient integer query parameter: anything unparseable is treated as absent.
fn query_int(params: &HashMap<String, String>, key: &str) -> Option<i64> {
    params.get(key).and_then(|v| v.trim().parse().ok())
}

fn query_flag(params: &HashMap<String, String>, key: &str) -> bool {
    matches!(
        params.get(key).map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true") | Some("1")
    )
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ GET /acknowledgments/pending ============

async fn handle_pending(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<PendingDocument>>, AppError> {
    let caller = caller_from(&headers)?;
    let ctx = RequestContext {
        state: &state,
        op: &PENDING,
        caller: Some(&caller),
        document_id: None,
    };

    let pending = pending_documents(state.store.as_ref(), &caller)
        .await
        .map_err(|e| ctx.fail(e))?;
    Ok(Json(pending))
}

// ============ POST /acknowledgments ============

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcknowledgeRequest {
    document_id: Option<String>,
}

/// Returns `201` with the new record, or `200` with the record already on
/// file for the document's current version.
async fn handle_acknowledge(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let caller = caller_from(&headers)?;
    let request: AcknowledgeRequest = parse_body(&body)?;
    let document_id = request.document_id.unwrap_or_default();

    let ctx = RequestContext {
        state: &state,
        op: &ACKNOWLEDGE,
        caller: Some(&caller),
        document_id: Some(document_id.as_str()),
    };

    let outcome = acknowledge(state.store.as_ref(), &caller, &document_id)
        .await
        .map_err(|e| ctx.fail(e))?;

    let status = match &outcome {
        AckOutcome::Created(record) => {
            tracing::info!(
                user_id = %record.user_id,
                document_id = %record.document_id,
                version = %record.document_version,
                "acknowledgment recorded"
            );
            StatusCode::CREATED
        }
        AckOutcome::Existing(_) => StatusCode::OK,
    };
    Ok((status, Json(outcome.into_record())).into_response())
}

// ============ POST /acknowledgments/bulk ============

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkRequest {
    document_ids: Option<Vec<String>>,
}

async fn handle_bulk(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<BulkOutcome>, AppError> {
    let caller = caller_from(&headers)?;
    let request: BulkRequest = parse_body(&body)?;
    let ctx = RequestContext {
        state: &state,
        op: &BULK,
        caller: Some(&caller),
        document_id: None,
    };

    let outcome = acknowledge_bulk(
        state.store.as_ref(),
        &caller,
        request.document_ids.as_deref(),
    )
    .await
    .map_err(|e| ctx.fail(e))?;

    tracing::info!(
        caller = caller.email(),
        acknowledged = outcome.acknowledged,
        created = outcome.created,
        "bulk acknowledgment"
    );
    Ok(Json(outcome))
}

// ============ GET /acknowledgments/stats ============

async fn handle_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<StatsReport>, AppError> {
    let caller = caller_from(&headers)?;
    let document_id = params
        .get("documentId")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let ctx = RequestContext {
        state: &state,
        op: &STATS,
        caller: Some(&caller),
        document_id: document_id.as_deref(),
    };

    let access = StatsAccess::for_caller(state.store.as_ref(), &caller)
        .await
        .map_err(|e| ctx.fail(e))?;

    let filter = StatsFilter {
        document_id: document_id.clone(),
        limit: query_int(&params, "limit").map(|n| n.clamp(1, u32::MAX as i64) as u32),
        include_users: query_flag(&params, "includeUsers"),
    };

    let report = completion_stats(state.store.as_ref(), &access, &filter)
        .await
        .map_err(|e| ctx.fail(e))?;
    Ok(Json(report))
}

// ============ GET /acknowledgments/document/{document_id} ============

async fn handle_document_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<DocumentDetail>, AppError> {
    let caller = caller_from(&headers)?;
    let ctx = RequestContext {
        state: &state,
        op: &DETAIL,
        caller: Some(&caller),
        document_id: Some(document_id.as_str()),
    };

    let access = StatsAccess::for_caller(state.store.as_ref(), &caller)
        .await
        .map_err(|e| ctx.fail(e))?;

    let page = PageRequest::with_default(
        query_int(&params, "page"),
        query_int(&params, "pageSize"),
        state.config.stats.default_page_size,
    );

    let detail = document_detail(state.store.as_ref(), &access, &document_id, page)
        .await
        .map_err(|e| ctx.fail(e))?;
    Ok(Json(detail))
}
