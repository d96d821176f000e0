//! Request routing
//!
//! | Method | Path             | Body            | Success               |
//! |--------|------------------|-----------------|-----------------------|
//! | GET    | `/health`        | -               | `{"status":"ok"}`     |
//! | POST   | `/sync/chunk`    | `ChunkRequest`  | `ChunkResponse`       |
//! | POST   | `/enrich/batch`  | `EnrichRequest` | `EnrichResult`        |
//!
//! Failures answer `{"success": false, "error": "..."}` with 400 for a
//! malformed body or an unusable page number, 401 when the user must reconnect, 503 when enrichment
//! is not configured and 500 for store failures.

use hyper::body::Bytes;
use hyper::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, warn};

use ledgersync_enrich::EnrichError;
use ledgersync_sync::{ChunkRequest, SyncError};

use crate::state::AppState;

/// Body of `POST /enrich/batch`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnrichRequest {
    /// Row id after which to continue; 0 starts from the beginning
    pub cursor: Option<i64>,
    pub batch_size: Option<u32>,
}

/// Status and JSON body of a response
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

impl Reply {
    fn ok<T: Serialize>(body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self {
                status: StatusCode::OK,
                body,
            },
            Err(e) => Self::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }

    fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({"success": false, "error": message.into()}),
        }
    }
}

/// Parses a JSON body; an empty body is the default value
fn parse_body<T: for<'de> Deserialize<'de> + Default>(body: &Bytes) -> Result<T, Reply> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| Reply::error(StatusCode::BAD_REQUEST, format!("invalid request body: {e}")))
}

/// Dispatches one request
pub async fn route(state: &AppState, method: &Method, path: &str, body: Bytes) -> Reply {
    match (method, path) {
        (&Method::GET, "/health") => Reply::ok(&json!({"status": "ok"})),
        (&Method::POST, "/sync/chunk") => sync_chunk(state, body).await,
        (&Method::POST, "/enrich/batch") => enrich_batch(state, body).await,
        (_, "/health" | "/sync/chunk" | "/enrich/batch") => {
            Reply::error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
        }
        _ => Reply::error(StatusCode::NOT_FOUND, "not found"),
    }
}

async fn sync_chunk(state: &AppState, body: Bytes) -> Reply {
    let request: ChunkRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(reply) => return reply,
    };

    match state.orchestrator.run_chunk(&request).await {
        Ok(response) => Reply::ok(&response),
        Err(e @ SyncError::InvalidRequest(_)) => {
            Reply::error(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) if e.is_auth() => {
            warn!(error = %e, "Chunk rejected, reconnect required");
            Reply::error(StatusCode::UNAUTHORIZED, e.to_string())
        }
        Err(e) => {
            error!(error = %e, "Chunk failed");
            Reply::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn enrich_batch(state: &AppState, body: Bytes) -> Reply {
    let Some(pipeline) = &state.enrichment else {
        return Reply::error(
            StatusCode::SERVICE_UNAVAILABLE,
            "enrichment not configured; set OPENAI_API_KEY",
        );
    };
    let request: EnrichRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(reply) => return reply,
    };

    match pipeline
        .enrich_batch(request.cursor.unwrap_or(0), request.batch_size)
        .await
    {
        Ok(result) => Reply::ok(&result),
        Err(e @ EnrichError::NotConfigured(_)) => {
            Reply::error(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
        Err(e) => {
            error!(error = %e, "Enrichment batch failed");
            Reply::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
