use crate::sink::{SinkError, SinkRegistry};
use crate::source::{parse_with_format, strip_ansi, LogEntry, MessageFormat, ParseError};
use crate::web::auth::Credentials;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Shared state for the drain endpoints
pub struct DrainState {
    pub registry: Arc<SinkRegistry>,
    pub credentials: Credentials,
    pub message_format: MessageFormat,
    pub strip_ansi_codes: bool,
}

/// GET /
pub async fn health_check() -> &'static str {
    "OK"
}

/// GET /{tenant}
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// POST /
pub async fn missing_tenant() -> ApiError {
    ApiError::BadRequest("Request path must specify the log group name".to_string())
}

/// Any method other than GET and POST
pub async fn method_not_allowed() -> ApiError {
    ApiError::BadRequest("The only accepted request method is POST".to_string())
}

/// POST /{tenant}
///
/// The body holds newline-delimited framed records. All lines are parsed
/// before any is submitted, so a malformed line rejects the whole request.
pub async fn ingest(
    State(state): State<Arc<DrainState>>,
    Path(tenant): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    if tenant.is_empty() {
        return Err(ApiError::BadRequest(
            "Request path must specify the log group name".to_string(),
        ));
    }

    if !state.credentials.verify(&headers) {
        return Err(ApiError::Forbidden);
    }

    let entries = parse_body(&body, state.message_format, state.strip_ansi_codes)
        .map_err(|e| {
            warn!(tenant = %tenant, error = %e, "Rejecting request with unparseable line");
            ApiError::Parse(e)
        })?;

    // An empty body has nothing to deliver and must not start a sink
    if entries.is_empty() {
        return Ok(StatusCode::ACCEPTED);
    }

    let sink = state.registry.get(&tenant)?;
    let count = entries.len();
    for entry in entries {
        sink.submit(entry).await?;
    }

    debug!(tenant = %tenant, lines = count, "Accepted log lines");
    Ok(StatusCode::ACCEPTED)
}

/// Split a request body into lines and parse each one. A trailing newline does
/// not produce an extra line.
pub fn parse_body(
    body: &[u8],
    format: MessageFormat,
    strip_ansi_codes: bool,
) -> Result<Vec<LogEntry>, ParseError> {
    let body = body.strip_suffix(b"\n").unwrap_or(body);
    if body.is_empty() {
        return Ok(Vec::new());
    }

    body.split(|&byte| byte == b'\n')
        .map(|line| {
            let mut entry = parse_with_format(line, format)?;
            if strip_ansi_codes {
                entry.message = strip_ansi(&entry.message);
            }
            Ok(entry)
        })
        .collect()
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Forbidden,
    NotFound,
    Parse(ParseError),
    Unavailable(String),
}

impl From<SinkError> for ApiError {
    fn from(err: SinkError) -> Self {
        ApiError::Unavailable(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            ApiError::Parse(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("unable to parse message: {}", err),
            ),
            ApiError::Unavailable(msg) => {
                error!(error = %msg, "Sink unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
