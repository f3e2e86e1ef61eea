//! SCORM player runtime endpoints
//!
//! Every call echoes the package version and date the page was rendered
//! with (`package_version`, `package_date`); those drive staleness checks.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

use scorm_common::time;

use crate::api::CurrentUser;
use crate::cmi::ProtocolVersion;
use crate::error::{ApiResult, Error, Result};
use crate::state::ScormStatus;
use crate::AppState;

pub const PACKAGE_VERSION: &str = "package_version";
pub const PACKAGE_DATE: &str = "package_date";

#[derive(Debug, Deserialize)]
pub struct GetValueRequest {
    pub name: Option<String>,
    pub package_version: Option<String>,
    pub package_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GetValueResponse {
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct CommitResponse {
    pub status: ScormStatus,
    pub score: f64,
}

/// POST /api/blocks/:block_id/scorm_get_value
///
/// **Request:** `{"name": "cmi.core.lesson_status", "package_version": "SCORM12", "package_date": "..."}`
/// **Response:** `{"value": "not attempted"}`
pub async fn scorm_get_value(
    State(state): State<AppState>,
    Path(block_id): Path<String>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<GetValueRequest>,
) -> ApiResult<Json<GetValueResponse>> {
    let name = request
        .name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::BadRequest("name is required".to_string()))?;
    let (version, client_package) =
        client_context(request.package_version.as_deref(), request.package_date.as_deref())?;

    let value = state
        .runtime
        .get_value(&user_id, &block_id, &name, version, client_package)
        .await?;

    Ok(Json(GetValueResponse { value }))
}

/// POST /api/blocks/:block_id/scorm_commit
///
/// **Request:** flat map of CMI elements plus `package_version`/`package_date`
/// **Response:** `{"status": "SUCCEEDED", "score": 0.8}`
pub async fn scorm_commit(
    State(state): State<AppState>,
    Path(block_id): Path<String>,
    CurrentUser(user_id): CurrentUser,
    Json(mut body): Json<Map<String, Value>>,
) -> ApiResult<Json<CommitResponse>> {
    let package_version = context_field(PACKAGE_VERSION, body.remove(PACKAGE_VERSION))?;
    let package_date = context_field(PACKAGE_DATE, body.remove(PACKAGE_DATE))?;
    let (version, client_package) =
        client_context(package_version.as_deref(), package_date.as_deref())?;

    let payload = body
        .into_iter()
        .map(|(element, value)| cmi_value(&element, value).map(|v| (element, v)))
        .collect::<Result<HashMap<String, String>>>()?;

    let outcome = state
        .runtime
        .commit(&user_id, &block_id, &payload, version, client_package)
        .await?;

    Ok(Json(CommitResponse {
        status: outcome.status,
        score: outcome.score,
    }))
}

/// GET /api/blocks/:block_id/ping
///
/// Called by the player on `Initialize` to check the handler is reachable.
pub async fn ping(Path(block_id): Path<String>) -> StatusCode {
    debug!(block_id = %block_id, "ping");
    StatusCode::OK
}

pub fn runtime_routes() -> Router<AppState> {
    Router::new()
        .route("/api/blocks/:block_id/scorm_get_value", post(scorm_get_value))
        .route("/api/blocks/:block_id/scorm_commit", post(scorm_commit))
        .route("/api/blocks/:block_id/ping", get(ping))
}

/// Protocol version and package date echoed by the player
fn client_context(
    version: Option<&str>,
    date: Option<&str>,
) -> Result<(ProtocolVersion, Option<DateTime<Utc>>)> {
    let version = version
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::BadRequest(format!("{} is required", PACKAGE_VERSION)))?
        .parse::<ProtocolVersion>()?;

    let client_package = match date {
        Some(raw) => time::parse_timestamp(raw)
            .map_err(|e| Error::BadRequest(format!("{}: {}", PACKAGE_DATE, e)))?,
        None => None,
    };

    Ok((version, client_package))
}

/// `package_version`/`package_date` from a commit body; present means a string
fn context_field(name: &str, value: Option<Value>) -> Result<Option<String>> {
    match value {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(Error::BadRequest(format!(
            "{} must be a string, got {}",
            name, other
        ))),
    }
}

/// CMI values arrive as JSON scalars; keep them as the strings SCORM uses
fn cmi_value(element: &str, value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Array(_) | Value::Object(_) => Err(Error::BadRequest(format!(
            "{} must be a scalar value",
            element
        ))),
    }
}
