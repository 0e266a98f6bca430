// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Health, metrics and operator API handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use crambot_core::types::{BindCode, BindKind, SendOptions};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::server::GatewayState;

/// Admin bind codes are short-lived; parent invites are handed out on paper.
pub const ADMIN_CODE_TTL_MINUTES: i64 = 30;
pub const PARENT_CODE_TTL_DAYS: i64 = 7;
const CODE_ATTEMPTS: usize = 5;

const DEFAULT_LIST_LIMIT: u32 = 20;
const MAX_LIST_LIMIT: u32 = 100;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
    })
}

/// GET /metrics
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "metrics recorder not installed"),
    }
}

/// Body of POST /api/broadcast.
#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub chat_ids: Vec<String>,
    pub message: String,
    #[serde(default)]
    pub options: SendOptions,
}

#[derive(Debug, Serialize)]
pub struct BroadcastAccepted {
    pub job_id: String,
}

/// POST /api/broadcast
pub async fn post_broadcast(
    State(state): State<GatewayState>,
    Json(body): Json<BroadcastRequest>,
) -> Response {
    if body.chat_ids.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "chat_ids must not be empty");
    }
    if body.message.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "message must not be empty");
    }

    match state
        .broadcast
        .enqueue(body.chat_ids, body.message, body.options)
        .await
    {
        Ok(job_id) => (StatusCode::ACCEPTED, Json(BroadcastAccepted { job_id })).into_response(),
        Err(e) => {
            error!(error = %e, "broadcast enqueue failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to queue broadcast")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
}

/// GET /api/broadcast
pub async fn list_broadcasts(
    State(state): State<GatewayState>,
    Query(query): Query<ListQuery>,
) -> Response {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    match state.broadcast.list_jobs(limit).await {
        Ok(jobs) => Json(jobs).into_response(),
        Err(e) => {
            error!(error = %e, "listing broadcast jobs failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to list broadcasts")
        }
    }
}

/// GET /api/broadcast/{id}
pub async fn get_broadcast(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Response {
    match state.broadcast.get_job(&id).await {
        Ok(Some(job)) => Json(job).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "broadcast job not found"),
        Err(e) => {
            error!(job_id = %id, error = %e, "loading broadcast job failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to load broadcast")
        }
    }
}

/// Body of POST /api/bind-codes.
#[derive(Debug, Deserialize)]
pub struct BindCodeRequest {
    pub kind: BindKind,
    pub tenant_id: String,
    #[serde(default)]
    pub tenant_name: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub student_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BindCodeIssued {
    pub code: String,
    pub kind: BindKind,
    pub expires_at: DateTime<Utc>,
}

/// POST /api/bind-codes
///
/// Admin codes need a tenant name; parent invites need the student.
pub async fn post_bind_code(
    State(state): State<GatewayState>,
    Json(body): Json<BindCodeRequest>,
) -> Response {
    if body.tenant_id.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "tenant_id is required");
    }
    let (ttl, student) = match body.kind {
        BindKind::Admin => {
            if body.tenant_name.as_deref().is_none_or(str::is_empty) {
                return error_response(StatusCode::BAD_REQUEST, "tenant_name is required");
            }
            (Duration::minutes(ADMIN_CODE_TTL_MINUTES), None)
        }
        BindKind::Parent => match (body.student_id, body.student_name) {
            (Some(id), Some(name)) if !id.is_empty() && !name.is_empty() => {
                (Duration::days(PARENT_CODE_TTL_DAYS), Some((id, name)))
            }
            _ => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "student_id and student_name are required",
                );
            }
        },
    };

    let code = match unused_code(&state).await {
        Ok(Some(code)) => code,
        Ok(None) => {
            error!("no free bind code after {CODE_ATTEMPTS} attempts");
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "no free bind code, retry");
        }
        Err(e) => {
            error!(error = %e, "bind code lookup failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to create bind code");
        }
    };

    let now = Utc::now();
    let (student_id, student_name) = student.unzip();
    let bind_code = BindCode {
        code,
        kind: body.kind,
        tenant_id: body.tenant_id,
        tenant_name: body.tenant_name.unwrap_or_default(),
        student_id,
        student_name,
        used_by: None,
        created_at: now,
        expires_at: now + ttl,
    };
    if let Err(e) = state.store.put_bind_code(&bind_code).await {
        error!(error = %e, "storing bind code failed");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to create bind code");
    }
    info!(
        tenant_id = %bind_code.tenant_id,
        kind = %bind_code.kind,
        "bind code issued"
    );

    (
        StatusCode::CREATED,
        Json(BindCodeIssued {
            code: bind_code.code,
            kind: bind_code.kind,
            expires_at: bind_code.expires_at,
        }),
    )
        .into_response()
}

/// A random six-digit code not already on record.
async fn unused_code(state: &GatewayState) -> Result<Option<String>, crambot_core::CrambotError> {
    for _ in 0..CODE_ATTEMPTS {
        let code = rand::thread_rng().gen_range(100_000..1_000_000).to_string();
        if state.store.get_bind_code(&code).await?.is_none() {
            return Ok(Some(code));
        }
    }
    Ok(None)
}
