use crate::error::{AppError, AppResult};
use crate::handlers::auth::Operator;
use crate::handlers::{audited, ok, Envelope};
use crate::services::systemd::{DEFAULT_LOG_LINES, MAX_LOG_LINES};
use crate::AppState;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Path, Query, State},
    Json,
};
use routerdash_common::{
    AuditResponse, ErrorResponse, HistoryResponse, LogsResponse, ManagedService,
    MessageResponse, RestartServiceRequest, SystemSnapshot,
};
use serde::Deserialize;
use std::sync::Arc;

const MAX_LIMIT: u32 = 1000;

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub lines: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

#[utoipa::path(
    get,
    path = "/api/system/status",
    responses(
        (status = 200, description = "Host metrics", body = SystemSnapshot),
        (status = 500, description = "Metrics unavailable", body = ErrorResponse)
    )
)]
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Envelope<SystemSnapshot>>> {
    let snapshot = state.metrics.snapshot().await?;
    if state.settings.history.enabled {
        state.db.record_system_snapshot(&snapshot).await;
    }
    Ok(ok(snapshot))
}

#[utoipa::path(
    get,
    path = "/api/system/history",
    params(("limit" = Option<u32>, Query, description = "Most recent snapshots to return")),
    responses((status = 200, description = "Recorded snapshots, newest first", body = HistoryResponse))
)]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> AppResult<Json<HistoryResponse>> {
    let Query(query) = query?;
    let limit = resolve_limit(query.limit, state.settings.history.default_limit);
    let snapshots = state.db.system_history(limit).await?;
    Ok(Json(HistoryResponse {
        success: true,
        snapshots,
    }))
}

#[utoipa::path(
    post,
    path = "/api/system/restart-service",
    request_body = RestartServiceRequest,
    responses(
        (status = 200, description = "Service restarted", body = MessageResponse),
        (status = 400, description = "Service not in the allow-list", body = ErrorResponse),
        (status = 500, description = "systemctl failed", body = ErrorResponse)
    )
)]
pub async fn restart_service(
    State(state): State<Arc<AppState>>,
    operator: Operator,
    payload: Result<Json<RestartServiceRequest>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let Json(payload) = payload?;
    let service = match payload.service.parse::<ManagedService>() {
        Ok(service) if service.is_restartable() => service,
        _ => {
            return Err(AppError::BadRequest(format!(
                "Service not allowed. Allowed: {}",
                ManagedService::allowed_list(ManagedService::restartable())
            )))
        }
    };

    let result = state.systemd.restart(service).await;
    audited(
        &state,
        &operator,
        "restart_service",
        &format!("Service: {}", service),
        result,
        &format!("Failed to restart {}", service),
    )
    .await?;

    Ok(Json(MessageResponse {
        success: true,
        message: format!("Service {} restarted", service),
    }))
}

#[utoipa::path(
    get,
    path = "/api/system/logs/{service}",
    params(
        ("service" = String, Path, description = "Managed service name"),
        ("lines" = Option<u32>, Query, description = "Journal lines to return, 1 to 1000")
    ),
    responses(
        (status = 200, description = "Recent journal output", body = LogsResponse),
        (status = 400, description = "Unknown service or bad line count", body = ErrorResponse),
        (status = 500, description = "journalctl failed", body = ErrorResponse)
    )
)]
pub async fn get_logs(
    State(state): State<Arc<AppState>>,
    Path(service): Path<String>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> AppResult<Json<LogsResponse>> {
    let service = service.parse::<ManagedService>().map_err(|_| {
        AppError::BadRequest(format!(
            "Service not allowed. Allowed: {}",
            ManagedService::allowed_list(ManagedService::ALL.iter().copied())
        ))
    })?;

    let Query(query) = query?;
    let lines = query.lines.unwrap_or(DEFAULT_LOG_LINES);
    if !(1..=MAX_LOG_LINES).contains(&lines) {
        return Err(AppError::BadRequest(format!(
            "lines must be between 1 and {}",
            MAX_LOG_LINES
        )));
    }

    let logs = state
        .systemd
        .logs(service, lines)
        .await
        .require(&format!("Failed to get logs for {}", service))?;

    Ok(Json(LogsResponse {
        success: true,
        logs,
        service,
    }))
}

#[utoipa::path(
    get,
    path = "/api/audit",
    params(("limit" = Option<u32>, Query, description = "Most recent entries to return")),
    responses((status = 200, description = "Audit trail, newest first", body = AuditResponse))
)]
pub async fn get_audit(
    State(state): State<Arc<AppState>>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> AppResult<Json<AuditResponse>> {
    let Query(query) = query?;
    let limit = resolve_limit(query.limit, state.settings.history.default_limit);
    let entries = state.db.recent_actions(limit).await?;
    Ok(Json(AuditResponse {
        success: true,
        entries,
    }))
}

pub(crate) fn resolve_limit(requested: Option<u32>, default: u32) -> u32 {
    requested.unwrap_or(default).clamp(1, MAX_LIMIT)
}
