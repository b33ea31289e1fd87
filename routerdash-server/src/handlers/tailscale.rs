use crate::error::{AppError, AppResult};
use crate::handlers::auth::Operator;
use crate::handlers::system::{resolve_limit, LimitQuery};
use crate::handlers::{audited, ok, Envelope};
use crate::services::parsers::validate_routes;
use crate::services::tailscale::{canonical, join_routes, ExitNodeChange};
use crate::AppState;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Query, State},
    Json,
};
use routerdash_common::{
    BackendState, ErrorResponse, KeyStatusResponse, MessageResponse, RoutesRequest,
    RoutesResponse, ToggleExitNodeResponse, VpnHistoryResponse, VpnStatus,
};
use std::sync::Arc;
use validator::Validate;

#[utoipa::path(
    get,
    path = "/api/tailscale/status",
    responses(
        (status = 200, description = "Current VPN status; `connected: false` with `error` when the daemon cannot be queried", body = VpnStatus)
    )
)]
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<Envelope<VpnStatus>> {
    match state.tailscale.status().await {
        Ok(status) => {
            if state.settings.history.enabled {
                state.db.record_vpn_status(&status).await;
            }
            ok(status)
        }
        Err(e) => Json(Envelope {
            success: false,
            data: VpnStatus::unavailable(e.to_string()),
        }),
    }
}

#[utoipa::path(
    get,
    path = "/api/tailscale/history",
    params(("limit" = Option<u32>, Query, description = "Most recent snapshots to return")),
    responses((status = 200, description = "Recorded VPN snapshots, newest first", body = VpnHistoryResponse))
)]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> AppResult<Json<VpnHistoryResponse>> {
    let Query(query) = query?;
    let limit = resolve_limit(query.limit, state.settings.history.default_limit);
    let snapshots = state.db.vpn_history(limit).await?;
    Ok(Json(VpnHistoryResponse {
        success: true,
        snapshots,
    }))
}

/// Reads the current exit-node state, then applies the opposite.
#[utoipa::path(
    post,
    path = "/api/tailscale/toggle-exit-node",
    responses(
        (status = 200, description = "Exit node toggled", body = ToggleExitNodeResponse),
        (status = 500, description = "Status read or change failed", body = ErrorResponse)
    )
)]
pub async fn toggle_exit_node(
    State(state): State<Arc<AppState>>,
    operator: Operator,
) -> AppResult<Json<ToggleExitNodeResponse>> {
    let observed = state.tailscale.status().await?;
    let change = ExitNodeChange::flip(&observed);

    let result = state.tailscale.apply_exit_node(change).await;
    audited(
        &state,
        &operator,
        change.audit_action(),
        change.message(),
        result,
        "Failed to toggle exit node",
    )
    .await?;

    Ok(Json(ToggleExitNodeResponse {
        success: true,
        message: change.message().to_string(),
        exit_node_enabled: change.enabled_after(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/tailscale/routes",
    responses(
        (status = 200, description = "Advertised subnet routes", body = RoutesResponse),
        (status = 500, description = "Tailscale unavailable", body = ErrorResponse)
    )
)]
pub async fn get_routes(State(state): State<Arc<AppState>>) -> AppResult<Json<RoutesResponse>> {
    let status = state.tailscale.status().await?;
    Ok(Json(RoutesResponse {
        success: true,
        routes: status.advertised_routes,
        message: None,
    }))
}

/// Replaces the advertised routes. The whole batch is rejected if any entry is not a CIDR.
#[utoipa::path(
    post,
    path = "/api/tailscale/routes",
    request_body = RoutesRequest,
    responses(
        (status = 200, description = "Routes updated", body = RoutesResponse),
        (status = 400, description = "Empty or invalid route list", body = ErrorResponse),
        (status = 500, description = "Tailscale rejected the routes", body = ErrorResponse)
    )
)]
pub async fn update_routes(
    State(state): State<Arc<AppState>>,
    operator: Operator,
    payload: Result<Json<RoutesRequest>, JsonRejection>,
) -> AppResult<Json<RoutesResponse>> {
    let Json(payload) = payload?;
    let networks =
        validate_routes(&payload.routes).map_err(|e| AppError::BadRequest(e.to_string()))?;
    payload.validate()?;

    let joined = join_routes(&networks);
    let result = state.tailscale.advertise_routes(&networks).await;
    audited(
        &state,
        &operator,
        "update_routes",
        &format!("Routes: {}", joined),
        result,
        "Failed to update routes",
    )
    .await?;

    Ok(Json(RoutesResponse {
        success: true,
        routes: networks.iter().map(|n| canonical(n).to_string()).collect(),
        message: Some("Routes updated successfully".to_string()),
    }))
}

#[utoipa::path(
    get,
    path = "/api/tailscale/key-status",
    responses(
        (status = 200, description = "Node key state", body = KeyStatusResponse),
        (status = 500, description = "Tailscale unavailable", body = ErrorResponse)
    )
)]
pub async fn key_status(State(state): State<Arc<AppState>>) -> AppResult<Json<KeyStatusResponse>> {
    let status = state.tailscale.status().await?;
    Ok(Json(KeyStatusResponse {
        success: true,
        has_key: status.backend_state.has_key(),
        authenticated: status.backend_state == BackendState::Running,
        backend_state: status.backend_state,
    }))
}

/// Logs the node out so it must re-authenticate with a fresh key.
#[utoipa::path(
    post,
    path = "/api/tailscale/rotate-key",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 500, description = "Logout failed", body = ErrorResponse)
    )
)]
pub async fn rotate_key(
    State(state): State<Arc<AppState>>,
    operator: Operator,
) -> AppResult<Json<MessageResponse>> {
    let result = state.tailscale.logout().await;
    audited(
        &state,
        &operator,
        "rotate_key",
        "Logged out for key rotation",
        result,
        "Failed to rotate key",
    )
    .await?;

    Ok(Json(MessageResponse {
        success: true,
        message: "Logged out. Re-authenticate with a new key to finish rotation.".to_string(),
    }))
}
