use crate::error::{AppError, AppResult};
use crate::handlers::auth::Operator;
use crate::handlers::{audited, ok, Envelope};
use crate::services::headscale::{DEFAULT_EXPIRATION, DEFAULT_NAMESPACE};
use crate::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use routerdash_common::{
    ErrorResponse, HeadscaleStatus, NamespaceCreatedResponse, NamespaceRequest,
    NamespacesResponse, NodesResponse, PreauthKeyRequest, PreauthKeyResponse,
};
use std::sync::Arc;
use validator::Validate;

#[utoipa::path(
    get,
    path = "/api/headscale/status",
    responses((status = 200, description = "Coordination server status", body = HeadscaleStatus))
)]
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<Envelope<HeadscaleStatus>> {
    ok(state.headscale.status(&state.systemd).await)
}

#[utoipa::path(
    get,
    path = "/api/headscale/nodes",
    responses(
        (status = 200, description = "Registered nodes", body = NodesResponse),
        (status = 500, description = "Headscale unavailable", body = ErrorResponse)
    )
)]
pub async fn list_nodes(State(state): State<Arc<AppState>>) -> AppResult<Json<NodesResponse>> {
    let nodes = state.headscale.nodes().await?;
    Ok(Json(NodesResponse {
        success: true,
        count: nodes.len(),
        nodes,
    }))
}

#[utoipa::path(
    get,
    path = "/api/headscale/namespaces",
    responses(
        (status = 200, description = "Namespaces", body = NamespacesResponse),
        (status = 500, description = "Headscale unavailable", body = ErrorResponse)
    )
)]
pub async fn list_namespaces(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<NamespacesResponse>> {
    let namespaces = state.headscale.namespaces().await?;
    Ok(Json(NamespacesResponse {
        success: true,
        count: namespaces.len(),
        namespaces,
    }))
}

#[utoipa::path(
    post,
    path = "/api/headscale/namespaces",
    request_body = NamespaceRequest,
    responses(
        (status = 200, description = "Namespace created", body = NamespaceCreatedResponse),
        (status = 400, description = "Invalid namespace name", body = ErrorResponse),
        (status = 500, description = "Headscale rejected the namespace", body = ErrorResponse)
    )
)]
pub async fn create_namespace(
    State(state): State<Arc<AppState>>,
    operator: Operator,
    payload: Result<Json<NamespaceRequest>, JsonRejection>,
) -> AppResult<Json<NamespaceCreatedResponse>> {
    let Json(payload) = payload?;
    payload.validate()?;

    let result = state.headscale.create_namespace(&payload.namespace).await;
    audited(
        &state,
        &operator,
        "create_namespace",
        &format!("Namespace: {}", payload.namespace),
        result,
        "Failed to create namespace",
    )
    .await?;

    Ok(Json(NamespaceCreatedResponse {
        success: true,
        message: format!("Namespace {} created", payload.namespace),
        namespace: payload.namespace,
    }))
}

/// Every field is optional; a request without a JSON body uses the defaults.
#[utoipa::path(
    post,
    path = "/api/headscale/generate-key",
    request_body = PreauthKeyRequest,
    responses(
        (status = 200, description = "Pre-auth key created", body = PreauthKeyResponse),
        (status = 400, description = "Invalid namespace or expiration", body = ErrorResponse),
        (status = 500, description = "Headscale rejected the request", body = ErrorResponse)
    )
)]
pub async fn generate_preauth_key(
    State(state): State<Arc<AppState>>,
    operator: Operator,
    payload: Result<Json<PreauthKeyRequest>, JsonRejection>,
) -> AppResult<Json<PreauthKeyResponse>> {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(JsonRejection::MissingJsonContentType(_)) => PreauthKeyRequest::default(),
        Err(rejection) => return Err(AppError::from(rejection)),
    };
    payload.validate()?;

    let namespace = payload.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
    let expiration = payload.expiration.as_deref().unwrap_or(DEFAULT_EXPIRATION);
    let reusable = payload.reusable.unwrap_or(true);

    let result = state
        .headscale
        .create_preauth_key(namespace, expiration, reusable)
        .await;
    let key = audited(
        &state,
        &operator,
        "generate_preauth_key",
        &format!(
            "Namespace: {}, expiration: {}, reusable: {}",
            namespace, expiration, reusable
        ),
        result,
        "Failed to generate key",
    )
    .await?;

    Ok(Json(PreauthKeyResponse {
        success: true,
        key,
        namespace: namespace.to_string(),
        expiration: expiration.to_string(),
    }))
}
