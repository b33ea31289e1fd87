use crate::error::{AppError, AppResult};
use crate::handlers::auth::Operator;
use crate::handlers::audited;
use crate::services::wifi::{DEFAULT_CHANNEL, DEFAULT_INTERFACE};
use crate::AppState;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Query, State},
    Json,
};
use routerdash_common::{
    validate_interface, ApStartRequest, ApStopRequest, ErrorResponse, GatewayRequest,
    InterfacesResponse, WanResponse, WifiActionResponse, WifiConnectRequest, WifiScanResponse,
    WifiStatusResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct InterfaceQuery {
    pub interface: Option<String>,
}

impl InterfaceQuery {
    fn resolve(self) -> AppResult<String> {
        let interface = self
            .interface
            .unwrap_or_else(|| DEFAULT_INTERFACE.to_string());
        match validate_interface(&interface) {
            Ok(()) => Ok(interface),
            Err(_) => Err(AppError::BadRequest(format!(
                "Invalid interface name: {}",
                interface
            ))),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/wifi/scan",
    params(("interface" = Option<String>, Query, description = "Wireless interface, default wlan0")),
    responses(
        (status = 200, description = "Visible networks, strongest first", body = WifiScanResponse),
        (status = 500, description = "Scan failed", body = ErrorResponse)
    )
)]
pub async fn scan(
    State(state): State<Arc<AppState>>,
    query: Result<Query<InterfaceQuery>, QueryRejection>,
) -> AppResult<Json<WifiScanResponse>> {
    let Query(query) = query?;
    let interface = query.resolve()?;
    let networks = state.wifi.scan(&interface).await?;
    Ok(Json(WifiScanResponse {
        success: true,
        networks,
    }))
}

#[utoipa::path(
    post,
    path = "/api/wifi/connect",
    request_body = WifiConnectRequest,
    responses(
        (status = 200, description = "Connected", body = WifiActionResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Connection failed", body = ErrorResponse)
    )
)]
pub async fn connect(
    State(state): State<Arc<AppState>>,
    operator: Operator,
    payload: Result<Json<WifiConnectRequest>, JsonRejection>,
) -> AppResult<Json<WifiActionResponse>> {
    let Json(payload) = payload?;
    payload.validate()?;

    let result = state
        .wifi
        .connect(
            &payload.interface,
            &payload.ssid,
            &payload.password,
            payload.hidden,
        )
        .await;
    let details = audited(
        &state,
        &operator,
        "wifi_connect",
        &format!("SSID: {} on {}", payload.ssid, payload.interface),
        result,
        "Failed to connect",
    )
    .await?;

    Ok(Json(WifiActionResponse {
        success: true,
        message: format!("Connected to {}", payload.ssid),
        details,
    }))
}

#[utoipa::path(
    get,
    path = "/api/wifi/status",
    params(("interface" = Option<String>, Query, description = "Wireless interface, default wlan0")),
    responses(
        (status = 200, description = "Interface status as reported by the WiFi manager", body = WifiStatusResponse),
        (status = 500, description = "Status unavailable", body = ErrorResponse)
    )
)]
pub async fn status(
    State(state): State<Arc<AppState>>,
    query: Result<Query<InterfaceQuery>, QueryRejection>,
) -> AppResult<Json<WifiStatusResponse>> {
    let Query(query) = query?;
    let interface = query.resolve()?;
    let status = state.wifi.status(&interface).await?;
    Ok(Json(WifiStatusResponse {
        success: true,
        status,
    }))
}

#[utoipa::path(
    get,
    path = "/api/wifi/interfaces",
    responses(
        (status = 200, description = "Wireless interfaces", body = InterfacesResponse),
        (status = 500, description = "Listing failed", body = ErrorResponse)
    )
)]
pub async fn interfaces(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<InterfacesResponse>> {
    let interfaces = state.wifi.interfaces().await?;
    Ok(Json(InterfacesResponse {
        success: true,
        interfaces,
    }))
}

#[utoipa::path(
    post,
    path = "/api/wifi/ap/start",
    request_body = ApStartRequest,
    responses(
        (status = 200, description = "Access point started", body = WifiActionResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Access point failed to start", body = ErrorResponse)
    )
)]
pub async fn start_ap(
    State(state): State<Arc<AppState>>,
    operator: Operator,
    payload: Result<Json<ApStartRequest>, JsonRejection>,
) -> AppResult<Json<WifiActionResponse>> {
    let Json(payload) = payload?;
    payload.validate()?;
    let channel = payload.channel.unwrap_or(DEFAULT_CHANNEL);

    let result = state
        .wifi
        .start_ap(&payload.interface, &payload.ssid, &payload.password, channel)
        .await;
    let details = audited(
        &state,
        &operator,
        "wifi_start_ap",
        &format!(
            "SSID: {} on {} (channel {})",
            payload.ssid, payload.interface, channel
        ),
        result,
        "Failed to start access point",
    )
    .await?;

    Ok(Json(WifiActionResponse {
        success: true,
        message: format!("Access point {} started", payload.ssid),
        details,
    }))
}

#[utoipa::path(
    post,
    path = "/api/wifi/ap/stop",
    request_body = ApStopRequest,
    responses(
        (status = 200, description = "Access point stopped", body = WifiActionResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Access point failed to stop", body = ErrorResponse)
    )
)]
pub async fn stop_ap(
    State(state): State<Arc<AppState>>,
    operator: Operator,
    payload: Result<Json<ApStopRequest>, JsonRejection>,
) -> AppResult<Json<WifiActionResponse>> {
    let Json(payload) = payload?;
    payload.validate()?;

    let result = state.wifi.stop_ap(&payload.interface).await;
    let details = audited(
        &state,
        &operator,
        "wifi_stop_ap",
        &format!("Interface: {}", payload.interface),
        result,
        "Failed to stop access point",
    )
    .await?;

    Ok(Json(WifiActionResponse {
        success: true,
        message: "Access point stopped".to_string(),
        details,
    }))
}

/// Joins an upstream network and shares it over the wired side.
#[utoipa::path(
    post,
    path = "/api/wifi/gateway",
    request_body = GatewayRequest,
    responses(
        (status = 200, description = "Gateway configured", body = WifiActionResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Gateway setup failed", body = ErrorResponse)
    )
)]
pub async fn gateway(
    State(state): State<Arc<AppState>>,
    operator: Operator,
    payload: Result<Json<GatewayRequest>, JsonRejection>,
) -> AppResult<Json<WifiActionResponse>> {
    let Json(payload) = payload?;
    payload.validate()?;

    let result = state
        .wifi
        .gateway(&payload.interface, &payload.ssid, &payload.password)
        .await;
    let details = audited(
        &state,
        &operator,
        "wifi_gateway",
        &format!("SSID: {} on {}", payload.ssid, payload.interface),
        result,
        "Failed to set up gateway",
    )
    .await?;

    Ok(Json(WifiActionResponse {
        success: true,
        message: format!("Gateway via {} configured", payload.ssid),
        details,
    }))
}

#[utoipa::path(
    get,
    path = "/api/wifi/wan",
    responses(
        (status = 200, description = "Detected WAN interface", body = WanResponse),
        (status = 404, description = "No WAN interface", body = ErrorResponse),
        (status = 500, description = "Detection failed", body = ErrorResponse)
    )
)]
pub async fn wan(State(state): State<Arc<AppState>>) -> AppResult<Json<WanResponse>> {
    let interface = state
        .wifi
        .wan()
        .await?
        .ok_or_else(|| AppError::NotFound("No WAN interface detected".to_string()))?;
    Ok(Json(WanResponse {
        success: true,
        interface,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_query_defaults_and_rejects_junk() {
        let query = InterfaceQuery { interface: None };
        assert_eq!(query.resolve().unwrap(), "wlan0");

        let query = InterfaceQuery {
            interface: Some("wlan0; reboot".to_string()),
        };
        assert!(matches!(query.resolve(), Err(AppError::BadRequest(_))));
    }
}
