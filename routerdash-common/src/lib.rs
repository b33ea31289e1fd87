use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

#[cfg(feature = "validation")]
use validator::Validate;

#[cfg(feature = "db")]
use sqlx::FromRow;

/// Lifecycle phase reported by the Tailscale daemon.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub enum BackendState {
    Running,
    Starting,
    Stopped,
    #[default]
    Unknown,
}

impl BackendState {
    /// Maps the daemon's `BackendState` string; anything unrecognized is `Unknown`.
    pub fn from_tailscale(raw: &str) -> Self {
        match raw {
            "Running" => BackendState::Running,
            "Starting" => BackendState::Starting,
            "Stopped" => BackendState::Stopped,
            _ => BackendState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendState::Running => "Running",
            BackendState::Starting => "Starting",
            BackendState::Stopped => "Stopped",
            BackendState::Unknown => "Unknown",
        }
    }

    /// A machine key is present once the daemon is starting or running.
    pub fn has_key(&self) -> bool {
        matches!(self, BackendState::Running | BackendState::Starting)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct PeerSummary {
    pub hostname: String,
    pub ips: Vec<String>,
    pub online: bool,
    pub exit_node_option: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct VpnStatus {
    pub connected: bool,
    pub self_ip: String,
    pub hostname: String,
    pub exit_node_enabled: bool,
    pub advertised_routes: Vec<String>,
    pub peer_count: usize,
    pub peers: Vec<PeerSummary>,
    pub backend_state: BackendState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VpnStatus {
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            connected: false,
            self_ip: "Unknown".to_string(),
            hostname: "Unknown".to_string(),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SystemSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cpu_pct: f32,
    pub mem_pct: f64,
    pub mem_used: u64,
    pub mem_total: u64,
    pub disk_pct: f64,
    pub disk_used: u64,
    pub disk_total: u64,
    pub temperature: Option<f64>,
    pub net_bytes_sent: u64,
    pub net_bytes_recv: u64,
    pub uptime_secs: u64,
}

/// A persisted row of the `system_status` history table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "db", derive(FromRow))]
pub struct SystemHistoryEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub disk_usage: f64,
    pub temperature: Option<f64>,
    pub network_bytes_sent: i64,
    pub network_bytes_recv: i64,
}

/// A persisted row of the `tailscale_status` history table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "db", derive(FromRow))]
pub struct VpnSnapshot {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub backend_state: String,
    pub self_ip: String,
    pub exit_node_enabled: bool,
    /// Comma-joined CIDRs.
    pub advertised_routes: String,
    pub peer_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "db", derive(FromRow))]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub detail: String,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct HeadscaleStatus {
    pub installed: bool,
    pub running: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub nodes: Vec<serde_json::Value>,
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub namespaces: Vec<serde_json::Value>,
    pub node_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WifiNetwork {
    pub ssid: String,
    pub signal: i32,
    pub security: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct DashboardView {
    pub system: Option<SystemSnapshot>,
    pub tailscale: VpnStatus,
    pub headscale: HeadscaleStatus,
}

/// Services the dashboard is allowed to touch.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "kebab-case")]
pub enum ManagedService {
    Tailscaled,
    Headscale,
    Headplane,
    Casaos,
    Cockpit,
    IgelMonitor,
}

impl ManagedService {
    pub const ALL: [ManagedService; 6] = [
        ManagedService::Tailscaled,
        ManagedService::Headscale,
        ManagedService::Headplane,
        ManagedService::Casaos,
        ManagedService::Cockpit,
        ManagedService::IgelMonitor,
    ];

    pub fn unit_name(&self) -> &'static str {
        match self {
            ManagedService::Tailscaled => "tailscaled",
            ManagedService::Headscale => "headscale",
            ManagedService::Headplane => "headplane",
            ManagedService::Casaos => "casaos",
            ManagedService::Cockpit => "cockpit",
            ManagedService::IgelMonitor => "igel-monitor",
        }
    }

    /// The monitor unit exposes logs but may not be restarted from the panel.
    pub fn is_restartable(&self) -> bool {
        !matches!(self, ManagedService::IgelMonitor)
    }

    pub fn restartable() -> impl Iterator<Item = ManagedService> {
        Self::ALL.into_iter().filter(|s| s.is_restartable())
    }

    pub fn allowed_list(services: impl Iterator<Item = ManagedService>) -> String {
        services
            .map(|s| s.unit_name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ManagedService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.unit_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownService(pub String);

impl fmt::Display for UnknownService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown service: {}", self.0)
    }
}

impl std::error::Error for UnknownService {}

impl FromStr for ManagedService {
    type Err = UnknownService;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|svc| svc.unit_name() == s)
            .ok_or_else(|| UnknownService(s.to_string()))
    }
}

// ---- requests ----

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct RoutesRequest {
    #[cfg_attr(feature = "validation", validate(length(min = 1, max = 64)))]
    pub routes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct NamespaceRequest {
    #[cfg_attr(
        feature = "validation",
        validate(custom(function = "validate_namespace"))
    )]
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct PreauthKeyRequest {
    #[cfg_attr(
        feature = "validation",
        validate(custom(function = "validate_namespace"))
    )]
    pub namespace: Option<String>,
    #[cfg_attr(
        feature = "validation",
        validate(custom(function = "validate_expiration"))
    )]
    pub expiration: Option<String>,
    pub reusable: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct RestartServiceRequest {
    pub service: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Zeroize, ZeroizeOnDrop)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct WifiConnectRequest {
    #[cfg_attr(
        feature = "validation",
        validate(custom(function = "validate_interface"))
    )]
    pub interface: String,
    #[cfg_attr(feature = "validation", validate(length(min = 1, max = 32)))]
    pub ssid: String,
    #[cfg_attr(feature = "validation", validate(length(max = 63)))]
    pub password: String,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Zeroize, ZeroizeOnDrop)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct ApStartRequest {
    #[cfg_attr(
        feature = "validation",
        validate(custom(function = "validate_interface"))
    )]
    pub interface: String,
    #[cfg_attr(feature = "validation", validate(length(min = 1, max = 32)))]
    pub ssid: String,
    #[cfg_attr(feature = "validation", validate(length(min = 8, max = 63)))]
    pub password: String,
    #[cfg_attr(feature = "validation", validate(range(min = 1, max = 196)))]
    pub channel: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct ApStopRequest {
    #[cfg_attr(
        feature = "validation",
        validate(custom(function = "validate_interface"))
    )]
    pub interface: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Zeroize, ZeroizeOnDrop)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct GatewayRequest {
    #[cfg_attr(
        feature = "validation",
        validate(custom(function = "validate_interface"))
    )]
    pub interface: String,
    #[cfg_attr(feature = "validation", validate(length(min = 1, max = 32)))]
    pub ssid: String,
    #[cfg_attr(feature = "validation", validate(length(max = 63)))]
    pub password: String,
}

// ---- responses ----

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ToggleExitNodeResponse {
    pub success: bool,
    pub message: String,
    pub exit_node_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct RoutesResponse {
    pub success: bool,
    pub routes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct KeyStatusResponse {
    pub success: bool,
    pub has_key: bool,
    pub authenticated: bool,
    pub backend_state: BackendState,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct PreauthKeyResponse {
    pub success: bool,
    pub key: String,
    pub namespace: String,
    pub expiration: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct NodesResponse {
    pub success: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub nodes: Vec<serde_json::Value>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct NamespacesResponse {
    pub success: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub namespaces: Vec<serde_json::Value>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct NamespaceCreatedResponse {
    pub success: bool,
    pub message: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct LogsResponse {
    pub success: bool,
    pub logs: String,
    pub service: ManagedService,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WifiScanResponse {
    pub success: bool,
    pub networks: Vec<WifiNetwork>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WifiStatusResponse {
    pub success: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub status: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct InterfacesResponse {
    pub success: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub interfaces: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WifiActionResponse {
    pub success: bool,
    pub message: String,
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WanResponse {
    pub success: bool,
    pub interface: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct AuditResponse {
    pub success: bool,
    pub entries: Vec<AuditEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct HistoryResponse {
    pub success: bool,
    pub snapshots: Vec<SystemHistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct VpnHistoryResponse {
    pub success: bool,
    pub snapshots: Vec<VpnSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub success: bool,
}


#[cfg(feature = "validation")]
pub fn validate_interface(value: &str) -> Result<(), validator::ValidationError> {
    if value.is_empty() || value.len() > 15 {
        return Err(validator::ValidationError::new("interface_length"));
    }
    if value.starts_with('-') {
        return Err(validator::ValidationError::new("interface_leading_dash"));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(validator::ValidationError::new("interface_charset"));
    }
    Ok(())
}

#[cfg(feature = "validation")]
fn validate_namespace(value: &str) -> Result<(), validator::ValidationError> {
    if value.is_empty() || value.len() > 63 {
        return Err(validator::ValidationError::new("namespace_length"));
    }
    if value.starts_with('-')
        || !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(validator::ValidationError::new("namespace_charset"));
    }
    Ok(())
}

#[cfg(feature = "validation")]
fn validate_expiration(value: &str) -> Result<(), validator::ValidationError> {
    let Some(unit) = value.chars().last() else {
        return Err(validator::ValidationError::new("expiration_empty"));
    };
    let digits = &value[..value.len() - unit.len_utf8()];
    if !matches!(unit, 's' | 'm' | 'h' | 'd')
        || digits.is_empty()
        || !digits.chars().all(|c| c.is_ascii_digit())
    {
        return Err(validator::ValidationError::new("expiration_format"));
    }
    Ok(())
}
