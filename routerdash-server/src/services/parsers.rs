//! Decoders for the output of the external tools.

use ipnetwork::IpNetwork;
use routerdash_common::{BackendState, PeerSummary, VpnStatus, WifiNetwork};
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON array")]
    NotAnArray,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RouteError {
    #[error("No routes provided")]
    Empty,

    #[error("Invalid CIDR format: {0}")]
    Invalid(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawStatus {
    #[serde(rename = "Self")]
    self_node: Option<RawNode>,
    backend_state: Option<String>,
    peer: Option<BTreeMap<String, RawNode>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawNode {
    host_name: Option<String>,
    #[serde(rename = "TailscaleIPs")]
    tailscale_ips: Option<Vec<String>>,
    exit_node_option: Option<bool>,
    primary_routes: Option<Vec<String>>,
    online: Option<bool>,
}

/// Decodes `tailscale status --json`. Every field is optional and falls back to
/// a default; only a payload that is not JSON at all is an error.
pub fn parse_vpn_status(raw: &str) -> Result<VpnStatus, ParseError> {
    let status: RawStatus = serde_json::from_str(raw)?;
    let me = status.self_node.unwrap_or_default();
    let peers = status.peer.unwrap_or_default();

    Ok(VpnStatus {
        connected: true,
        self_ip: me
            .tailscale_ips
            .as_ref()
            .and_then(|ips| ips.first().cloned())
            .unwrap_or_else(|| "Unknown".to_string()),
        hostname: me.host_name.unwrap_or_else(|| "Unknown".to_string()),
        exit_node_enabled: me.exit_node_option.unwrap_or(false),
        advertised_routes: me.primary_routes.unwrap_or_default(),
        peer_count: peers.len(),
        peers: peers
            .into_values()
            .map(|peer| PeerSummary {
                hostname: peer.host_name.unwrap_or_default(),
                ips: peer.tailscale_ips.unwrap_or_default(),
                online: peer.online.unwrap_or(false),
                exit_node_option: peer.exit_node_option.unwrap_or(false),
            })
            .collect(),
        backend_state: status
            .backend_state
            .as_deref()
            .map(BackendState::from_tailscale)
            .unwrap_or_default(),
        error: None,
    })
}

/// Decodes `ssid:signal:security` lines, skipping anything malformed, strongest first.
pub fn parse_wifi_scan(raw: &str) -> Vec<WifiNetwork> {
    let mut networks: Vec<WifiNetwork> = raw
        .lines()
        .filter_map(|line| {
            let mut parts = line.split(':');
            let ssid = parts.next()?;
            let signal = parts.next()?.trim().parse::<i32>().ok()?;
            let security = parts.next()?;
            Some(WifiNetwork {
                ssid: ssid.to_string(),
                signal,
                security: security.to_string(),
            })
        })
        .collect();
    networks.sort_by(|a, b| b.signal.cmp(&a.signal));
    networks
}

pub fn parse_service_active(stdout: &str) -> bool {
    stdout.trim() == "active"
}

/// Validates a whole batch of routes before anything is applied.
pub fn validate_routes(routes: &[String]) -> Result<Vec<IpNetwork>, RouteError> {
    if routes.is_empty() {
        return Err(RouteError::Empty);
    }
    routes
        .iter()
        .map(|route| {
            route
                .trim()
                .parse::<IpNetwork>()
                .map_err(|_| RouteError::Invalid(route.clone()))
        })
        .collect()
}

/// Headscale prints nothing at all when a list is empty.
pub fn parse_json_list(raw: &str) -> Result<Vec<serde_json::Value>, ParseError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str(raw)? {
        serde_json::Value::Array(items) => Ok(items),
        serde_json::Value::Null => Ok(Vec::new()),
        _ => Err(ParseError::NotAnArray),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_STATUS: &str = r#"{
        "BackendState": "Running",
        "Self": {
            "HostName": "m250c",
            "TailscaleIPs": ["100.64.0.1", "fd7a:115c:a1e0::1"],
            "ExitNodeOption": true,
            "PrimaryRoutes": ["192.168.1.0/24"]
        },
        "Peer": {
            "nodekey:abc": {"HostName": "laptop", "TailscaleIPs": ["100.64.0.2"], "Online": true},
            "nodekey:def": {"HostName": "phone"}
        }
    }"#;

    #[test]
    fn test_full_vpn_status() {
        let status = parse_vpn_status(FULL_STATUS).unwrap();
        assert!(status.connected);
        assert_eq!(status.self_ip, "100.64.0.1");
        assert_eq!(status.hostname, "m250c");
        assert!(status.exit_node_enabled);
        assert_eq!(status.advertised_routes, vec!["192.168.1.0/24"]);
        assert_eq!(status.peer_count, 2);
        assert_eq!(status.peers[0].hostname, "laptop");
        assert!(status.peers[0].online);
        assert!(!status.peers[1].online);
        assert_eq!(status.backend_state, BackendState::Running);
    }

    #[test]
    fn test_vpn_status_defaults() {
        let status = parse_vpn_status("{}").unwrap();
        assert!(!status.exit_node_enabled);
        assert!(status.advertised_routes.is_empty());
        assert_eq!(status.backend_state, BackendState::Unknown);
        assert_eq!(status.self_ip, "Unknown");
        assert_eq!(status.hostname, "Unknown");
        assert_eq!(status.peer_count, 0);

        let status =
            parse_vpn_status(r#"{"Self":{"ExitNodeOption":false},"BackendState":"Running"}"#)
                .unwrap();
        assert!(!status.exit_node_enabled);
        assert_eq!(status.backend_state, BackendState::Running);

        let status = parse_vpn_status(r#"{"Self":{"TailscaleIPs":[]},"Peer":null}"#).unwrap();
        assert_eq!(status.self_ip, "Unknown");
    }

    #[test]
    fn test_vpn_status_rejects_garbage() {
        assert!(parse_vpn_status("tailscaled is not running").is_err());
    }

    #[test]
    fn test_wifi_scan_skips_malformed_lines() {
        let raw = "home:42:WPA2\nbroken-line\ncafe:87:WPA2\nweird:strong:WPA2\nopen:15:\n:30:WEP";
        let networks = parse_wifi_scan(raw);
        let summary: Vec<(&str, i32)> = networks
            .iter()
            .map(|n| (n.ssid.as_str(), n.signal))
            .collect();
        assert_eq!(
            summary,
            vec![("cafe", 87), ("home", 42), ("", 30), ("open", 15)]
        );
        assert_eq!(networks[0].security, "WPA2");
    }

    #[test]
    fn test_wifi_scan_empty() {
        assert!(parse_wifi_scan("").is_empty());
    }

    #[test]
    fn test_service_active() {
        assert!(parse_service_active("active\n"));
        assert!(!parse_service_active("inactive"));
        assert!(!parse_service_active("activating"));
    }

    #[test]
    fn test_route_batch_is_all_or_nothing() {
        let routes = vec!["10.0.0.0/24".to_string(), "not-a-cidr".to_string()];
        assert_eq!(
            validate_routes(&routes),
            Err(RouteError::Invalid("not-a-cidr".to_string()))
        );

        let routes = vec![
            "10.0.0.0/24".to_string(),
            "192.168.1.7".to_string(),
            "fd00::/64".to_string(),
        ];
        assert_eq!(validate_routes(&routes).unwrap().len(), 3);

        assert_eq!(validate_routes(&[]), Err(RouteError::Empty));
        assert!(validate_routes(&["10.0.0.0/33".to_string()]).is_err());
    }

    #[test]
    fn test_json_list() {
        assert!(parse_json_list("").unwrap().is_empty());
        assert_eq!(parse_json_list(r#"[{"id":1},{"id":2}]"#).unwrap().len(), 2);
        assert!(parse_json_list(r#"{"id":1}"#).is_err());
    }
}
