mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{json, setup, tailscale_status, ScriptedRunner, AUTH};
use serde_json::json;

#[tokio::test]
async fn test_health_needs_no_credentials() {
    let t = setup(ScriptedRunner::new()).await;
    let response = t
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_credentials_get_basic_challenge() {
    let t = setup(ScriptedRunner::new()).await;
    let response = t
        .send(
            Request::builder()
                .uri("/api/tailscale/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Basic realm=\"Router Dashboard\""
    );
    let body = json(response).await;
    assert_eq!(body["success"], false);
    assert!(t.runner.calls().is_empty());
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let t = setup(ScriptedRunner::new()).await;
    let response = t
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/tailscale/toggle-exit-node")
                // admin:wrong
                .header(header::AUTHORIZATION, "Basic YWRtaW46d3Jvbmc=")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(t.runner.calls().is_empty());
    assert!(t.state.db.recent_actions(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_toggle_enables_exit_node() {
    let runner = ScriptedRunner::new()
        .ok("status --json", &tailscale_status(false))
        .ok("set --advertise-exit-node", "");
    let t = setup(runner).await;

    let response = t.post("/api/tailscale/toggle-exit-node", json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["exit_node_enabled"], true);
    assert_eq!(body["message"], "Exit node enabled");

    assert_eq!(
        t.runner.arg_lines(),
        vec!["status --json", "set --advertise-exit-node"]
    );

    let entries = t.state.db.recent_actions(10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "enable_exit_node");
    assert_eq!(entries[0].actor, "admin");
    assert!(entries[0].success);
}

#[tokio::test]
async fn test_toggle_disables_exit_node() {
    let runner = ScriptedRunner::new()
        .ok("status --json", &tailscale_status(true))
        .ok("set --advertise-exit-node=false", "");
    let t = setup(runner).await;

    let body = json(t.post("/api/tailscale/toggle-exit-node", json!({})).await).await;
    assert_eq!(body["exit_node_enabled"], false);

    let entries = t.state.db.recent_actions(10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "disable_exit_node");
}

#[tokio::test]
async fn test_failed_toggle_audits_every_attempt() {
    let runner = ScriptedRunner::new()
        .ok("status --json", &tailscale_status(false))
        .fail("set --advertise-exit-node", "permission denied");
    let t = setup(runner).await;

    for _ in 0..2 {
        let response = t.post("/api/tailscale/toggle-exit-node", json!({})).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json(response).await;
        assert_eq!(body["success"], false);
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("permission denied"));
    }

    let entries = t.state.db.recent_actions(10).await.unwrap();
    assert_eq!(entries.len(), 2);
    for entry in &entries {
        assert_eq!(entry.action, "enable_exit_node");
        assert!(!entry.success);
        assert!(entry.detail.contains("permission denied"));
    }
}

#[tokio::test]
async fn test_toggle_stops_when_status_unreadable() {
    let runner = ScriptedRunner::new().fail("status --json", "daemon not running");
    let t = setup(runner).await;

    let response = t.post("/api/tailscale/toggle-exit-node", json!({})).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(t.runner.arg_lines(), vec!["status --json"]);
    assert!(t.state.db.recent_actions(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_route_rejects_whole_batch() {
    let t = setup(ScriptedRunner::new()).await;

    let response = t
        .post(
            "/api/tailscale/routes",
            json!({"routes": ["10.0.0.0/24", "not-a-cidr"]}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json(response).await;
    assert_eq!(body["message"], "Invalid CIDR format: not-a-cidr");

    let response = t.post("/api/tailscale/routes", json!({"routes": []})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["message"], "No routes provided");

    assert!(t.runner.calls().is_empty());
    assert!(t.state.db.recent_actions(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_routes_are_canonicalized_and_applied() {
    let runner = ScriptedRunner::new().ok("set --advertise-routes=10.0.0.0/24,192.168.1.0/24", "");
    let t = setup(runner).await;

    let response = t
        .post(
            "/api/tailscale/routes",
            json!({"routes": ["10.0.0.7/24", " 192.168.1.0/24 "]}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["routes"], json!(["10.0.0.0/24", "192.168.1.0/24"]));

    let entries = t.state.db.recent_actions(10).await.unwrap();
    assert_eq!(entries[0].action, "update_routes");
    assert!(entries[0].success);
}

#[tokio::test]
async fn test_key_status_reflects_backend_state() {
    let runner = ScriptedRunner::new().ok("status --json", &tailscale_status(false));
    let t = setup(runner).await;

    let body = json(t.get("/api/tailscale/key-status").await).await;
    assert_eq!(body["has_key"], true);
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["backend_state"], "Running");
}

#[tokio::test]
async fn test_key_status_not_authenticated_unless_running() {
    let runner = ScriptedRunner::new().ok(
        "status --json",
        r#"{"BackendState":"Stopped","Self":{"TailscaleIPs":[]}}"#,
    );
    let t = setup(runner).await;

    let body = json(t.get("/api/tailscale/key-status").await).await;
    assert_eq!(body["backend_state"], "Stopped");
    assert_eq!(body["has_key"], false);
    assert_eq!(body["authenticated"], false);

    let runner = ScriptedRunner::new().ok(
        "status --json",
        r#"{"BackendState":"NeedsLogin","Self":{"TailscaleIPs":[]}}"#,
    );
    let t = setup(runner).await;

    let body = json(t.get("/api/tailscale/key-status").await).await;
    assert_eq!(body["backend_state"], "Unknown");
    assert_eq!(body["authenticated"], false);
}

#[tokio::test]
async fn test_tailscale_status_degrades_when_daemon_unreachable() {
    let t = setup(ScriptedRunner::new()).await;

    let response = t.get("/api/tailscale/status").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["connected"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Failed to get Tailscale status"));

    let body = json(t.get("/api/tailscale/history").await).await;
    assert!(body["snapshots"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_restart_outside_allow_list_runs_nothing() {
    let t = setup(ScriptedRunner::new()).await;

    for service in ["sshd", "igel-monitor"] {
        let response = t
            .post("/api/system/restart-service", json!({"service": service}))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json(response).await;
        assert!(body["message"]
            .as_str()
            .unwrap()
            .starts_with("Service not allowed. Allowed: tailscaled"));
    }

    assert!(t.runner.calls().is_empty());
    assert!(t.state.db.recent_actions(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restart_allowed_service() {
    let t = setup(ScriptedRunner::new().ok("restart casaos", "")).await;

    let response = t
        .post("/api/system/restart-service", json!({"service": "casaos"}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let entries = t.state.db.recent_actions(10).await.unwrap();
    assert_eq!(entries[0].action, "restart_service");
    assert_eq!(entries[0].detail, "Service: casaos");
}

#[tokio::test]
async fn test_logs_for_service() {
    let runner = ScriptedRunner::new().ok("-u headscale -n 20 --no-pager", "line one\nline two");
    let t = setup(runner).await;

    let body = json(t.get("/api/system/logs/headscale?lines=20").await).await;
    assert_eq!(body["logs"], "line one\nline two");
    assert_eq!(body["service"], "headscale");

    let response = t.get("/api/system/logs/headscale?lines=0").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = t.get("/api/system/logs/sshd").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(t.runner.calls().len(), 1);
}

#[tokio::test]
async fn test_wifi_scan_sorted_by_signal() {
    let runner = ScriptedRunner::new().ok("scan wlan0", "Cafe:40:Open\nbroken line\nHome:80:WPA2");
    let t = setup(runner).await;

    let body = json(t.get("/api/wifi/scan").await).await;
    let networks = body["networks"].as_array().unwrap();
    assert_eq!(networks.len(), 2);
    assert_eq!(networks[0]["ssid"], "Home");
    assert_eq!(networks[1]["ssid"], "Cafe");
}

#[tokio::test]
async fn test_wifi_connect_never_records_password() {
    let runner = ScriptedRunner::new().ok("connect wlan0 Home hunter22 no", "Connected");
    let t = setup(runner).await;

    let response = t
        .post(
            "/api/wifi/connect",
            json!({"interface": "wlan0", "ssid": "Home", "password": "hunter22"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let shown = t.runner.calls()[0].to_string();
    assert!(shown.contains("***"));
    assert!(!shown.contains("hunter22"));

    let entries = t.state.db.recent_actions(10).await.unwrap();
    assert_eq!(entries[0].action, "wifi_connect");
    assert!(!entries[0].detail.contains("hunter22"));
}

#[tokio::test]
async fn test_wifi_rejects_bad_interface() {
    let t = setup(ScriptedRunner::new()).await;

    let response = t
        .post("/api/wifi/ap/stop", json!({"interface": "wlan0; reboot"}))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(t.runner.calls().is_empty());
}

#[tokio::test]
async fn test_wifi_rejects_option_like_interface() {
    let t = setup(ScriptedRunner::new()).await;

    let response = t.get("/api/wifi/scan?interface=--help").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = t
        .post("/api/wifi/ap/stop", json!({"interface": "-wlan0"}))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(t.runner.calls().is_empty());
}

#[tokio::test]
async fn test_wan_not_detected() {
    let t = setup(ScriptedRunner::new().ok("wan", "")).await;
    let response = t.get("/api/wifi/wan").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_generate_key_without_body_uses_defaults() {
    let runner = ScriptedRunner::new().ok(
        "--user default preauthkeys create --reusable --expiration 1h",
        "3f1c0a9e",
    );
    let t = setup(runner).await;

    let response = t
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/headscale/generate-key")
                .header(header::AUTHORIZATION, AUTH)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["key"], "3f1c0a9e");
    assert_eq!(body["namespace"], "default");
    assert_eq!(body["expiration"], "1h");
}

#[tokio::test]
async fn test_dashboard_degrades_per_source() {
    let t = setup(ScriptedRunner::new()).await;

    let response = t.get("/api/dashboard").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["tailscale"]["connected"], false);
    assert!(body["tailscale"]["error"]
        .as_str()
        .unwrap()
        .contains("Failed to get Tailscale status"));
    assert_eq!(body["headscale"]["running"], false);
}

#[tokio::test]
async fn test_dashboard_polling_records_no_history() {
    let runner = ScriptedRunner::new().ok("status --json", &tailscale_status(true));
    let t = setup(runner).await;

    for _ in 0..3 {
        let response = t.get("/api/dashboard").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let body = json(t.get("/api/system/history").await).await;
    assert!(body["snapshots"].as_array().unwrap().is_empty());
    let body = json(t.get("/api/tailscale/history").await).await;
    assert!(body["snapshots"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_tailscale_status_reads_are_recorded_in_history() {
    let runner = ScriptedRunner::new().ok("status --json", &tailscale_status(true));
    let t = setup(runner).await;

    let body = json(t.get("/api/tailscale/status").await).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["self_ip"], "100.64.0.1");

    let body = json(t.get("/api/tailscale/history?limit=10").await).await;
    let snapshots = body["snapshots"].as_array().unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0]["backend_state"], "Running");
    assert_eq!(snapshots[0]["exit_node_enabled"], true);
    assert_eq!(snapshots[0]["advertised_routes"], "192.168.1.0/24");
    assert_eq!(snapshots[0]["peer_count"], 1);
}

#[tokio::test]
async fn test_status_reads_are_recorded_in_history() {
    let t = setup(ScriptedRunner::new()).await;

    let response = t.get("/api/system/status").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(t.get("/api/system/history").await).await;
    assert_eq!(body["snapshots"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_openapi_document_lists_routes() {
    let t = setup(ScriptedRunner::new()).await;
    let body = json(t.get("/api-docs/openapi.json").await).await;
    assert!(body["paths"]["/api/tailscale/toggle-exit-node"].is_object());
    assert!(body["paths"]["/api/wifi/wan"].is_object());
    assert!(body["paths"]["/api/tailscale/history"].is_object());
}
