#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use routerdash_server::config::Settings;
use routerdash_server::services::auth::Credentials;
use routerdash_server::services::db::Database;
use routerdash_server::services::runner::{CommandLine, CommandResult, CommandRunner};
use routerdash_server::{app, AppState};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::util::ServiceExt;

/// `admin:secret`
pub const AUTH: &str = "Basic YWRtaW46c2VjcmV0";

/// Answers commands from a script keyed on the joined argument list and
/// records everything it was asked to run.
#[derive(Default)]
pub struct ScriptedRunner {
    script: Mutex<Vec<(String, CommandResult)>>,
    calls: Mutex<Vec<CommandLine>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, args: &str, result: CommandResult) -> Self {
        self.script
            .lock()
            .unwrap()
            .push((args.to_string(), result));
        self
    }

    pub fn ok(self, args: &str, stdout: &str) -> Self {
        self.on(args, CommandResult::completed(0, stdout.as_bytes(), b""))
    }

    pub fn fail(self, args: &str, stderr: &str) -> Self {
        self.on(args, CommandResult::completed(1, b"", stderr.as_bytes()))
    }

    pub fn calls(&self) -> Vec<CommandLine> {
        self.calls.lock().unwrap().clone()
    }

    /// Argument lines of every recorded call, unmasked.
    pub fn arg_lines(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.args().join(" ")).collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &CommandLine, _timeout: Duration) -> CommandResult {
        self.calls.lock().unwrap().push(command.clone());
        let line = command.args().join(" ");
        self.script
            .lock()
            .unwrap()
            .iter()
            .find(|(args, _)| *args == line)
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| CommandResult::failed(format!("unscripted command: {}", line)))
    }
}

pub struct TestApp {
    pub app: Router,
    pub state: Arc<AppState>,
    pub runner: Arc<ScriptedRunner>,
}

pub async fn setup(runner: ScriptedRunner) -> TestApp {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let mut settings = Settings::default_only().unwrap();
    settings.database.url = "sqlite::memory:".to_string();
    settings.tools.thermal_zone = "/nonexistent/thermal_zone0/temp".to_string();
    let credentials = Credentials::from_json(r#"{"admin": {"password": "secret"}}"#).unwrap();

    let runner = Arc::new(runner);
    let state = Arc::new(AppState::new(settings, db, credentials, runner.clone()));
    TestApp {
        app: app(state.clone()),
        state,
        runner,
    }
}

impl TestApp {
    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .uri(uri)
                .header(header::AUTHORIZATION, AUTH)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post(&self, uri: &str, body: serde_json::Value) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::AUTHORIZATION, AUTH)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }
}

pub async fn json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub fn tailscale_status(exit_node: bool) -> String {
    serde_json::json!({
        "BackendState": "Running",
        "Self": {
            "HostName": "igel",
            "TailscaleIPs": ["100.64.0.1", "fd7a:115c:a1e0::1"],
            "ExitNodeOption": exit_node,
            "PrimaryRoutes": ["192.168.1.0/24"]
        },
        "Peer": {
            "nodekey:abc": {
                "HostName": "laptop",
                "TailscaleIPs": ["100.64.0.2"],
                "Online": true
            }
        }
    })
    .to_string()
}
