use crate::error::{AppError, AppResult};
use crate::services::parsers::{self, parse_service_active};
use crate::services::runner::{CommandLine, CommandResult, CommandRunner};
use crate::services::systemd::Systemd;
use routerdash_common::{HeadscaleStatus, ManagedService};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_EXPIRATION: &str = "1h";

pub struct Headscale {
    runner: Arc<dyn CommandRunner>,
    program: String,
    timeout: Duration,
}

impl Headscale {
    pub fn new(runner: Arc<dyn CommandRunner>, program: String, timeout: Duration) -> Self {
        Self {
            runner,
            program,
            timeout,
        }
    }

    async fn list(&self, what: &str) -> AppResult<Vec<serde_json::Value>> {
        let command = CommandLine::argv(
            self.program.clone(),
            [what, "list", "--output", "json"],
        );
        let stdout = self
            .runner
            .run(&command, self.timeout)
            .await
            .require(&format!("Failed to get {}", what))?;

        parsers::parse_json_list(&stdout)
            .map_err(|e| AppError::CommandFailed(format!("Failed to parse {}: {}", what, e)))
    }

    pub async fn nodes(&self) -> AppResult<Vec<serde_json::Value>> {
        self.list("nodes").await
    }

    pub async fn namespaces(&self) -> AppResult<Vec<serde_json::Value>> {
        self.list("namespaces").await
    }

    pub async fn create_namespace(&self, name: &str) -> CommandResult {
        info!("Creating Headscale namespace {}", name);
        let command = CommandLine::argv(self.program.clone(), ["namespaces", "create", name]);
        self.runner.run(&command, self.timeout).await
    }

    pub async fn create_preauth_key(
        &self,
        namespace: &str,
        expiration: &str,
        reusable: bool,
    ) -> CommandResult {
        info!(
            "Creating pre-auth key for namespace {} (expiration {}, reusable {})",
            namespace, expiration, reusable
        );
        let mut args = vec!["--user", namespace, "preauthkeys", "create"];
        if reusable {
            args.push("--reusable");
        }
        args.extend(["--expiration", expiration]);
        let command = CommandLine::argv(self.program.clone(), args);
        self.runner.run(&command, self.timeout).await
    }

    /// Probes the service first; nodes and namespaces are only listed when it runs.
    /// A failed listing leaves that field empty rather than failing the whole status.
    pub async fn status(&self, systemd: &Systemd) -> HeadscaleStatus {
        let probe = systemd.is_active(ManagedService::Headscale).await;
        if !(probe.success && parse_service_active(&probe.stdout)) {
            let error = if probe.stderr.is_empty() {
                probe.stdout
            } else {
                probe.stderr
            };
            return HeadscaleStatus {
                installed: true,
                running: false,
                error: Some(error),
                ..Default::default()
            };
        }

        let (nodes, namespaces) = tokio::join!(self.nodes(), self.namespaces());
        let nodes = nodes.unwrap_or_else(|e| {
            warn!("Headscale nodes unavailable: {}", e);
            Vec::new()
        });
        let namespaces = namespaces.unwrap_or_else(|e| {
            warn!("Headscale namespaces unavailable: {}", e);
            Vec::new()
        });

        HeadscaleStatus {
            installed: true,
            running: true,
            node_count: nodes.len(),
            nodes,
            namespaces,
            error: None,
        }
    }
}
