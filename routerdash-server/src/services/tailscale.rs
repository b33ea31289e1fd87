use crate::error::{AppError, AppResult};
use crate::services::parsers;
use crate::services::runner::{CommandLine, CommandResult, CommandRunner};
use ipnetwork::IpNetwork;
use routerdash_common::VpnStatus;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// The two directions an exit-node toggle can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitNodeChange {
    Enable,
    Disable,
}

impl ExitNodeChange {
    /// Plans a toggle from an observed status.
    ///
    /// The status is read before the change is applied and nothing re-checks it
    /// in between: if another actor flips the exit node in that window, the
    /// last writer wins. The panel assumes a single operator.
    pub fn flip(observed: &VpnStatus) -> Self {
        if observed.exit_node_enabled {
            ExitNodeChange::Disable
        } else {
            ExitNodeChange::Enable
        }
    }

    pub fn audit_action(&self) -> &'static str {
        match self {
            ExitNodeChange::Enable => "enable_exit_node",
            ExitNodeChange::Disable => "disable_exit_node",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ExitNodeChange::Enable => "Exit node enabled",
            ExitNodeChange::Disable => "Exit node disabled",
        }
    }

    /// Whether the node advertises itself as an exit node once the change lands.
    pub fn enabled_after(&self) -> bool {
        matches!(self, ExitNodeChange::Enable)
    }

    fn flag(&self) -> &'static str {
        match self {
            ExitNodeChange::Enable => "--advertise-exit-node",
            ExitNodeChange::Disable => "--advertise-exit-node=false",
        }
    }
}

pub struct Tailscale {
    runner: Arc<dyn CommandRunner>,
    program: String,
    timeout: Duration,
}

impl Tailscale {
    pub fn new(runner: Arc<dyn CommandRunner>, program: String, timeout: Duration) -> Self {
        Self {
            runner,
            program,
            timeout,
        }
    }

    fn command<const N: usize>(&self, args: [&str; N]) -> CommandLine {
        CommandLine::argv(self.program.clone(), args)
    }

    /// One `tailscale status --json` call serves every field of the status.
    pub async fn status(&self) -> AppResult<VpnStatus> {
        let stdout = self
            .runner
            .run(&self.command(["status", "--json"]), self.timeout)
            .await
            .require("Failed to get Tailscale status")?;

        parsers::parse_vpn_status(&stdout).map_err(|e| {
            AppError::CommandFailed(format!("Failed to parse Tailscale status: {}", e))
        })
    }

    pub async fn apply_exit_node(&self, change: ExitNodeChange) -> CommandResult {
        info!("Applying exit node change: {:?}", change);
        self.runner
            .run(&self.command(["set", change.flag()]), self.timeout)
            .await
    }

    /// Replaces the advertised subnet routes. Routes must already be validated.
    pub async fn advertise_routes(&self, routes: &[IpNetwork]) -> CommandResult {
        let joined = join_routes(routes);
        info!("Advertising routes: {}", joined);
        let flag = format!("--advertise-routes={}", joined);
        self.runner
            .run(&self.command(["set", flag.as_str()]), self.timeout)
            .await
    }

    pub async fn logout(&self) -> CommandResult {
        info!("Logging out of Tailscale to rotate the machine key");
        self.runner.run(&self.command(["logout"]), self.timeout).await
    }
}

/// Canonical, comma-joined form with host bits cleared.
pub fn join_routes(routes: &[IpNetwork]) -> String {
    routes
        .iter()
        .map(|net| canonical(net).to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn canonical(net: &IpNetwork) -> IpNetwork {
    IpNetwork::new(net.network(), net.prefix()).unwrap_or(*net)
}
