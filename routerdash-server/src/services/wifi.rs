use crate::error::{AppError, AppResult};
use crate::services::parsers;
use crate::services::runner::{CommandLine, CommandResult, CommandRunner};
use routerdash_common::WifiNetwork;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_INTERFACE: &str = "wlan0";
pub const DEFAULT_CHANNEL: u16 = 6;

/// Wrapper around the appliance's `wifi-manager.sh` script.
pub struct WifiManager {
    runner: Arc<dyn CommandRunner>,
    script: String,
    timeout: Duration,
}

impl WifiManager {
    pub fn new(runner: Arc<dyn CommandRunner>, script: String, timeout: Duration) -> Self {
        Self {
            runner,
            script,
            timeout,
        }
    }

    async fn run(&self, command: CommandLine) -> CommandResult {
        self.runner.run(&command, self.timeout).await
    }

    fn command<'a>(&self, args: impl IntoIterator<Item = &'a str>) -> CommandLine {
        CommandLine::argv(self.script.clone(), args)
    }

    pub async fn scan(&self, interface: &str) -> AppResult<Vec<WifiNetwork>> {
        let stdout = self
            .run(self.command(["scan", interface]))
            .await
            .require("Failed to scan WiFi networks")?;
        Ok(parsers::parse_wifi_scan(&stdout))
    }

    pub async fn connect(
        &self,
        interface: &str,
        ssid: &str,
        password: &str,
        hidden: bool,
    ) -> CommandResult {
        info!("Connecting {} to {}", interface, ssid);
        let hidden = if hidden { "yes" } else { "no" };
        self.run(
            self.command(["connect", interface, ssid, password, hidden])
                .masking(3),
        )
        .await
    }

    pub async fn status(&self, interface: &str) -> AppResult<serde_json::Value> {
        let stdout = self
            .run(self.command(["status", interface]))
            .await
            .require("Failed to get WiFi status")?;
        serde_json::from_str(&stdout)
            .map_err(|_| AppError::CommandFailed("Invalid status data format".to_string()))
    }

    pub async fn interfaces(&self) -> AppResult<serde_json::Value> {
        let stdout = self
            .run(self.command(["list"]))
            .await
            .require("Failed to list interfaces")?;
        serde_json::from_str(&stdout)
            .map_err(|_| AppError::CommandFailed("Invalid interface data format".to_string()))
    }

    pub async fn start_ap(
        &self,
        interface: &str,
        ssid: &str,
        password: &str,
        channel: u16,
    ) -> CommandResult {
        info!("Starting access point {} on {} (channel {})", ssid, interface, channel);
        let channel = channel.to_string();
        self.run(
            self.command(["start-ap", interface, ssid, password, channel.as_str()])
                .masking(3),
        )
        .await
    }

    pub async fn stop_ap(&self, interface: &str) -> CommandResult {
        info!("Stopping access point on {}", interface);
        self.run(self.command(["stop-ap", interface])).await
    }

    pub async fn gateway(&self, interface: &str, ssid: &str, password: &str) -> CommandResult {
        info!("Setting up WiFi gateway on {} via {}", interface, ssid);
        self.run(
            self.command(["gateway", interface, ssid, password])
                .masking(3),
        )
        .await
    }

    /// The detected WAN interface, or `None` when the script finds nothing.
    pub async fn wan(&self) -> AppResult<Option<String>> {
        let stdout = self
            .run(self.command(["wan"]))
            .await
            .require("Failed to detect WAN interface")?;
        Ok(Some(stdout).filter(|iface| !iface.is_empty()))
    }
}
