use crate::services::runner::{CommandLine, CommandResult, CommandRunner};
use routerdash_common::ManagedService;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_LOG_LINES: u32 = 50;
pub const MAX_LOG_LINES: u32 = 1000;

/// `systemctl` and `journalctl`, restricted to [`ManagedService`] units.
pub struct Systemd {
    runner: Arc<dyn CommandRunner>,
    systemctl: String,
    journalctl: String,
    timeout: Duration,
}

impl Systemd {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        systemctl: String,
        journalctl: String,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            systemctl,
            journalctl,
            timeout,
        }
    }

    pub async fn is_active(&self, service: ManagedService) -> CommandResult {
        let command = CommandLine::argv(
            self.systemctl.clone(),
            ["is-active", service.unit_name()],
        );
        self.runner.run(&command, self.timeout).await
    }

    pub async fn restart(&self, service: ManagedService) -> CommandResult {
        info!("Restarting service {}", service);
        let command = CommandLine::argv(self.systemctl.clone(), ["restart", service.unit_name()]);
        self.runner.run(&command, self.timeout).await
    }

    pub async fn logs(&self, service: ManagedService, lines: u32) -> CommandResult {
        let lines = lines.to_string();
        let command = CommandLine::argv(
            self.journalctl.clone(),
            ["-u", service.unit_name(), "-n", lines.as_str(), "--no-pager"],
        );
        self.runner.run(&command, self.timeout).await
    }
}
