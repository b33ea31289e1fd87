use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub port: u16,
    pub host: String,
    pub log_level: String,
    pub log_format: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthSettings {
    pub users_file: String,
    pub realm: String,
}

/// Locations of the external tools the panel drives.
#[derive(Debug, Deserialize, Clone)]
pub struct ToolSettings {
    pub tailscale: String,
    pub headscale: String,
    pub systemctl: String,
    pub journalctl: String,
    pub wifi_manager: String,
    pub command_timeout_secs: u64,
    pub thermal_zone: String,
}

impl ToolSettings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistorySettings {
    pub enabled: bool,
    pub default_limit: u32,
    pub max_rows: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub tools: ToolSettings,
    pub history: HistorySettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        validate_settings(&settings, &run_mode)?;
        Ok(settings)
    }

    /// Built-in defaults only, without reading files or the environment.
    pub fn default_only() -> Result<Self, ConfigError> {
        Self::defaults()?.build()?.try_deserialize()
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.port", 8088)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.log_level", "info")?
            .set_default("server.log_format", "text")?
            .set_default("server.request_timeout_secs", 90)?
            .set_default(
                "database.url",
                "sqlite:///var/lib/igel-dashboard/dashboard.db",
            )?
            .set_default("auth.users_file", "/etc/igel-dashboard/users.json")?
            .set_default("auth.realm", "Router Dashboard")?
            .set_default("tools.tailscale", "tailscale")?
            .set_default("tools.headscale", "headscale")?
            .set_default("tools.systemctl", "systemctl")?
            .set_default("tools.journalctl", "journalctl")?
            .set_default("tools.wifi_manager", "/usr/local/bin/wifi-manager.sh")?
            .set_default("tools.command_timeout_secs", 30)?
            .set_default(
                "tools.thermal_zone",
                "/sys/class/thermal/thermal_zone0/temp",
            )?
            .set_default("history.enabled", true)?
            .set_default("history.default_limit", 100)?
            .set_default("history.max_rows", 10_000)
    }
}

fn validate_settings(settings: &Settings, run_mode: &str) -> Result<(), ConfigError> {
    let mut bad = Vec::new();
    if settings.tools.command_timeout_secs == 0 {
        bad.push("tools.command_timeout_secs");
    }
    if settings.server.request_timeout_secs <= settings.tools.command_timeout_secs {
        bad.push("server.request_timeout_secs");
    }
    if settings.history.max_rows == 0 {
        bad.push("history.max_rows");
    }
    if is_production(run_mode) && settings.auth.users_file.trim().is_empty() {
        bad.push("auth.users_file");
    }

    if !bad.is_empty() {
        return Err(ConfigError::Message(format!(
            "config invalid: {}",
            bad.join(", ")
        )));
    }

    Ok(())
}

fn is_production(run_mode: &str) -> bool {
    matches!(run_mode.to_lowercase().as_str(), "production" | "prod")
}
