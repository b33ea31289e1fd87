use crate::error::AppResult;
use chrono::Utc;
use routerdash_common::SystemSnapshot;
use std::path::{Path, PathBuf};
use sysinfo::{Disks, Networks, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tracing::debug;

/// Reads instantaneous OS counters. Nothing is smoothed or cached between calls.
pub struct MetricsCollector {
    thermal_zone: PathBuf,
}

impl MetricsCollector {
    pub fn new(thermal_zone: impl Into<PathBuf>) -> Self {
        Self {
            thermal_zone: thermal_zone.into(),
        }
    }

    pub async fn snapshot(&self) -> AppResult<SystemSnapshot> {
        let mut snapshot = tokio::task::spawn_blocking(sample_counters)
            .await
            .map_err(anyhow::Error::from)?;
        snapshot.temperature = read_temperature(&self.thermal_zone).await;
        Ok(snapshot)
    }
}

fn sample_counters() -> SystemSnapshot {
    let mut sys = System::new();
    // CPU usage is a delta, so it needs two samples.
    sys.refresh_cpu();
    std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu();
    sys.refresh_memory();

    let mem_total = sys.total_memory();
    let mem_used = sys.used_memory();

    let disks = Disks::new_with_refreshed_list();
    let root = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .or_else(|| disks.list().first());
    let (disk_total, disk_used) = root
        .map(|d| {
            let total = d.total_space();
            (total, total.saturating_sub(d.available_space()))
        })
        .unwrap_or((0, 0));

    let networks = Networks::new_with_refreshed_list();
    let (net_bytes_sent, net_bytes_recv) = networks
        .list()
        .iter()
        .filter(|(name, _)| name.as_str() != "lo")
        .fold((0u64, 0u64), |(sent, recv), (_, data)| {
            (
                sent.saturating_add(data.total_transmitted()),
                recv.saturating_add(data.total_received()),
            )
        });

    SystemSnapshot {
        timestamp: Utc::now(),
        cpu_pct: sys.global_cpu_info().cpu_usage(),
        mem_pct: percent(mem_used, mem_total),
        mem_used,
        mem_total,
        disk_pct: percent(disk_used, disk_total),
        disk_used,
        disk_total,
        temperature: None,
        net_bytes_sent,
        net_bytes_recv,
        uptime_secs: System::uptime(),
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}

/// Millidegrees Celsius from a thermal-zone file; absent or unreadable is `None`.
async fn read_temperature(path: &Path) -> Option<f64> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| debug!("No temperature from {}: {}", path.display(), e))
        .ok()?;
    parse_millidegrees(&raw)
}

fn parse_millidegrees(raw: &str) -> Option<f64> {
    raw.trim().parse::<i64>().ok().map(|m| m as f64 / 1000.0)
}
