use crate::error::AppResult;
use chrono::{DateTime, SecondsFormat, Utc};
use routerdash_common::{AuditEntry, SystemHistoryEntry, SystemSnapshot, VpnSnapshot, VpnStatus};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info};

/// Audit trail and status history. Writes are best-effort: a storage failure is
/// logged and swallowed so it never blocks the action being recorded.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    history_max_rows: u32,
}

pub const DEFAULT_HISTORY_MAX_ROWS: u32 = 10_000;

/// Tables pruned to the newest `history_max_rows` rows after every insert.
const SYSTEM_HISTORY: &str = "system_status";
const VPN_HISTORY: &str = "tailscale_status";

impl Database {
    pub async fn new(url: &str) -> AppResult<Self> {
        let in_memory = url.contains(":memory:");
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(if in_memory {
                SqliteJournalMode::Memory
            } else {
                SqliteJournalMode::Wal
            })
            .synchronous(SqliteSynchronous::Normal);

        if !in_memory {
            if let Some(dir) = options.get_filename().parent() {
                if !dir.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(dir)
                        .await
                        .map_err(anyhow::Error::from)?;
                }
            }
        }

        // Every connection to `:memory:` is its own database, so keep exactly one alive.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .max_connections(4)
                .idle_timeout(Duration::from_secs(600))
        };

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database ready at {}", url);

        Ok(Self {
            pool,
            history_max_rows: DEFAULT_HISTORY_MAX_ROWS,
        })
    }

    /// Caps each history table at `max_rows`, oldest rows dropped first.
    pub fn with_history_limit(mut self, max_rows: u32) -> Self {
        self.history_max_rows = max_rows.max(1);
        self
    }

    pub async fn log_action(&self, actor: &str, action: &str, detail: &str, success: bool) {
        if let Err(e) = self.try_log_action(actor, action, detail, success).await {
            error!(actor, action, success, "Failed to log action: {}", e);
        }
    }

    async fn try_log_action(
        &self,
        actor: &str,
        action: &str,
        detail: &str,
        success: bool,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO config_changes (timestamp, actor, action, detail, success) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(db_timestamp(Utc::now()))
        .bind(actor)
        .bind(action)
        .bind(detail)
        .bind(success)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn recent_actions(&self, limit: u32) -> AppResult<Vec<AuditEntry>> {
        Ok(sqlx::query_as::<_, AuditEntry>(
            "SELECT id, timestamp, actor, action, detail, success FROM config_changes ORDER BY timestamp DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn record_system_snapshot(&self, snapshot: &SystemSnapshot) {
        let result = sqlx::query(
            "INSERT INTO system_status (timestamp, cpu_usage, memory_usage, disk_usage, temperature, network_bytes_sent, network_bytes_recv) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(db_timestamp(snapshot.timestamp))
        .bind(f64::from(snapshot.cpu_pct))
        .bind(snapshot.mem_pct)
        .bind(snapshot.disk_pct)
        .bind(snapshot.temperature)
        .bind(to_i64(snapshot.net_bytes_sent))
        .bind(to_i64(snapshot.net_bytes_recv))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => self.prune(SYSTEM_HISTORY).await,
            Err(e) => error!("Failed to record system snapshot: {}", e),
        }
    }

    pub async fn system_history(&self, limit: u32) -> AppResult<Vec<SystemHistoryEntry>> {
        Ok(sqlx::query_as::<_, SystemHistoryEntry>(
            "SELECT id, timestamp, cpu_usage, memory_usage, disk_usage, temperature, network_bytes_sent, network_bytes_recv FROM system_status ORDER BY timestamp DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn record_vpn_status(&self, status: &VpnStatus) {
        let result = sqlx::query(
            "INSERT INTO tailscale_status (timestamp, status, self_ip, exit_node_enabled, subnet_routes, connected_peers) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(db_timestamp(Utc::now()))
        .bind(status.backend_state.as_str())
        .bind(&status.self_ip)
        .bind(status.exit_node_enabled)
        .bind(status.advertised_routes.join(","))
        .bind(to_i64(status.peer_count as u64))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => self.prune(VPN_HISTORY).await,
            Err(e) => error!("Failed to record VPN status: {}", e),
        }
    }

    pub async fn vpn_history(&self, limit: u32) -> AppResult<Vec<VpnSnapshot>> {
        Ok(sqlx::query_as::<_, VpnSnapshot>(
            "SELECT id, timestamp, status AS backend_state, self_ip, exit_node_enabled, subnet_routes AS advertised_routes, connected_peers AS peer_count FROM tailscale_status ORDER BY timestamp DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn prune(&self, table: &'static str) {
        let result = sqlx::query(&format!(
            "DELETE FROM {table} WHERE id <= (SELECT MAX(id) FROM {table}) - ?"
        ))
        .bind(i64::from(self.history_max_rows))
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            error!(table, "Failed to prune history: {}", e);
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn db_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
