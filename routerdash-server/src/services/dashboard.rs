//! On-demand composition of the dashboard view model.

use crate::AppState;
use routerdash_common::{DashboardView, VpnStatus};
use tracing::warn;

/// Probes every source independently; one failing probe never blanks the others.
pub async fn collect(state: &AppState) -> DashboardView {
    let (system, tailscale, headscale) = tokio::join!(
        state.metrics.snapshot(),
        state.tailscale.status(),
        state.headscale.status(&state.systemd),
    );

    let system = match system {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!("System metrics unavailable: {}", e);
            None
        }
    };
    let tailscale = tailscale.unwrap_or_else(|e| VpnStatus::unavailable(e.to_string()));

    DashboardView {
        system,
        tailscale,
        headscale,
    }
}
