pub mod auth;
pub mod dashboard;
pub mod headscale;
pub mod system;
pub mod tailscale;
pub mod wifi;

use crate::error::{AppError, AppResult};
use crate::services::runner::CommandResult;
use crate::AppState;
use auth::Operator;
use axum::Json;
use serde::Serialize;

/// `{"success": true, ...}` around a view model that has no `success` field of its own.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
    })
}

/// Writes one audit entry for a mutating command and turns a failure into a
/// 500 carrying the tool's stderr. Returns the command's stdout on success.
pub(crate) async fn audited(
    state: &AppState,
    operator: &Operator,
    action: &str,
    detail: &str,
    result: CommandResult,
    failure: &str,
) -> AppResult<String> {
    if result.success {
        state
            .db
            .log_action(&operator.username, action, detail, true)
            .await;
        Ok(result.stdout)
    } else {
        state
            .db
            .log_action(
                &operator.username,
                action,
                &format!("Failed: {}", result.stderr),
                false,
            )
            .await;
        Err(AppError::CommandFailed(format!(
            "{}: {}",
            failure, result.stderr
        )))
    }
}
