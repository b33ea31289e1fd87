use crate::handlers::{ok, Envelope};
use crate::services::dashboard;
use crate::AppState;
use axum::{extract::State, response::Html, Json};
use routerdash_common::DashboardView;
use std::sync::Arc;

const PAGE: &str = include_str!("../../assets/dashboard.html");

pub async fn index() -> Html<&'static str> {
    Html(PAGE)
}

#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses((status = 200, description = "System, VPN and coordination server at a glance", body = DashboardView))
)]
pub async fn get_dashboard(State(state): State<Arc<AppState>>) -> Json<Envelope<DashboardView>> {
    ok(dashboard::collect(&state).await)
}
