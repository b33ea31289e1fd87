use axum::{
    routing::{get, post},
    Json, Router,
};
use axum_prometheus::PrometheusMetricLayer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use utoipa::OpenApi;

pub mod config;
pub mod error;
pub mod handlers;
pub mod services;

use routerdash_common::{
    ApStartRequest, ApStopRequest, AuditEntry, AuditResponse, BackendState, DashboardView,
    ErrorResponse, GatewayRequest, HeadscaleStatus, HistoryResponse, InterfacesResponse,
    KeyStatusResponse, LogsResponse, ManagedService, MessageResponse, NamespaceCreatedResponse,
    NamespaceRequest, NamespacesResponse, NodesResponse, PeerSummary, PreauthKeyRequest,
    PreauthKeyResponse, RestartServiceRequest, RoutesRequest, RoutesResponse,
    SystemHistoryEntry, SystemSnapshot, ToggleExitNodeResponse, VpnHistoryResponse, VpnSnapshot,
    VpnStatus, WanResponse,
    WifiActionResponse, WifiConnectRequest, WifiNetwork, WifiScanResponse, WifiStatusResponse,
};
use services::{
    auth::Credentials,
    db::Database,
    headscale::Headscale,
    metrics::MetricsCollector,
    runner::{CommandRunner, SystemRunner},
    systemd::Systemd,
    tailscale::Tailscale,
    wifi::WifiManager,
};

pub struct AppState {
    pub db: Database,
    pub settings: config::Settings,
    pub credentials: Credentials,
    pub tailscale: Tailscale,
    pub headscale: Headscale,
    pub systemd: Systemd,
    pub wifi: WifiManager,
    pub metrics: MetricsCollector,
}

impl AppState {
    /// Every tool wrapper shares one runner, so tests can swap in a scripted one.
    pub fn new(
        settings: config::Settings,
        db: Database,
        credentials: Credentials,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let tools = &settings.tools;
        let timeout = tools.command_timeout();
        Self {
            tailscale: Tailscale::new(runner.clone(), tools.tailscale.clone(), timeout),
            headscale: Headscale::new(runner.clone(), tools.headscale.clone(), timeout),
            systemd: Systemd::new(
                runner.clone(),
                tools.systemctl.clone(),
                tools.journalctl.clone(),
                timeout,
            ),
            wifi: WifiManager::new(runner, tools.wifi_manager.clone(), timeout),
            metrics: MetricsCollector::new(tools.thermal_zone.clone()),
            db,
            credentials,
            settings,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::dashboard::get_dashboard,
        handlers::system::get_status,
        handlers::system::get_history,
        handlers::system::restart_service,
        handlers::system::get_logs,
        handlers::system::get_audit,
        handlers::tailscale::get_status,
        handlers::tailscale::get_history,
        handlers::tailscale::toggle_exit_node,
        handlers::tailscale::get_routes,
        handlers::tailscale::update_routes,
        handlers::tailscale::key_status,
        handlers::tailscale::rotate_key,
        handlers::headscale::get_status,
        handlers::headscale::list_nodes,
        handlers::headscale::list_namespaces,
        handlers::headscale::create_namespace,
        handlers::headscale::generate_preauth_key,
        handlers::wifi::scan,
        handlers::wifi::connect,
        handlers::wifi::status,
        handlers::wifi::interfaces,
        handlers::wifi::start_ap,
        handlers::wifi::stop_ap,
        handlers::wifi::gateway,
        handlers::wifi::wan,
    ),
    components(
        schemas(
            BackendState,
            PeerSummary,
            VpnStatus,
            SystemSnapshot,
            SystemHistoryEntry,
            VpnSnapshot,
            AuditEntry,
            HeadscaleStatus,
            WifiNetwork,
            DashboardView,
            ManagedService,
            RoutesRequest,
            NamespaceRequest,
            PreauthKeyRequest,
            RestartServiceRequest,
            WifiConnectRequest,
            ApStartRequest,
            ApStopRequest,
            GatewayRequest,
            MessageResponse,
            ToggleExitNodeResponse,
            RoutesResponse,
            KeyStatusResponse,
            PreauthKeyResponse,
            NodesResponse,
            NamespacesResponse,
            NamespaceCreatedResponse,
            LogsResponse,
            WifiScanResponse,
            WifiStatusResponse,
            InterfacesResponse,
            WifiActionResponse,
            WanResponse,
            AuditResponse,
            HistoryResponse,
            VpnHistoryResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Router Dashboard", description = "Appliance status and administration API")
    )
)]
pub struct ApiDoc;

/// The full HTTP surface minus process-global layers (metrics recorder, rate limiter).
pub fn app(state: Arc<AppState>) -> Router {
    build(state, Router::new())
}

fn build(state: Arc<AppState>, extra: Router<Arc<AppState>>) -> Router {
    let request_timeout = Duration::from_secs(state.settings.server.request_timeout_secs);

    Router::new()
        .route("/", get(handlers::dashboard::index))
        .route("/health", get(health_check))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route("/api/dashboard", get(handlers::dashboard::get_dashboard))
        .route("/api/audit", get(handlers::system::get_audit))
        .nest("/api/system", system_routes())
        .nest("/api/tailscale", tailscale_routes())
        .nest("/api/headscale", headscale_routes())
        .nest("/api/wifi", wifi_routes())
        .merge(extra)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            handlers::auth::require_operator,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri().path(),
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            status = %response.status(),
                            latency = ?latency,
                            "finished processing request"
                        )
                    },
                ),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

fn system_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(handlers::system::get_status))
        .route("/history", get(handlers::system::get_history))
        .route("/restart-service", post(handlers::system::restart_service))
        .route("/logs/:service", get(handlers::system::get_logs))
}

fn tailscale_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(handlers::tailscale::get_status))
        .route("/history", get(handlers::tailscale::get_history))
        .route(
            "/toggle-exit-node",
            post(handlers::tailscale::toggle_exit_node),
        )
        .route(
            "/routes",
            get(handlers::tailscale::get_routes).post(handlers::tailscale::update_routes),
        )
        .route("/key-status", get(handlers::tailscale::key_status))
        .route("/rotate-key", post(handlers::tailscale::rotate_key))
}

fn headscale_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(handlers::headscale::get_status))
        .route("/nodes", get(handlers::headscale::list_nodes))
        .route(
            "/namespaces",
            get(handlers::headscale::list_namespaces).post(handlers::headscale::create_namespace),
        )
        .route(
            "/generate-key",
            post(handlers::headscale::generate_preauth_key),
        )
}

fn wifi_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/scan", get(handlers::wifi::scan))
        .route("/connect", post(handlers::wifi::connect))
        .route("/status", get(handlers::wifi::status))
        .route("/interfaces", get(handlers::wifi::interfaces))
        .route("/ap/start", post(handlers::wifi::start_ap))
        .route("/ap/stop", post(handlers::wifi::stop_ap))
        .route("/gateway", post(handlers::wifi::gateway))
        .route("/wan", get(handlers::wifi::wan))
}

async fn health_check() -> &'static str {
    "OK"
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = config::Settings::new()?;
    init_tracing(&settings.server);

    let credentials = Credentials::load(&settings.auth.users_file)?;
    if credentials.is_empty() {
        tracing::warn!(
            "No operators configured in {}; every request will be rejected",
            settings.auth.users_file
        );
    }

    let db = Database::new(&settings.database.url)
        .await?
        .with_history_limit(settings.history.max_rows);
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
    let state = Arc::new(AppState::new(settings.clone(), db, credentials, runner));

    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(500)
            .burst_size(30)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limiter configuration"))?,
    );

    let metrics = Router::new().route(
        "/metrics",
        get(move || {
            let handle = metric_handle.clone();
            async move { handle.render() }
        }),
    );

    let app = build(state.clone(), metrics)
        .layer(prometheus_layer)
        .layer(GovernorLayer {
            config: governor_config,
        });

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Router dashboard listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    state.db.close().await;
    Ok(())
}

fn init_tracing(server: &config::ServerSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "routerdash_server={},tower_http=info",
            server.log_level
        )
        .into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    if server.log_format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down gracefully...");
}
