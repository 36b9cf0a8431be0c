use crate::cli::ServeArgs;
use crate::infra::{build_services, sample_project, AppState, LoggingPublisher};
use crate::routes::with_workflow_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use project_escrow::config::AppConfig;
use project_escrow::error::AppError;
use project_escrow::telemetry;
use project_escrow::workflows::{InMemoryStore, SystemClock};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let today = chrono::Utc::now().date_naive();
    let store = Arc::new(InMemoryStore::with_projects([sample_project(today)]));
    let (applications, milestones) = build_services(
        store,
        Arc::new(LoggingPublisher::default()),
        config.engine.clone(),
        Arc::new(SystemClock),
    );

    let app = with_workflow_routes(applications, milestones)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        rejection_policy = ?config.engine.rejection_policy,
        "screening and escrow engine ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
