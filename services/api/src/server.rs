use crate::cli::ServeArgs;
use crate::infra::{
    builtin_catalog, default_policy, AppState, InMemoryScheduleStore, InMemorySessionRepository,
    MemoryViewCache,
};
use crate::routes::with_audit_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use fieldaudit::audits::router::RouterState;
use fieldaudit::audits::service::AuditService;
use fieldaudit::config::AppConfig;
use fieldaudit::error::AppError;
use fieldaudit::telemetry;
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

    let mut catalog = builtin_catalog()?;
    if let Some(path) = config.catalog.template_path.as_ref() {
        let template_id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "configured".to_string());
        catalog.load_path(&template_id, path)?;
        info!(%template_id, path = %path.display(), "loaded configured checklist template");
    }

    let repository = Arc::new(InMemorySessionRepository::default());
    let schedules = Arc::new(InMemoryScheduleStore::default());
    let templates = Arc::new(catalog);
    let service = Arc::new(AuditService::new(repository, schedules, templates));
    let state = RouterState {
        service,
        policy: Arc::new(default_policy()),
        cache: Arc::new(MemoryViewCache::default()),
    };

    let app = with_audit_routes(state)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "audit service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
