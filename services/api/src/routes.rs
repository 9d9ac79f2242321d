use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use fieldaudit::audits::cache::ViewCache;
use fieldaudit::audits::repository::{ScheduleStore, SessionRepository};
use fieldaudit::audits::router::{audit_router, RouterState};
use fieldaudit::audits::template::TemplateDirectory;
use serde_json::json;

/// Audit lifecycle and read-model endpoints plus the service plumbing
/// routes every deployment carries.
pub(crate) fn with_audit_routes<R, S, T, C>(state: RouterState<R, S, T, C>) -> axum::Router
where
    R: SessionRepository + 'static,
    S: ScheduleStore + 'static,
    T: TemplateDirectory + 'static,
    C: ViewCache + 'static,
{
    audit_router(state)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
