use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;

use super::action_plan::ActionPlanPolicy;
use super::batch::BatchRequest;
use super::cache::{ViewCache, ViewKind};
use super::domain::{ScheduleId, SessionId};
use super::progress::SessionView;
use super::repository::{RepositoryError, ScheduleStore, SessionRepository};
use super::service::{AuditService, SessionError, StartOutcome, StartRequest};
use super::template::{TemplateDirectory, TemplateError};

/// Shared state behind the audit endpoints: the service, the action-plan
/// policy, and the scoped read-model cache.
pub struct RouterState<R, S, T, C> {
    pub service: Arc<AuditService<R, S, T>>,
    pub policy: Arc<ActionPlanPolicy>,
    pub cache: Arc<C>,
}

impl<R, S, T, C> Clone for RouterState<R, S, T, C> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            policy: Arc::clone(&self.policy),
            cache: Arc::clone(&self.cache),
        }
    }
}

/// Body for moving a scheduled audit to a new date.
#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleRequest {
    pub new_date: NaiveDate,
}

/// Router builder exposing the audit lifecycle and read-model endpoints.
pub fn audit_router<R, S, T, C>(state: RouterState<R, S, T, C>) -> Router
where
    R: SessionRepository + 'static,
    S: ScheduleStore + 'static,
    T: TemplateDirectory + 'static,
    C: ViewCache + 'static,
{
    Router::new()
        .route("/api/v1/audits", post(start_handler::<R, S, T, C>))
        .route(
            "/api/v1/audits/:session_id",
            get(progress_handler::<R, S, T, C>),
        )
        .route(
            "/api/v1/audits/:session_id/items",
            put(apply_handler::<R, S, T, C>),
        )
        .route(
            "/api/v1/audits/:session_id/complete",
            post(complete_handler::<R, S, T, C>),
        )
        .route(
            "/api/v1/audits/:session_id/report",
            get(report_handler::<R, S, T, C>),
        )
        .route(
            "/api/v1/schedules/:scheduled_id/reschedule",
            post(reschedule_handler::<R, S, T, C>),
        )
        .with_state(state)
}

pub(crate) async fn start_handler<R, S, T, C>(
    State(state): State<RouterState<R, S, T, C>>,
    axum::Json(request): axum::Json<StartRequest>,
) -> Response
where
    R: SessionRepository + 'static,
    S: ScheduleStore + 'static,
    T: TemplateDirectory + 'static,
    C: ViewCache + 'static,
{
    let today = Local::now().date_naive();
    match state.service.start(request, today) {
        Ok(StartOutcome::Created(record)) => {
            let view = SessionView::from_session(&record.session);
            (StatusCode::CREATED, axum::Json(view)).into_response()
        }
        Ok(StartOutcome::Existing(record)) => {
            let view = SessionView::from_session(&record.session);
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn apply_handler<R, S, T, C>(
    State(state): State<RouterState<R, S, T, C>>,
    Path(session_id): Path<String>,
    axum::Json(request): axum::Json<BatchRequest>,
) -> Response
where
    R: SessionRepository + 'static,
    S: ScheduleStore + 'static,
    T: TemplateDirectory + 'static,
    C: ViewCache + 'static,
{
    let session_id = SessionId(session_id);
    match state.service.apply(&session_id, &request) {
        Ok(applied) => {
            state.cache.invalidate(&session_id);
            let payload = json!({ "applied": applied });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn complete_handler<R, S, T, C>(
    State(state): State<RouterState<R, S, T, C>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: SessionRepository + 'static,
    S: ScheduleStore + 'static,
    T: TemplateDirectory + 'static,
    C: ViewCache + 'static,
{
    let session_id = SessionId(session_id);
    match state.service.complete(&session_id) {
        Ok(session) => {
            state.cache.invalidate(&session_id);
            let view = SessionView::from_session(&session);
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn progress_handler<R, S, T, C>(
    State(state): State<RouterState<R, S, T, C>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: SessionRepository + 'static,
    S: ScheduleStore + 'static,
    T: TemplateDirectory + 'static,
    C: ViewCache + 'static,
{
    let session_id = SessionId(session_id);
    if let Some(cached) = state.cache.get(&session_id, ViewKind::Progress) {
        return (StatusCode::OK, axum::Json(cached)).into_response();
    }

    match state.service.progress(&session_id) {
        Ok(view) => match serde_json::to_value(&view) {
            Ok(value) => {
                state.cache.put(&session_id, ViewKind::Progress, value.clone());
                (StatusCode::OK, axum::Json(value)).into_response()
            }
            Err(error) => internal_error(error),
        },
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn report_handler<R, S, T, C>(
    State(state): State<RouterState<R, S, T, C>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: SessionRepository + 'static,
    S: ScheduleStore + 'static,
    T: TemplateDirectory + 'static,
    C: ViewCache + 'static,
{
    let session_id = SessionId(session_id);
    if let Some(cached) = state.cache.get(&session_id, ViewKind::Report) {
        return (StatusCode::OK, axum::Json(cached)).into_response();
    }

    match state.service.report(&session_id, &state.policy) {
        Ok(view) => match serde_json::to_value(&view) {
            Ok(value) => {
                state.cache.put(&session_id, ViewKind::Report, value.clone());
                (StatusCode::OK, axum::Json(value)).into_response()
            }
            Err(error) => internal_error(error),
        },
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn reschedule_handler<R, S, T, C>(
    State(state): State<RouterState<R, S, T, C>>,
    Path(scheduled_id): Path<String>,
    axum::Json(request): axum::Json<RescheduleRequest>,
) -> Response
where
    R: SessionRepository + 'static,
    S: ScheduleStore + 'static,
    T: TemplateDirectory + 'static,
    C: ViewCache + 'static,
{
    let scheduled_id = ScheduleId(scheduled_id);
    match state.service.reschedule(&scheduled_id, request.new_date) {
        Ok(binding) => (StatusCode::OK, axum::Json(binding)).into_response(),
        Err(error) => error_response(&error),
    }
}

fn error_response(error: &SessionError) -> Response {
    let status = match error {
        SessionError::Validation(_)
        | SessionError::NotScheduledToday { .. }
        | SessionError::QuotaExceeded => StatusCode::BAD_REQUEST,
        SessionError::Incomplete { .. }
        | SessionError::DedupConflict { .. }
        | SessionError::AlreadyCompleted
        | SessionError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        SessionError::TemplateNotFound(_)
        | SessionError::SessionNotFound
        | SessionError::ScheduleNotFound
        | SessionError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        SessionError::Repository(RepositoryError::Unavailable(_))
        | SessionError::Template(TemplateError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
    };

    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

fn internal_error<E: std::fmt::Display>(error: E) -> Response {
    let payload = json!({
        "error": error.to_string(),
    });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
}
