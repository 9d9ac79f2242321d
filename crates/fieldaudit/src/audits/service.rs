use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::action_plan::{self, ActionPlanEntry, ActionPlanPolicy};
use super::batch::{self, BatchRejection, BatchRequest};
use super::domain::{
    AuditSession, ItemResponse, ScheduleId, ScheduledAuditBinding, SessionId, SessionStatus,
};
use super::progress::{self, ProgressView, SessionView};
use super::repository::{
    RepositoryError, ScheduleStore, SessionInsert, SessionRecord, SessionRepository,
};
use super::scoring::{self, CategoryScore, ItemScore, ScoreSummary};
use super::template::{TemplateDirectory, TemplateError};

/// Service composing the template directory, session store, and schedule
/// store into the audit lifecycle operations.
pub struct AuditService<R, S, T> {
    repository: Arc<R>,
    schedules: Arc<S>,
    templates: Arc<T>,
}

static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> SessionId {
    let id = SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SessionId(format!("audit-{id:06}"))
}

/// Inputs for creating an audit session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub template_id: String,
    pub location_id: String,
    pub principal: String,
    #[serde(default)]
    pub dedup_token: Option<String>,
    #[serde(default)]
    pub scheduled_id: Option<ScheduleId>,
}

/// Result of `start`: either a fresh session, or the stored session a
/// retried request resolves to.
#[derive(Debug, Clone)]
pub enum StartOutcome {
    Created(SessionRecord),
    Existing(SessionRecord),
}

impl StartOutcome {
    pub fn record(&self) -> &SessionRecord {
        match self {
            StartOutcome::Created(record) | StartOutcome::Existing(record) => record,
        }
    }

    pub fn into_record(self) -> SessionRecord {
        match self {
            StartOutcome::Created(record) | StartOutcome::Existing(record) => record,
        }
    }
}

/// Read model backing the report surface: totals, per-category rollups,
/// per-item detail, and the ranked corrective-action plan.
#[derive(Debug, Clone, Serialize)]
pub struct AuditReportView {
    pub session: SessionView,
    pub summary: ScoreSummary,
    pub score_by_category: Vec<CategoryScore>,
    pub items: Vec<ItemScore>,
    pub action_plan: Vec<ActionPlanEntry>,
}

impl<R, S, T> AuditService<R, S, T>
where
    R: SessionRepository + 'static,
    S: ScheduleStore + 'static,
    T: TemplateDirectory + 'static,
{
    pub fn new(repository: Arc<R>, schedules: Arc<S>, templates: Arc<T>) -> Self {
        Self {
            repository,
            schedules,
            templates,
        }
    }

    /// Create a session, absorbing duplicate submissions.
    ///
    /// A request whose dedup token already belongs to a session for the same
    /// principal, template, and location returns that session unchanged; the
    /// same token under a different tuple is a conflict. A request bound to
    /// a schedule only proceeds when `today` matches the schedule's current
    /// date.
    pub fn start(
        &self,
        request: StartRequest,
        today: NaiveDate,
    ) -> Result<StartOutcome, SessionError> {
        if let Some(token) = request.dedup_token.as_deref() {
            if let Some(existing) = self.repository.find_by_token(token)? {
                return if matches_request(&existing.session, &request) {
                    info!(session_id = %existing.session.session_id, "duplicate start absorbed");
                    Ok(StartOutcome::Existing(existing))
                } else {
                    Err(SessionError::DedupConflict {
                        token: token.to_string(),
                    })
                };
            }
        }

        if let Some(scheduled_id) = request.scheduled_id.as_ref() {
            let binding = self
                .schedules
                .fetch(scheduled_id)?
                .ok_or(SessionError::ScheduleNotFound)?;
            if binding.current_scheduled_date != today {
                return Err(SessionError::NotScheduledToday {
                    scheduled_for: binding.current_scheduled_date,
                    today,
                });
            }
        }

        let snapshot = self
            .templates
            .snapshot(&request.template_id)?
            .ok_or_else(|| SessionError::TemplateNotFound(request.template_id.clone()))?;

        let session = AuditSession {
            session_id: next_session_id(),
            template_id: request.template_id.clone(),
            location_id: request.location_id.clone(),
            created_by: request.principal.clone(),
            status: SessionStatus::Draft,
            client_dedup_token: request.dedup_token.clone(),
            scheduled_binding: request.scheduled_id.clone(),
            created_at: Utc::now(),
            completed_at: None,
        };

        let record = SessionRecord {
            session,
            snapshot,
            responses: BTreeMap::new(),
        };

        // The atomic insert closes the race two concurrent retries leave
        // open between the token lookup above and this write.
        match self.repository.insert(record)? {
            SessionInsert::Created(record) => {
                info!(
                    session_id = %record.session.session_id,
                    template_id = %record.session.template_id,
                    "audit session created"
                );
                Ok(StartOutcome::Created(record))
            }
            SessionInsert::Existing(existing) => {
                if matches_request(&existing.session, &request) {
                    info!(session_id = %existing.session.session_id, "duplicate start absorbed");
                    Ok(StartOutcome::Existing(existing))
                } else {
                    Err(SessionError::DedupConflict {
                        token: request.dedup_token.clone().unwrap_or_default(),
                    })
                }
            }
        }
    }

    /// Move a scheduled audit to a new date, past or future, until the
    /// reschedule quota is spent.
    pub fn reschedule(
        &self,
        scheduled_id: &ScheduleId,
        new_date: NaiveDate,
    ) -> Result<ScheduledAuditBinding, SessionError> {
        let mut binding = self
            .schedules
            .fetch(scheduled_id)?
            .ok_or(SessionError::ScheduleNotFound)?;

        if binding.quota_exhausted() {
            return Err(SessionError::QuotaExceeded);
        }

        binding.reschedule_count += 1;
        binding.current_scheduled_date = new_date;
        self.schedules.update(binding.clone())?;
        Ok(binding)
    }

    /// Apply a response batch as one atomic unit, returning the rows it
    /// changed. A draft session moves to in-progress on its first batch;
    /// a completed session accepts no further writes.
    pub fn apply(
        &self,
        session_id: &SessionId,
        request: &BatchRequest,
    ) -> Result<Vec<ItemResponse>, SessionError> {
        let mut record = self.fetch_record(session_id)?;

        if record.session.status == SessionStatus::Completed {
            return Err(SessionError::AlreadyCompleted);
        }

        let outcome = match batch::plan(&record.snapshot, &record.responses, request) {
            Ok(outcome) => outcome,
            Err(rejection) => {
                warn!(session_id = %session_id, %rejection, "response batch rejected");
                return Err(rejection.into());
            }
        };

        record.responses = outcome.responses;
        if record.session.status == SessionStatus::Draft {
            record.session.status = SessionStatus::InProgress;
            info!(session_id = %session_id, "audit session in progress");
        }
        self.repository.update(record)?;

        Ok(outcome.applied)
    }

    /// Close a session once every category's required items are complete.
    /// Completing an already-completed session is a no-op success, so a
    /// retried completion request never errors.
    pub fn complete(&self, session_id: &SessionId) -> Result<AuditSession, SessionError> {
        let mut record = self.fetch_record(session_id)?;

        if record.session.status == SessionStatus::Completed {
            return Ok(record.session);
        }

        let statuses = progress::category_status(&record.snapshot, &record.responses);
        let incomplete = progress::incomplete_categories(&statuses);
        if !incomplete.is_empty() {
            return Err(SessionError::Incomplete {
                categories: incomplete,
            });
        }

        record.session.status = SessionStatus::Completed;
        record.session.completed_at = Some(Utc::now());
        self.repository.update(record.clone())?;
        info!(session_id = %session_id, "audit session completed");
        Ok(record.session)
    }

    /// Progress read model for the in-flight audit screen.
    pub fn progress(&self, session_id: &SessionId) -> Result<ProgressView, SessionError> {
        let record = self.fetch_record(session_id)?;
        Ok(record.progress_view())
    }

    /// Score report plus corrective-action plan. Due dates anchor on the
    /// completion date, falling back to the creation date for sessions still
    /// in flight.
    pub fn report(
        &self,
        session_id: &SessionId,
        policy: &ActionPlanPolicy,
    ) -> Result<AuditReportView, SessionError> {
        let record = self.fetch_record(session_id)?;

        let report = scoring::score(&record.snapshot, &record.responses);
        let anchor = record
            .session
            .completed_at
            .map(|completed_at| completed_at.date_naive())
            .unwrap_or_else(|| record.session.created_at.date_naive());
        let action_plan =
            action_plan::generate(&record.snapshot, &record.responses, &report, policy, anchor);

        Ok(AuditReportView {
            session: SessionView::from_session(&record.session),
            summary: report.summary,
            score_by_category: report.categories,
            items: report.items,
            action_plan,
        })
    }

    fn fetch_record(&self, session_id: &SessionId) -> Result<SessionRecord, SessionError> {
        self.repository
            .fetch(session_id)?
            .ok_or(SessionError::SessionNotFound)
    }
}

fn matches_request(session: &AuditSession, request: &StartRequest) -> bool {
    session.template_id == request.template_id
        && session.location_id == request.location_id
        && session.created_by == request.principal
}

/// Error raised by the audit service.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("template {0} not found")]
    TemplateNotFound(String),
    #[error("audit session not found")]
    SessionNotFound,
    #[error("scheduled audit not found")]
    ScheduleNotFound,
    #[error("audit is scheduled for {scheduled_for}, not {today}")]
    NotScheduledToday {
        scheduled_for: NaiveDate,
        today: NaiveDate,
    },
    #[error("reschedule quota exhausted")]
    QuotaExceeded,
    #[error("dedup token {token} already belongs to a different audit")]
    DedupConflict { token: String },
    #[error("audit session is already completed")]
    AlreadyCompleted,
    #[error("incomplete categories: {}", .categories.join(", "))]
    Incomplete { categories: Vec<String> },
    #[error(transparent)]
    Validation(#[from] BatchRejection),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Template(#[from] TemplateError),
}
