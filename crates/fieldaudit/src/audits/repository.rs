use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{
    AuditSession, ItemId, ItemResponse, ScheduleId, ScheduledAuditBinding, SessionId,
    TemplateSnapshot,
};
use super::progress::{self, ProgressView};

/// Repository record holding the session header, the immutable snapshot it
/// was created against, and every stored response keyed by item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session: AuditSession,
    pub snapshot: TemplateSnapshot,
    pub responses: BTreeMap<ItemId, ItemResponse>,
}

impl SessionRecord {
    pub fn response(&self, item_id: &ItemId) -> Option<&ItemResponse> {
        self.responses.get(item_id)
    }

    pub fn progress_view(&self) -> ProgressView {
        progress::build_progress(&self.session, &self.snapshot, &self.responses)
    }
}

/// Outcome of an insert-if-absent: either the new record was stored, or a
/// session holding the same dedup token already existed and is returned
/// unchanged.
#[derive(Debug, Clone)]
pub enum SessionInsert {
    Created(SessionRecord),
    Existing(SessionRecord),
}

/// Storage abstraction so the service module can be exercised in isolation.
/// `insert` must be atomic per dedup token: two near-simultaneous retries
/// may never both create a row.
pub trait SessionRepository: Send + Sync {
    fn insert(&self, record: SessionRecord) -> Result<SessionInsert, RepositoryError>;
    fn fetch(&self, id: &SessionId) -> Result<Option<SessionRecord>, RepositoryError>;
    fn update(&self, record: SessionRecord) -> Result<(), RepositoryError>;
    fn find_by_token(&self, token: &str) -> Result<Option<SessionRecord>, RepositoryError>;
}

/// Storage abstraction for scheduled-audit bindings.
pub trait ScheduleStore: Send + Sync {
    fn insert(&self, binding: ScheduledAuditBinding) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ScheduleId) -> Result<Option<ScheduledAuditBinding>, RepositoryError>;
    fn update(&self, binding: ScheduledAuditBinding) -> Result<(), RepositoryError>;
}

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
