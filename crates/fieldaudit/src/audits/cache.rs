use serde_json::Value;

use super::domain::SessionId;

/// Read models a host may cache per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Progress,
    Report,
}

impl ViewKind {
    pub const fn label(self) -> &'static str {
        match self {
            ViewKind::Progress => "progress",
            ViewKind::Report => "report",
        }
    }
}

/// Cache for rendered read models, scoped by session and view kind.
///
/// The engine treats cached views as advisory: every mutating operation
/// against a session must invalidate all of that session's views, and a miss
/// simply re-renders from the repository.
pub trait ViewCache: Send + Sync {
    fn get(&self, session_id: &SessionId, kind: ViewKind) -> Option<Value>;
    fn put(&self, session_id: &SessionId, kind: ViewKind, view: Value);
    fn invalidate(&self, session_id: &SessionId);
}

/// Cache that stores nothing, for hosts that render every view on demand.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopViewCache;

impl ViewCache for NoopViewCache {
    fn get(&self, _session_id: &SessionId, _kind: ViewKind) -> Option<Value> {
        None
    }

    fn put(&self, _session_id: &SessionId, _kind: ViewKind, _view: Value) {}

    fn invalidate(&self, _session_id: &SessionId) {}
}
