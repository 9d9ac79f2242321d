//! Audit execution engine: session lifecycle with idempotent creation,
//! atomic response batches, derived values, completion gating, scoring, and
//! ranked corrective-action plans.

pub mod action_plan;
pub(crate) mod batch;
pub mod cache;
pub mod catalog;
pub(crate) mod completion;
pub(crate) mod derived;
pub mod domain;
pub mod progress;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod template;

#[cfg(test)]
mod tests;

pub use action_plan::{
    ActionPlanEntry, ActionPlanPolicy, ActionStatus, DueDayOffsets, DEFAULT_OWNER,
    MAX_PLAN_ENTRIES,
};
pub use batch::{BatchOutcome, BatchRejection, BatchRequest, ResponseWrite};
pub use cache::{NoopViewCache, ViewCache, ViewKind};
pub use catalog::{CatalogError, TemplateCatalog};
pub use domain::{
    Aggregate, AuditSession, DerivedSpec, InputType, ItemId, ItemResponse, ItemStatus,
    OptionChoice, OptionId, ResponseValue, ScheduleId, ScheduledAuditBinding, SessionId,
    SessionStatus, Severity, TemplateItemSnapshot, TemplateSnapshot, MAX_RESCHEDULES,
};
pub use progress::{CategoryStatus, ItemProgressView, ProgressView, SessionView};
pub use repository::{
    RepositoryError, ScheduleStore, SessionInsert, SessionRecord, SessionRepository,
};
pub use router::{audit_router, RescheduleRequest, RouterState};
pub use scoring::{CategoryScore, Exclusion, ItemScore, ScoreReport, ScoreSummary};
pub use service::{AuditReportView, AuditService, SessionError, StartOutcome, StartRequest};
pub use template::{TemplateDirectory, TemplateError};
