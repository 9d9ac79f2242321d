use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{NaiveDate, Utc};
use serde_json::Value;

use crate::audits::batch::{self, BatchRequest, ResponseWrite};
use crate::audits::cache::{ViewCache, ViewKind};
use crate::audits::domain::{
    Aggregate, AuditSession, DerivedSpec, InputType, ItemId, ItemResponse, ItemStatus,
    OptionChoice, OptionId, ResponseValue, ScheduleId, ScheduledAuditBinding, SessionId,
    SessionStatus, TemplateItemSnapshot, TemplateSnapshot,
};
use crate::audits::repository::{
    RepositoryError, ScheduleStore, SessionInsert, SessionRecord, SessionRepository,
};
use crate::audits::router::{audit_router, RouterState};
use crate::audits::service::{AuditService, StartRequest};
use crate::audits::template::{TemplateDirectory, TemplateError};
use crate::audits::{ActionPlanPolicy, Severity};

pub(super) fn item(
    id: &str,
    title: &str,
    category: &str,
    input_type: InputType,
    required: bool,
) -> TemplateItemSnapshot {
    TemplateItemSnapshot {
        item_id: ItemId(id.to_string()),
        title: title.to_string(),
        category: category.to_string(),
        input_type,
        required,
        is_critical: false,
        options: Vec::new(),
        derived_spec: None,
    }
}

/// Yes/No/N-A options with option ids derived from the item id.
pub(super) fn standard_options(item_id: &str) -> Vec<OptionChoice> {
    vec![
        OptionChoice {
            option_id: OptionId(format!("{item_id}-yes")),
            label: "Yes".to_string(),
            score: Some(3.0),
        },
        OptionChoice {
            option_id: OptionId(format!("{item_id}-no")),
            label: "No".to_string(),
            score: Some(0.0),
        },
        OptionChoice {
            option_id: OptionId(format!("{item_id}-na")),
            label: "N/A".to_string(),
            score: None,
        },
    ]
}

pub(super) fn choice_item(
    id: &str,
    title: &str,
    category: &str,
    required: bool,
) -> TemplateItemSnapshot {
    let mut item = item(id, title, category, InputType::SingleChoice, required);
    item.options = standard_options(id);
    item
}

pub(super) fn derived_item(
    id: &str,
    title: &str,
    category: &str,
    depends_on: &[&str],
    required: bool,
) -> TemplateItemSnapshot {
    let mut item = item(id, title, category, InputType::Number, required);
    item.derived_spec = Some(DerivedSpec {
        depends_on: depends_on
            .iter()
            .map(|dependency| ItemId(dependency.to_string()))
            .collect(),
        aggregate: Aggregate::Mean,
    });
    item
}

/// Standard nine-item store-walk template used across the suite: three
/// categories, one critical choice item, a derived average, and required
/// items of four different input types.
pub(super) fn store_walk_snapshot() -> TemplateSnapshot {
    let mut sanitizer = choice_item(
        "fs-sanitizer",
        "Sanitizer buckets at correct concentration",
        "Food Safety",
        true,
    );
    sanitizer.is_critical = true;

    TemplateSnapshot {
        template_id: "store-walk".to_string(),
        items: vec![
            sanitizer,
            choice_item("fs-floor-clean", "Floors clean and dry", "Food Safety", false),
            item(
                "fs-note",
                "Walkthrough notes",
                "Food Safety",
                InputType::OpenEnded,
                false,
            ),
            item(
                "eq-gauge-photo",
                "Cooler gauge photo",
                "Equipment",
                InputType::ImageUpload,
                true,
            ),
            item(
                "eq-attempt-1",
                "Compressor reading, first attempt",
                "Equipment",
                InputType::Number,
                false,
            ),
            item(
                "eq-attempt-2",
                "Compressor reading, second attempt",
                "Equipment",
                InputType::Number,
                false,
            ),
            derived_item(
                "eq-average",
                "Average compressor reading",
                "Equipment",
                &["eq-attempt-1", "eq-attempt-2"],
                true,
            ),
            item(
                "so-manager-sign",
                "Manager signature",
                "Sign-off",
                InputType::Signature,
                true,
            ),
            item(
                "so-walk-done",
                "Walk recorded in shift log",
                "Sign-off",
                InputType::Task,
                false,
            ),
        ],
    }
}

/// One required check next to an optional derived average over two optional
/// readings, for the gating edge where nothing in the category is required
/// except what the resolver owes.
pub(super) fn optional_average_snapshot() -> TemplateSnapshot {
    TemplateSnapshot {
        template_id: "spot-checks".to_string(),
        items: vec![
            choice_item("ck-main", "Main check complete", "Checks", true),
            item(
                "ck-reading-1",
                "Reading one",
                "Checks",
                InputType::Number,
                false,
            ),
            item(
                "ck-reading-2",
                "Reading two",
                "Checks",
                InputType::Number,
                false,
            ),
            derived_item(
                "ck-average",
                "Average reading",
                "Checks",
                &["ck-reading-1", "ck-reading-2"],
                false,
            ),
        ],
    }
}

/// Five numeric attempts feeding one required derived average.
pub(super) fn attempts_snapshot() -> TemplateSnapshot {
    let mut items: Vec<TemplateItemSnapshot> = (1..=5)
        .map(|n| {
            item(
                &format!("attempt-{n}"),
                &format!("Attempt {n}"),
                "Pressure",
                InputType::Number,
                false,
            )
        })
        .collect();
    items.push(derived_item(
        "attempt-average",
        "Average of attempts",
        "Pressure",
        &["attempt-1", "attempt-2", "attempt-3", "attempt-4", "attempt-5"],
        true,
    ));

    TemplateSnapshot {
        template_id: "pressure-check".to_string(),
        items,
    }
}

pub(super) fn select(item_id: &str, option_suffix: &str) -> ResponseWrite {
    ResponseWrite {
        item_id: ItemId(item_id.to_string()),
        value: ResponseValue::Selection {
            option_id: OptionId(format!("{item_id}-{option_suffix}")),
            remark: None,
        },
    }
}

pub(super) fn select_with_remark(item_id: &str, option_suffix: &str, remark: &str) -> ResponseWrite {
    ResponseWrite {
        item_id: ItemId(item_id.to_string()),
        value: ResponseValue::Selection {
            option_id: OptionId(format!("{item_id}-{option_suffix}")),
            remark: Some(remark.to_string()),
        },
    }
}

pub(super) fn number(item_id: &str, value: f64) -> ResponseWrite {
    ResponseWrite {
        item_id: ItemId(item_id.to_string()),
        value: ResponseValue::Number {
            value,
            remark: None,
        },
    }
}

pub(super) fn photo(item_id: &str, url: &str) -> ResponseWrite {
    ResponseWrite {
        item_id: ItemId(item_id.to_string()),
        value: ResponseValue::Photo {
            photo_url: url.to_string(),
        },
    }
}

pub(super) fn text(item_id: &str, comment: &str) -> ResponseWrite {
    ResponseWrite {
        item_id: ItemId(item_id.to_string()),
        value: ResponseValue::Text {
            comment: comment.to_string(),
        },
    }
}

pub(super) fn signature(item_id: &str, strokes: &str) -> ResponseWrite {
    ResponseWrite {
        item_id: ItemId(item_id.to_string()),
        value: ResponseValue::Signature {
            strokes: strokes.to_string(),
        },
    }
}

pub(super) fn acknowledge(item_id: &str) -> ResponseWrite {
    ResponseWrite {
        item_id: ItemId(item_id.to_string()),
        value: ResponseValue::Acknowledged { remark: None },
    }
}

pub(super) fn not_applicable(item_id: &str) -> ResponseWrite {
    ResponseWrite {
        item_id: ItemId(item_id.to_string()),
        value: ResponseValue::NotApplicable { remark: None },
    }
}

pub(super) fn batch(responses: Vec<ResponseWrite>) -> BatchRequest {
    BatchRequest {
        responses,
        category: None,
    }
}

/// Valid answers for every required item in the store-walk template.
pub(super) fn full_batch() -> BatchRequest {
    batch(vec![
        select("fs-sanitizer", "yes"),
        photo("eq-gauge-photo", "https://cdn.example.com/audits/cooler-gauge.jpg"),
        number("eq-attempt-1", 41.0),
        number("eq-attempt-2", 43.0),
        signature("so-manager-sign", "M 10 10 L 120 40"),
    ])
}

/// Build a stored response map by planning a batch over an empty session.
pub(super) fn response_map(
    snapshot: &TemplateSnapshot,
    responses: Vec<ResponseWrite>,
) -> BTreeMap<ItemId, ItemResponse> {
    batch::plan(snapshot, &BTreeMap::new(), &batch(responses))
        .expect("fixture batch plans")
        .responses
}

pub(super) fn stored(item_id: &str, value: ResponseValue) -> ItemResponse {
    ItemResponse {
        item_id: ItemId(item_id.to_string()),
        status: ItemStatus::Pending,
        value,
    }
}

pub(super) fn item_id(id: &str) -> ItemId {
    ItemId(id.to_string())
}

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 14).expect("valid date")
}

pub(super) fn draft_session(session_id: &str) -> AuditSession {
    AuditSession {
        session_id: SessionId(session_id.to_string()),
        template_id: "store-walk".to_string(),
        location_id: "store-042".to_string(),
        created_by: "auditor-7".to_string(),
        status: SessionStatus::Draft,
        client_dedup_token: None,
        scheduled_binding: None,
        created_at: Utc::now(),
        completed_at: None,
    }
}

pub(super) fn start_request() -> StartRequest {
    StartRequest {
        template_id: "store-walk".to_string(),
        location_id: "store-042".to_string(),
        principal: "auditor-7".to_string(),
        dedup_token: None,
        scheduled_id: None,
    }
}

pub(super) fn policy() -> ActionPlanPolicy {
    let mut severity_by_category = BTreeMap::new();
    severity_by_category.insert("Equipment".to_string(), Severity::Major);
    let mut owner_by_category = BTreeMap::new();
    owner_by_category.insert("Sign-off".to_string(), "Store Manager".to_string());
    ActionPlanPolicy {
        severity_by_category,
        owner_by_category,
        ..ActionPlanPolicy::default()
    }
}

pub(super) fn build_service() -> (
    AuditService<MemorySessions, MemorySchedules, StaticTemplates>,
    Arc<MemorySessions>,
    Arc<MemorySchedules>,
) {
    let repository = Arc::new(MemorySessions::default());
    let schedules = Arc::new(MemorySchedules::default());
    let templates = Arc::new(StaticTemplates::new(store_walk_snapshot()));
    let service = AuditService::new(repository.clone(), schedules.clone(), templates);
    (service, repository, schedules)
}

pub(super) fn start_session(
    service: &AuditService<MemorySessions, MemorySchedules, StaticTemplates>,
) -> SessionId {
    service
        .start(start_request(), today())
        .expect("start succeeds")
        .into_record()
        .session
        .session_id
}

#[derive(Default, Clone)]
pub(super) struct MemorySessions {
    pub(super) records: Arc<Mutex<HashMap<SessionId, SessionRecord>>>,
}

impl SessionRepository for MemorySessions {
    fn insert(&self, record: SessionRecord) -> Result<SessionInsert, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if let Some(token) = record.session.client_dedup_token.as_deref() {
            if let Some(existing) = guard
                .values()
                .find(|stored| stored.session.client_dedup_token.as_deref() == Some(token))
            {
                return Ok(SessionInsert::Existing(existing.clone()));
            }
        }
        if guard.contains_key(&record.session.session_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.session.session_id.clone(), record.clone());
        Ok(SessionInsert::Created(record))
    }

    fn fetch(&self, id: &SessionId) -> Result<Option<SessionRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update(&self, record: SessionRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.insert(record.session.session_id.clone(), record);
        Ok(())
    }

    fn find_by_token(&self, token: &str) -> Result<Option<SessionRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .find(|stored| stored.session.client_dedup_token.as_deref() == Some(token))
            .cloned())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemorySchedules {
    bindings: Arc<Mutex<HashMap<ScheduleId, ScheduledAuditBinding>>>,
}

impl ScheduleStore for MemorySchedules {
    fn insert(&self, binding: ScheduledAuditBinding) -> Result<(), RepositoryError> {
        let mut guard = self.bindings.lock().expect("schedule mutex poisoned");
        if guard.contains_key(&binding.scheduled_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(binding.scheduled_id.clone(), binding);
        Ok(())
    }

    fn fetch(&self, id: &ScheduleId) -> Result<Option<ScheduledAuditBinding>, RepositoryError> {
        let guard = self.bindings.lock().expect("schedule mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update(&self, binding: ScheduledAuditBinding) -> Result<(), RepositoryError> {
        let mut guard = self.bindings.lock().expect("schedule mutex poisoned");
        guard.insert(binding.scheduled_id.clone(), binding);
        Ok(())
    }
}

pub(super) struct StaticTemplates {
    snapshot: TemplateSnapshot,
}

impl StaticTemplates {
    pub(super) fn new(snapshot: TemplateSnapshot) -> Self {
        Self { snapshot }
    }
}

impl TemplateDirectory for StaticTemplates {
    fn snapshot(&self, template_id: &str) -> Result<Option<TemplateSnapshot>, TemplateError> {
        if template_id == self.snapshot.template_id {
            Ok(Some(self.snapshot.clone()))
        } else {
            Ok(None)
        }
    }
}

pub(super) struct ConflictSessions;

impl SessionRepository for ConflictSessions {
    fn insert(&self, _record: SessionRecord) -> Result<SessionInsert, RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn fetch(&self, _id: &SessionId) -> Result<Option<SessionRecord>, RepositoryError> {
        Ok(None)
    }

    fn update(&self, _record: SessionRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn find_by_token(&self, _token: &str) -> Result<Option<SessionRecord>, RepositoryError> {
        Ok(None)
    }
}

pub(super) struct UnavailableSessions;

impl SessionRepository for UnavailableSessions {
    fn insert(&self, _record: SessionRecord) -> Result<SessionInsert, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &SessionId) -> Result<Option<SessionRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _record: SessionRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_token(&self, _token: &str) -> Result<Option<SessionRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryCache {
    entries: Arc<Mutex<HashMap<(SessionId, ViewKind), Value>>>,
}

impl MemoryCache {
    pub(super) fn contains(&self, session_id: &SessionId, kind: ViewKind) -> bool {
        let guard = self.entries.lock().expect("cache mutex poisoned");
        guard.contains_key(&(session_id.clone(), kind))
    }
}

impl ViewCache for MemoryCache {
    fn get(&self, session_id: &SessionId, kind: ViewKind) -> Option<Value> {
        let guard = self.entries.lock().expect("cache mutex poisoned");
        guard.get(&(session_id.clone(), kind)).cloned()
    }

    fn put(&self, session_id: &SessionId, kind: ViewKind, view: Value) {
        let mut guard = self.entries.lock().expect("cache mutex poisoned");
        guard.insert((session_id.clone(), kind), view);
    }

    fn invalidate(&self, session_id: &SessionId) {
        let mut guard = self.entries.lock().expect("cache mutex poisoned");
        guard.retain(|(cached_id, _), _| cached_id != session_id);
    }
}

pub(super) fn build_router() -> (
    axum::Router,
    Arc<MemoryCache>,
    Arc<MemorySessions>,
    Arc<MemorySchedules>,
) {
    let repository = Arc::new(MemorySessions::default());
    let schedules = Arc::new(MemorySchedules::default());
    let templates = Arc::new(StaticTemplates::new(store_walk_snapshot()));
    let cache = Arc::new(MemoryCache::default());
    let service = Arc::new(AuditService::new(
        repository.clone(),
        schedules.clone(),
        templates,
    ));
    let state = RouterState {
        service,
        policy: Arc::new(policy()),
        cache: cache.clone(),
    };
    (audit_router(state), cache, repository, schedules)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
