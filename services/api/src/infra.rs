use chrono::NaiveDate;
use fieldaudit::audits::cache::{ViewCache, ViewKind};
use fieldaudit::audits::catalog::{CatalogError, TemplateCatalog};
use fieldaudit::audits::domain::{ScheduleId, ScheduledAuditBinding, SessionId, Severity};
use fieldaudit::audits::repository::{
    RepositoryError, ScheduleStore, SessionInsert, SessionRecord, SessionRepository,
};
use fieldaudit::audits::ActionPlanPolicy;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Checklist bundled into the binary so the service and demo work without an
/// `APP_TEMPLATE_PATH`. One store walk: three categories, a critical choice
/// item, two gauge readings feeding a derived average, and a sign-off.
const BUILTIN_TEMPLATE_ID: &str = "store-walk";
const BUILTIN_TEMPLATE_CSV: &str = "\
item_id,title,category,input_type,required,is_critical,options,depends_on,aggregate
fs-sanitizer,Sanitizer buckets at correct concentration,Food Safety,single_choice,yes,true,Yes:3|No:0|N/A:NA,,
fs-storage,Raw product stored below ready-to-eat,Food Safety,single_choice,yes,,Yes:3|No:0|N/A:NA,,
fs-note,Walkthrough notes,Food Safety,open_ended,,,,,
eq-gauge-photo,Cooler gauge photo,Equipment,image_upload,yes,,,,
eq-attempt-1,Compressor reading first attempt,Equipment,number,,,,,
eq-attempt-2,Compressor reading second attempt,Equipment,number,,,,,
eq-average,Average compressor reading,Equipment,number,yes,,,eq-attempt-1;eq-attempt-2,mean
so-manager-sign,Manager signature,Sign-off,signature,yes,,,,
so-walk-done,Walk recorded in shift log,Sign-off,task,,,,,
";

pub(crate) fn builtin_catalog() -> Result<TemplateCatalog, CatalogError> {
    TemplateCatalog::from_reader(BUILTIN_TEMPLATE_ID, BUILTIN_TEMPLATE_CSV.as_bytes())
}

pub(crate) fn builtin_template_id() -> &'static str {
    BUILTIN_TEMPLATE_ID
}

/// Severity and ownership defaults for the bundled template. Hosts with
/// their own templates supply their own table.
pub(crate) fn default_policy() -> ActionPlanPolicy {
    let mut severity_by_category = BTreeMap::new();
    severity_by_category.insert("Food Safety".to_string(), Severity::Critical);
    severity_by_category.insert("Equipment".to_string(), Severity::Major);
    severity_by_category.insert("Sign-off".to_string(), Severity::Minor);

    let mut owner_by_category = BTreeMap::new();
    owner_by_category.insert("Equipment".to_string(), "Maintenance Lead".to_string());
    owner_by_category.insert("Sign-off".to_string(), "Store Manager".to_string());

    ActionPlanPolicy {
        severity_by_category,
        owner_by_category,
        ..ActionPlanPolicy::default()
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemorySessionRepository {
    records: Arc<Mutex<HashMap<SessionId, SessionRecord>>>,
}

impl SessionRepository for InMemorySessionRepository {
    fn insert(&self, record: SessionRecord) -> Result<SessionInsert, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        // One lock covers the token scan and the insert, which is what makes
        // two racing retries resolve to a single stored session.
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
        if guard.contains_key(&record.session.session_id) {
            guard.insert(record.session.session_id.clone(), record);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
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
pub(crate) struct InMemoryScheduleStore {
    bindings: Arc<Mutex<HashMap<ScheduleId, ScheduledAuditBinding>>>,
}

impl ScheduleStore for InMemoryScheduleStore {
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
        if guard.contains_key(&binding.scheduled_id) {
            guard.insert(binding.scheduled_id.clone(), binding);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }
}

/// Rendered-view cache scoped by session and view kind. Mutating handlers
/// invalidate a session's entries before responding, so a stale view never
/// outlives the write that obsoleted it.
#[derive(Default, Clone)]
pub(crate) struct MemoryViewCache {
    views: Arc<Mutex<HashMap<(SessionId, ViewKind), Value>>>,
}

impl ViewCache for MemoryViewCache {
    fn get(&self, session_id: &SessionId, kind: ViewKind) -> Option<Value> {
        let guard = self.views.lock().expect("view cache mutex poisoned");
        guard.get(&(session_id.clone(), kind)).cloned()
    }

    fn put(&self, session_id: &SessionId, kind: ViewKind, view: Value) {
        let mut guard = self.views.lock().expect("view cache mutex poisoned");
        guard.insert((session_id.clone(), kind), view);
    }

    fn invalidate(&self, session_id: &SessionId) {
        let mut guard = self.views.lock().expect("view cache mutex poisoned");
        guard.retain(|(cached_id, _), _| cached_id != session_id);
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
