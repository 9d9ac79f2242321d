use std::collections::BTreeMap;

use serde::Serialize;

use super::completion;
use super::domain::{
    AuditSession, InputType, ItemId, ItemResponse, ItemStatus, ResponseValue, TemplateSnapshot,
};

/// Per-category completion rollup, recomputed on demand and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryStatus {
    pub category: String,
    pub completed_count: usize,
    pub total_count: usize,
    pub is_complete: bool,
    /// Rounded completion percent for progress displays.
    pub percentage: u8,
    /// Incomplete items that hold this category open: required items plus
    /// any unresolved derived item, whatever its required flag. The
    /// completion gate refuses to close the session while any category has
    /// entries here.
    pub blocking_items: Vec<ItemId>,
}

/// Roll every snapshot item into its category, counting absent responses as
/// pending. Categories appear in template order and cover the whole
/// snapshot, not only categories touched so far.
pub fn category_status(
    snapshot: &TemplateSnapshot,
    responses: &BTreeMap<ItemId, ItemResponse>,
) -> Vec<CategoryStatus> {
    let mut statuses: Vec<CategoryStatus> = Vec::new();

    for item in &snapshot.items {
        let complete = completion::is_complete(item, responses.get(&item.item_id));

        let position = match statuses
            .iter()
            .position(|status| status.category == item.category)
        {
            Some(position) => position,
            None => {
                statuses.push(CategoryStatus {
                    category: item.category.clone(),
                    completed_count: 0,
                    total_count: 0,
                    is_complete: false,
                    percentage: 0,
                    blocking_items: Vec::new(),
                });
                statuses.len() - 1
            }
        };

        let status = &mut statuses[position];
        status.total_count += 1;
        if complete {
            status.completed_count += 1;
        } else if item.required || item.is_derived() {
            // An unresolved derived item holds its category open even when
            // the item itself is optional: a computed value the dependencies
            // cannot produce yet is a gap, not a skipped extra.
            status.blocking_items.push(item.item_id.clone());
        }
    }

    for status in &mut statuses {
        status.is_complete = status.total_count > 0 && status.completed_count == status.total_count;
        status.percentage = if status.total_count == 0 {
            0
        } else {
            (100.0 * status.completed_count as f64 / status.total_count as f64).round() as u8
        };
    }

    statuses
}

/// Names of categories whose required items are not all complete.
pub fn incomplete_categories(statuses: &[CategoryStatus]) -> Vec<String> {
    statuses
        .iter()
        .filter(|status| !status.blocking_items.is_empty())
        .map(|status| status.category.clone())
        .collect()
}

/// Sanitized session state exposed to API consumers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub template_id: String,
    pub location_id: String,
    pub created_by: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_binding: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl SessionView {
    pub fn from_session(session: &AuditSession) -> Self {
        Self {
            session_id: session.session_id.to_string(),
            template_id: session.template_id.clone(),
            location_id: session.location_id.clone(),
            created_by: session.created_by.clone(),
            status: session.status.label(),
            scheduled_binding: session
                .scheduled_binding
                .as_ref()
                .map(|binding| binding.to_string()),
            created_at: session.created_at.to_rfc3339(),
            completed_at: session
                .completed_at
                .map(|completed_at| completed_at.to_rfc3339()),
        }
    }
}

/// One checklist row in the progress read model.
#[derive(Debug, Clone, Serialize)]
pub struct ItemProgressView {
    pub item_id: ItemId,
    pub title: String,
    pub category: String,
    pub input_type: InputType,
    pub required: bool,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseValue>,
}

/// Read model backing the in-flight audit screen: session header, every
/// checklist row with its current answer, and per-category rollups.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressView {
    pub session: SessionView,
    pub items: Vec<ItemProgressView>,
    pub categories: Vec<CategoryStatus>,
    pub overall_complete: bool,
}

pub fn build_progress(
    session: &AuditSession,
    snapshot: &TemplateSnapshot,
    responses: &BTreeMap<ItemId, ItemResponse>,
) -> ProgressView {
    let items = snapshot
        .items
        .iter()
        .map(|item| {
            let response = responses.get(&item.item_id);
            let status = if completion::is_complete(item, response) {
                ItemStatus::Completed
            } else {
                ItemStatus::Pending
            };
            ItemProgressView {
                item_id: item.item_id.clone(),
                title: item.title.clone(),
                category: item.category.clone(),
                input_type: item.input_type,
                required: item.required,
                status: status.label(),
                response: response.map(|stored| stored.value.clone()),
            }
        })
        .collect();

    let categories = category_status(snapshot, responses);
    let overall_complete =
        !categories.is_empty() && categories.iter().all(|status| status.is_complete);

    ProgressView {
        session: SessionView::from_session(session),
        items,
        categories,
        overall_complete,
    }
}
