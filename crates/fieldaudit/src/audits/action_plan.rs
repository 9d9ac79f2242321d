use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::domain::{ItemId, ItemResponse, Severity, TemplateItemSnapshot, TemplateSnapshot};
use super::scoring::{ItemScore, ScoreReport};

/// Entries rendered per plan; reviewers handle anything beyond the top
/// deviations manually.
pub const MAX_PLAN_ENTRIES: usize = 3;

pub const DEFAULT_OWNER: &str = "Auditor";
pub const DEFAULT_CORRECTIVE_ACTION: &str = "Address the audit deviation noted for this item.";

/// Workflow states of a corrective action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Open,
    Closed,
}

impl ActionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ActionStatus::Open => "open",
            ActionStatus::Closed => "closed",
        }
    }
}

/// One corrective action in the rendered plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionPlanEntry {
    pub question: String,
    pub category: String,
    pub severity: Severity,
    pub corrective_action: String,
    pub owner: String,
    pub due_date: NaiveDate,
    pub status: ActionStatus,
}

/// Days allowed to close a deviation, graded by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueDayOffsets {
    pub critical: i64,
    pub major: i64,
    pub minor: i64,
}

impl DueDayOffsets {
    pub const fn for_severity(self, severity: Severity) -> i64 {
        match severity {
            Severity::Critical => self.critical,
            Severity::Major => self.major,
            Severity::Minor => self.minor,
        }
    }
}

/// Per-category severity and ownership defaults supplied by the host
/// application alongside the template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlanPolicy {
    pub severity_by_category: BTreeMap<String, Severity>,
    pub owner_by_category: BTreeMap<String, String>,
    pub default_owner: String,
    pub due_days: DueDayOffsets,
}

impl Default for ActionPlanPolicy {
    fn default() -> Self {
        Self {
            severity_by_category: BTreeMap::new(),
            owner_by_category: BTreeMap::new(),
            default_owner: DEFAULT_OWNER.to_string(),
            due_days: DueDayOffsets {
                critical: 3,
                major: 7,
                minor: 14,
            },
        }
    }
}

/// Render the ranked corrective-action plan for a scored session.
///
/// Candidates are included items scoring below their maximum. Ordering is
/// severity weight first, then score gap, with template order breaking any
/// remaining tie, so an unchanged deviation set and policy always render the
/// identical list.
pub fn generate(
    snapshot: &TemplateSnapshot,
    responses: &BTreeMap<ItemId, ItemResponse>,
    report: &ScoreReport,
    policy: &ActionPlanPolicy,
    anchor: NaiveDate,
) -> Vec<ActionPlanEntry> {
    let mut deviations: Vec<(usize, Severity, &ItemScore)> = Vec::new();

    for scored in &report.items {
        if scored.is_excluded() || scored.score_gap() <= 0.0 {
            continue;
        }
        let Some(item) = snapshot.item(&scored.item_id) else {
            continue;
        };
        let Some(position) = snapshot.position(&scored.item_id) else {
            continue;
        };
        deviations.push((position, severity_for(item, policy), scored));
    }

    deviations.sort_by(|a, b| {
        b.1.weight()
            .cmp(&a.1.weight())
            .then_with(|| b.2.score_gap().total_cmp(&a.2.score_gap()))
            .then_with(|| a.0.cmp(&b.0))
    });

    deviations
        .into_iter()
        .take(MAX_PLAN_ENTRIES)
        .map(|(_, severity, scored)| {
            let remark = responses
                .get(&scored.item_id)
                .and_then(|response| response.value.remark());
            ActionPlanEntry {
                question: scored.title.clone(),
                category: scored.category.clone(),
                severity,
                corrective_action: corrective_action(remark),
                owner: owner_for(&scored.category, policy),
                due_date: anchor + Duration::days(policy.due_days.for_severity(severity)),
                status: ActionStatus::Open,
            }
        })
        .collect()
}

/// An item flagged critical at authoring time outranks any category default.
fn severity_for(item: &TemplateItemSnapshot, policy: &ActionPlanPolicy) -> Severity {
    if item.is_critical {
        return Severity::Critical;
    }
    policy
        .severity_by_category
        .get(&item.category)
        .copied()
        .unwrap_or(Severity::Minor)
}

fn owner_for(category: &str, policy: &ActionPlanPolicy) -> String {
    policy
        .owner_by_category
        .get(category)
        .cloned()
        .unwrap_or_else(|| policy.default_owner.clone())
}

/// The auditor's remark becomes the corrective instruction when present.
fn corrective_action(remark: Option<&str>) -> String {
    match remark {
        Some(remark) if !remark.trim().is_empty() => format!("Resolve: {}", remark.trim()),
        _ => DEFAULT_CORRECTIVE_ACTION.to_string(),
    }
}
