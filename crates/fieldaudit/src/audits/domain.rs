use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for audit sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for one checklist item within a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub String);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for a selectable answer option on a choice item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OptionId(pub String);

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for a scheduled-audit binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScheduleId(pub String);

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle states of an audit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Draft,
    InProgress,
    Completed,
}

impl SessionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SessionStatus::Draft => "draft",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
        }
    }
}

/// Per-item completion states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Completed,
}

impl ItemStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Completed => "completed",
        }
    }
}

/// Answer shapes a checklist item can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    SingleChoice,
    MultipleChoice,
    MultipleAnswer,
    ImageUpload,
    OpenEnded,
    Text,
    Number,
    Date,
    Task,
    Signature,
}

impl InputType {
    pub const fn label(self) -> &'static str {
        match self {
            InputType::SingleChoice => "single_choice",
            InputType::MultipleChoice => "multiple_choice",
            InputType::MultipleAnswer => "multiple_answer",
            InputType::ImageUpload => "image_upload",
            InputType::OpenEnded => "open_ended",
            InputType::Text => "text",
            InputType::Number => "number",
            InputType::Date => "date",
            InputType::Task => "task",
            InputType::Signature => "signature",
        }
    }

    /// Whether answers are picked from the item's option list.
    pub const fn option_based(self) -> bool {
        matches!(
            self,
            InputType::SingleChoice | InputType::MultipleChoice | InputType::MultipleAnswer
        )
    }

    /// Whether the answer is plain prose, excluded from scoring entirely.
    pub const fn free_text(self) -> bool {
        matches!(self, InputType::OpenEnded | InputType::Text)
    }
}

/// Severity grades assigned to deviations, ordered by weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

impl Severity {
    pub const fn ordered() -> [Self; 3] {
        [Self::Critical, Self::Major, Self::Minor]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Severity::Minor => "Minor",
            Severity::Major => "Major",
            Severity::Critical => "Critical",
        }
    }

    pub const fn weight(self) -> u8 {
        match self {
            Severity::Minor => 1,
            Severity::Major => 2,
            Severity::Critical => 3,
        }
    }
}

/// One selectable answer on a choice item; a `None` score marks the option as
/// not applicable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChoice {
    pub option_id: OptionId,
    pub label: String,
    pub score: Option<f64>,
}

/// Aggregation functions a derived item may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    Mean,
}

impl Aggregate {
    pub const fn label(self) -> &'static str {
        match self {
            Aggregate::Mean => "mean",
        }
    }
}

/// Declared computation backing a derived item: which siblings feed it and
/// how they are combined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedSpec {
    pub depends_on: Vec<ItemId>,
    pub aggregate: Aggregate,
}

/// Immutable copy of one checklist item, bound to a session at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateItemSnapshot {
    pub item_id: ItemId,
    pub title: String,
    pub category: String,
    pub input_type: InputType,
    pub required: bool,
    pub is_critical: bool,
    pub options: Vec<OptionChoice>,
    pub derived_spec: Option<DerivedSpec>,
}

impl TemplateItemSnapshot {
    pub fn option(&self, option_id: &OptionId) -> Option<&OptionChoice> {
        self.options
            .iter()
            .find(|option| &option.option_id == option_id)
    }

    /// Highest score among the item's options, the "ideal" answer. `None`
    /// when the item carries no scorable option.
    pub fn max_score(&self) -> Option<f64> {
        self.options
            .iter()
            .filter_map(|option| option.score)
            .fold(None, |best, score| match best {
                Some(current) if current >= score => Some(current),
                _ => Some(score),
            })
    }

    pub fn is_derived(&self) -> bool {
        self.derived_spec.is_some()
    }
}

/// Ordered, immutable item list an audit session was created against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSnapshot {
    pub template_id: String,
    pub items: Vec<TemplateItemSnapshot>,
}

impl TemplateSnapshot {
    pub fn item(&self, item_id: &ItemId) -> Option<&TemplateItemSnapshot> {
        self.items.iter().find(|item| &item.item_id == item_id)
    }

    /// Template-order position of an item, used as the stable ranking
    /// tiebreak.
    pub fn position(&self, item_id: &ItemId) -> Option<usize> {
        self.items.iter().position(|item| &item.item_id == item_id)
    }

    /// Category names in first-appearance order.
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = Vec::new();
        for item in &self.items {
            if !categories.contains(&item.category.as_str()) {
                categories.push(item.category.as_str());
            }
        }
        categories
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.items.iter().any(|item| item.category == category)
    }

    /// Derived items whose dependency list names `item_id`.
    pub fn dependents_of(&self, item_id: &ItemId) -> Vec<&TemplateItemSnapshot> {
        self.items
            .iter()
            .filter(|item| {
                item.derived_spec
                    .as_ref()
                    .map(|spec| spec.depends_on.contains(item_id))
                    .unwrap_or(false)
            })
            .collect()
    }
}

/// Answer payload for one item, shaped by the item's input type and checked
/// against it before any state changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseValue {
    Selection {
        option_id: OptionId,
        #[serde(default)]
        remark: Option<String>,
    },
    Photo {
        photo_url: String,
    },
    Text {
        comment: String,
    },
    Signature {
        strokes: String,
    },
    Number {
        value: f64,
        #[serde(default)]
        remark: Option<String>,
    },
    Acknowledged {
        #[serde(default)]
        remark: Option<String>,
    },
    NotApplicable {
        #[serde(default)]
        remark: Option<String>,
    },
}

impl ResponseValue {
    /// Short payload name used in validation messages.
    pub const fn kind(&self) -> &'static str {
        match self {
            ResponseValue::Selection { .. } => "selection",
            ResponseValue::Photo { .. } => "photo",
            ResponseValue::Text { .. } => "text",
            ResponseValue::Signature { .. } => "signature",
            ResponseValue::Number { .. } => "number",
            ResponseValue::Acknowledged { .. } => "acknowledged",
            ResponseValue::NotApplicable { .. } => "not_applicable",
        }
    }

    pub fn remark(&self) -> Option<&str> {
        match self {
            ResponseValue::Selection { remark, .. }
            | ResponseValue::Number { remark, .. }
            | ResponseValue::Acknowledged { remark }
            | ResponseValue::NotApplicable { remark } => remark.as_deref(),
            _ => None,
        }
    }

    pub fn is_not_applicable(&self) -> bool {
        matches!(self, ResponseValue::NotApplicable { .. })
    }
}

/// Stored answer state for one item. Created lazily on first write and
/// overwritten in place; no history of prior values is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResponse {
    pub item_id: ItemId,
    pub status: ItemStatus,
    pub value: ResponseValue,
}

impl ItemResponse {
    pub fn selected_option_id(&self) -> Option<&OptionId> {
        match &self.value {
            ResponseValue::Selection { option_id, .. } => Some(option_id),
            _ => None,
        }
    }

    /// Direct numeric answer, the shape derived dependencies feed on.
    pub fn numeric_value(&self) -> Option<f64> {
        match &self.value {
            ResponseValue::Number { value, .. } if value.is_finite() => Some(*value),
            _ => None,
        }
    }

    pub fn photo_url(&self) -> Option<&str> {
        match &self.value {
            ResponseValue::Photo { photo_url } => Some(photo_url.as_str()),
            _ => None,
        }
    }

    /// Free-form text carried by the answer: prose, stroke data, or a remark.
    pub fn comment(&self) -> Option<&str> {
        match &self.value {
            ResponseValue::Text { comment } => Some(comment.as_str()),
            ResponseValue::Signature { strokes } => Some(strokes.as_str()),
            other => other.remark(),
        }
    }
}

/// One inspection run against a template at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSession {
    pub session_id: SessionId,
    pub template_id: String,
    pub location_id: String,
    pub created_by: String,
    pub status: SessionStatus,
    pub client_dedup_token: Option<String>,
    pub scheduled_binding: Option<ScheduleId>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Number of times a scheduled audit's date may be moved before execution.
pub const MAX_RESCHEDULES: u8 = 2;

/// Link between an externally planned inspection date and the session that
/// eventually executes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledAuditBinding {
    pub scheduled_id: ScheduleId,
    pub original_scheduled_date: NaiveDate,
    pub current_scheduled_date: NaiveDate,
    pub reschedule_count: u8,
}

impl ScheduledAuditBinding {
    pub fn new(scheduled_id: ScheduleId, scheduled_date: NaiveDate) -> Self {
        Self {
            scheduled_id,
            original_scheduled_date: scheduled_date,
            current_scheduled_date: scheduled_date,
            reschedule_count: 0,
        }
    }

    pub fn quota_exhausted(&self) -> bool {
        self.reschedule_count >= MAX_RESCHEDULES
    }
}
