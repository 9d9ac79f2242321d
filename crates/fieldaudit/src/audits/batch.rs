use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::completion;
use super::derived;
use super::domain::{
    InputType, ItemId, ItemResponse, ItemStatus, OptionId, ResponseValue, TemplateItemSnapshot,
    TemplateSnapshot,
};

/// One item write inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseWrite {
    pub item_id: ItemId,
    pub value: ResponseValue,
}

/// Batch of item writes applied as one atomic unit. A `category` scopes the
/// batch to one checklist screen: the merge still accepts any item, but
/// validation then covers every required item of that category, answered in
/// this batch or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub responses: Vec<ResponseWrite>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Why a batch was rejected. Rejections always name the offending item and
/// leave stored state untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BatchRejection {
    #[error("unknown item {item_id}")]
    UnknownItem { item_id: ItemId },
    #[error("item {item_id} is computed from its dependencies and cannot be written directly")]
    DerivedItem { item_id: ItemId },
    #[error("item {item_id} expects a {expected} answer, got {got}")]
    TypeMismatch {
        item_id: ItemId,
        expected: &'static str,
        got: &'static str,
    },
    #[error("item {item_id} has no option {option_id}")]
    UnknownOption { item_id: ItemId, option_id: OptionId },
    #[error("item {item_id} requires a finite number")]
    NonFiniteNumber { item_id: ItemId },
    #[error("required item {item_id} is incomplete")]
    RequiredIncomplete { item_id: ItemId },
    #[error("unknown category {category}")]
    UnknownCategory { category: String },
}

/// Successful plan: the full post-merge response map plus the rows this
/// batch changed, ready to persist in one write and echo back to the caller.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub responses: BTreeMap<ItemId, ItemResponse>,
    pub applied: Vec<ItemResponse>,
}

/// Validate a batch against the snapshot and produce the post-merge response
/// map without touching stored state. Shape checks run per write, derived
/// items are recomputed on the merged map, and required-item completeness is
/// judged last. Re-planning an identical batch over its own outcome yields
/// the same map, which is what makes retries safe to re-apply.
pub fn plan(
    snapshot: &TemplateSnapshot,
    stored: &BTreeMap<ItemId, ItemResponse>,
    request: &BatchRequest,
) -> Result<BatchOutcome, BatchRejection> {
    if let Some(category) = request.category.as_deref() {
        if !snapshot.has_category(category) {
            return Err(BatchRejection::UnknownCategory {
                category: category.to_string(),
            });
        }
    }

    let mut next = stored.clone();
    let mut touched: Vec<ItemId> = Vec::new();

    for write in &request.responses {
        let item = snapshot
            .item(&write.item_id)
            .ok_or_else(|| BatchRejection::UnknownItem {
                item_id: write.item_id.clone(),
            })?;

        if item.is_derived() {
            return Err(BatchRejection::DerivedItem {
                item_id: item.item_id.clone(),
            });
        }

        check_shape(item, &write.value)?;

        let mut response = ItemResponse {
            item_id: item.item_id.clone(),
            status: ItemStatus::Pending,
            value: write.value.clone(),
        };
        response.status = completion::status_for(item, &response);
        next.insert(item.item_id.clone(), response);

        if !touched.contains(&write.item_id) {
            touched.push(write.item_id.clone());
        }
    }

    derived::refresh(snapshot, &mut next);

    validate_required(snapshot, &next, request, &touched)?;

    let mut applied: Vec<ItemResponse> = touched
        .iter()
        .filter_map(|item_id| next.get(item_id).cloned())
        .collect();

    for item in &snapshot.items {
        if !item.is_derived() || touched.contains(&item.item_id) {
            continue;
        }
        if next.get(&item.item_id) != stored.get(&item.item_id) {
            if let Some(response) = next.get(&item.item_id) {
                applied.push(response.clone());
            }
        }
    }

    Ok(BatchOutcome {
        responses: next,
        applied,
    })
}

/// Reject payloads whose shape does not fit the item's input type. An
/// explicit not-applicable answer fits any item.
fn check_shape(item: &TemplateItemSnapshot, value: &ResponseValue) -> Result<(), BatchRejection> {
    let mismatch = |expected: &'static str| BatchRejection::TypeMismatch {
        item_id: item.item_id.clone(),
        expected,
        got: value.kind(),
    };

    match value {
        ResponseValue::NotApplicable { .. } => Ok(()),
        ResponseValue::Selection { option_id, .. } => {
            if !item.input_type.option_based() {
                return Err(mismatch(item.input_type.label()));
            }
            if item.option(option_id).is_none() {
                return Err(BatchRejection::UnknownOption {
                    item_id: item.item_id.clone(),
                    option_id: option_id.clone(),
                });
            }
            Ok(())
        }
        ResponseValue::Photo { .. } => {
            if item.input_type == InputType::ImageUpload {
                Ok(())
            } else {
                Err(mismatch(item.input_type.label()))
            }
        }
        ResponseValue::Text { .. } => {
            if item.input_type.free_text() {
                Ok(())
            } else {
                Err(mismatch(item.input_type.label()))
            }
        }
        ResponseValue::Signature { .. } => {
            if item.input_type == InputType::Signature {
                Ok(())
            } else {
                Err(mismatch(item.input_type.label()))
            }
        }
        ResponseValue::Number { value: number, .. } => {
            if item.input_type != InputType::Number {
                return Err(mismatch(item.input_type.label()));
            }
            if !number.is_finite() {
                return Err(BatchRejection::NonFiniteNumber {
                    item_id: item.item_id.clone(),
                });
            }
            Ok(())
        }
        ResponseValue::Acknowledged { .. } => {
            if matches!(item.input_type, InputType::Date | InputType::Task) {
                Ok(())
            } else {
                Err(mismatch(item.input_type.label()))
            }
        }
    }
}

/// Completeness check over the merged map. Scoped batches cover every
/// required item of the scoped category; unscoped batches cover only the
/// required items this batch touched.
fn validate_required(
    snapshot: &TemplateSnapshot,
    next: &BTreeMap<ItemId, ItemResponse>,
    request: &BatchRequest,
    touched: &[ItemId],
) -> Result<(), BatchRejection> {
    match request.category.as_deref() {
        Some(category) => {
            for item in snapshot
                .items
                .iter()
                .filter(|item| item.category == category && item.required)
            {
                if !completion::is_complete(item, next.get(&item.item_id)) {
                    return Err(BatchRejection::RequiredIncomplete {
                        item_id: item.item_id.clone(),
                    });
                }
            }
        }
        None => {
            for item_id in touched {
                let Some(item) = snapshot.item(item_id) else {
                    continue;
                };
                if item.required && !completion::is_complete(item, next.get(item_id)) {
                    return Err(BatchRejection::RequiredIncomplete {
                        item_id: item.item_id.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}
