use super::domain::{InputType, ItemResponse, ItemStatus, ResponseValue, TemplateItemSnapshot};

/// Decide whether an item counts as complete given its stored response.
///
/// A not-applicable answer completes any item regardless of input type.
/// Everything else is judged by the shape the input type asks for; an absent
/// response is always incomplete, including derived items whose computation
/// has not produced a value yet.
pub fn is_complete(item: &TemplateItemSnapshot, response: Option<&ItemResponse>) -> bool {
    let Some(response) = response else {
        return false;
    };

    if response.value.is_not_applicable() {
        return true;
    }

    match item.input_type {
        InputType::SingleChoice | InputType::MultipleChoice | InputType::MultipleAnswer => {
            matches!(response.value, ResponseValue::Selection { .. })
        }
        InputType::ImageUpload => response
            .photo_url()
            .map(|url| !url.trim().is_empty())
            .unwrap_or(false),
        InputType::OpenEnded | InputType::Text => match &response.value {
            ResponseValue::Text { comment } => !comment.trim().is_empty(),
            _ => false,
        },
        InputType::Number => response.numeric_value().is_some(),
        InputType::Date | InputType::Task => {
            matches!(response.value, ResponseValue::Acknowledged { .. })
        }
        InputType::Signature => match &response.value {
            ResponseValue::Signature { strokes } => !strokes.trim().is_empty(),
            _ => false,
        },
    }
}

/// Item status derived from the completeness rule, stored alongside the
/// response so API consumers never re-derive it.
pub fn status_for(item: &TemplateItemSnapshot, response: &ItemResponse) -> ItemStatus {
    if is_complete(item, Some(response)) {
        ItemStatus::Completed
    } else {
        ItemStatus::Pending
    }
}
