use std::collections::BTreeMap;

use serde::Serialize;

use super::domain::{ItemId, ItemResponse, TemplateItemSnapshot, TemplateSnapshot};

/// Why an item is left out of the score totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Exclusion {
    /// The item type never carries a score: prose, photos, signatures,
    /// acknowledgments, and direct numeric entries.
    Unscored,
    /// The auditor marked the item not applicable, either explicitly or by
    /// picking an option with no score attached.
    NotApplicable,
}

/// Score detail for one checklist item. Excluded items keep their would-be
/// `max_score` for display but never reach the rollups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemScore {
    pub item_id: ItemId,
    pub title: String,
    pub category: String,
    pub actual_score: f64,
    pub max_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded: Option<Exclusion>,
}

impl ItemScore {
    pub fn is_excluded(&self) -> bool {
        self.excluded.is_some()
    }

    /// Distance from the ideal answer, the ranking signal for deviations.
    pub fn score_gap(&self) -> f64 {
        self.max_score - self.actual_score
    }
}

/// Sum of included item scores within one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryScore {
    pub category: String,
    pub actual_score: f64,
    pub max_score: f64,
    pub percentage: u8,
}

/// Whole-session totals across every included item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub actual_score: f64,
    pub max_score: f64,
    pub percentage: u8,
}

/// Scoring output consumed verbatim by external report renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreReport {
    pub summary: ScoreSummary,
    pub categories: Vec<CategoryScore>,
    pub items: Vec<ItemScore>,
}

/// Score a session snapshot against its stored responses.
///
/// A not-applicable answer removes the item from both the numerator and the
/// denominator so skipped items never depress the percentage. An unanswered
/// scorable item counts as zero out of its maximum.
pub fn score(
    snapshot: &TemplateSnapshot,
    responses: &BTreeMap<ItemId, ItemResponse>,
) -> ScoreReport {
    let items: Vec<ItemScore> = snapshot
        .items
        .iter()
        .map(|item| score_item(item, responses.get(&item.item_id)))
        .collect();

    let mut categories: Vec<CategoryScore> = snapshot
        .categories()
        .into_iter()
        .map(|category| CategoryScore {
            category: category.to_string(),
            actual_score: 0.0,
            max_score: 0.0,
            percentage: 0,
        })
        .collect();

    let mut total_actual = 0.0;
    let mut total_max = 0.0;

    for scored in &items {
        if scored.is_excluded() {
            continue;
        }
        total_actual += scored.actual_score;
        total_max += scored.max_score;
        if let Some(rollup) = categories
            .iter_mut()
            .find(|rollup| rollup.category == scored.category)
        {
            rollup.actual_score += scored.actual_score;
            rollup.max_score += scored.max_score;
        }
    }

    for rollup in &mut categories {
        rollup.percentage = percentage(rollup.actual_score, rollup.max_score);
    }

    ScoreReport {
        summary: ScoreSummary {
            actual_score: total_actual,
            max_score: total_max,
            percentage: percentage(total_actual, total_max),
        },
        categories,
        items,
    }
}

fn score_item(item: &TemplateItemSnapshot, response: Option<&ItemResponse>) -> ItemScore {
    let base = |actual: f64, max: f64, excluded: Option<Exclusion>| ItemScore {
        item_id: item.item_id.clone(),
        title: item.title.clone(),
        category: item.category.clone(),
        actual_score: actual,
        max_score: max,
        excluded,
    };

    if item.input_type.free_text() {
        return base(0.0, 0.0, Some(Exclusion::Unscored));
    }

    let Some(max) = item.max_score() else {
        return base(0.0, 0.0, Some(Exclusion::Unscored));
    };

    let Some(response) = response else {
        return base(0.0, max, None);
    };

    if response.value.is_not_applicable() {
        return base(0.0, max, Some(Exclusion::NotApplicable));
    }

    match response.selected_option_id() {
        Some(option_id) => match item.option(option_id).and_then(|option| option.score) {
            Some(actual) => base(actual, max, None),
            None => base(0.0, max, Some(Exclusion::NotApplicable)),
        },
        None => base(0.0, max, None),
    }
}

/// Integer percentage of actual over max; a zero denominator scores zero
/// rather than faulting.
fn percentage(actual: f64, max: f64) -> u8 {
    if max <= 0.0 {
        return 0;
    }
    (100.0 * actual / max).round().clamp(0.0, 100.0) as u8
}
