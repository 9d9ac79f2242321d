use std::collections::BTreeMap;

use super::domain::{
    Aggregate, DerivedSpec, ItemId, ItemResponse, ItemStatus, ResponseValue, TemplateSnapshot,
};

/// Compute a derived item's value from its declared dependencies. Resolves
/// only when every dependency currently holds a direct numeric answer; a
/// missing, not-applicable, or non-numeric dependency yields `None`.
pub fn resolve(spec: &DerivedSpec, responses: &BTreeMap<ItemId, ItemResponse>) -> Option<f64> {
    if spec.depends_on.is_empty() {
        return None;
    }

    let mut values = Vec::with_capacity(spec.depends_on.len());
    for dependency in &spec.depends_on {
        let value = responses.get(dependency)?.numeric_value()?;
        values.push(value);
    }

    let aggregated = match spec.aggregate {
        Aggregate::Mean => values.iter().sum::<f64>() / values.len() as f64,
    };
    Some(round_two_places(aggregated))
}

/// Re-evaluate every derived item in the snapshot against the current
/// responses. Fully resolved items receive a computed numeric response;
/// items whose dependencies stopped resolving lose theirs, which drops them
/// back to incomplete.
pub fn refresh(snapshot: &TemplateSnapshot, responses: &mut BTreeMap<ItemId, ItemResponse>) {
    for item in &snapshot.items {
        let Some(spec) = item.derived_spec.as_ref() else {
            continue;
        };

        match resolve(spec, responses) {
            Some(value) => {
                responses.insert(
                    item.item_id.clone(),
                    ItemResponse {
                        item_id: item.item_id.clone(),
                        status: ItemStatus::Completed,
                        value: ResponseValue::Number {
                            value,
                            remark: None,
                        },
                    },
                );
            }
            None => {
                responses.remove(&item.item_id);
            }
        }
    }
}

fn round_two_places(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
