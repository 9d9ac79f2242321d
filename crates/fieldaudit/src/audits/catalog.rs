use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use super::domain::{
    Aggregate, DerivedSpec, InputType, ItemId, OptionChoice, OptionId, TemplateItemSnapshot,
    TemplateSnapshot,
};
use super::template::{TemplateDirectory, TemplateError};

/// Error enumeration for template imports.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read template file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid template CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: missing {field}")]
    MissingField { row: usize, field: &'static str },
    #[error("row {row}: unknown input type {value}")]
    UnknownInputType { row: usize, value: String },
    #[error("row {row}: unreadable flag {value}")]
    InvalidFlag { row: usize, value: String },
    #[error("row {row}: unreadable option {value}")]
    InvalidOption { row: usize, value: String },
    #[error("row {row}: {input_type} items do not take options")]
    UnexpectedOptions {
        row: usize,
        input_type: &'static str,
    },
    #[error("row {row}: unknown aggregation {value}")]
    UnknownAggregate { row: usize, value: String },
    #[error("duplicate item id {item_id}")]
    DuplicateItem { item_id: ItemId },
    #[error("derived item {item_id} must be a number item")]
    DerivedNotNumeric { item_id: ItemId },
    #[error("derived item {item_id} depends on unknown item {dependency}")]
    UnknownDependency { item_id: ItemId, dependency: ItemId },
    #[error("derived item {item_id} depends on {dependency}, which is itself derived")]
    NestedDependency { item_id: ItemId, dependency: ItemId },
    #[error("derived item {item_id} depends on {dependency} outside its own category")]
    CrossCategoryDependency { item_id: ItemId, dependency: ItemId },
    #[error("derived item {item_id} depends on non-numeric item {dependency}")]
    NonNumericDependency { item_id: ItemId, dependency: ItemId },
    #[error("template {0} declares no items")]
    Empty(String),
}

/// In-memory catalog of parsed checklist templates keyed by template id.
///
/// Each CSV file describes one template, one checklist item per row. Row
/// order becomes template order, which the ranker uses as its final
/// tiebreak, so files should list items the way auditors walk them.
#[derive(Debug, Default)]
pub struct TemplateCatalog {
    templates: BTreeMap<String, TemplateSnapshot>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_path<P: AsRef<Path>>(template_id: &str, path: P) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        catalog.load_path(template_id, path)?;
        Ok(catalog)
    }

    pub fn from_reader<R: Read>(template_id: &str, reader: R) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        catalog.load_reader(template_id, reader)?;
        Ok(catalog)
    }

    pub fn load_path<P: AsRef<Path>>(
        &mut self,
        template_id: &str,
        path: P,
    ) -> Result<(), CatalogError> {
        let file = std::fs::File::open(path)?;
        self.load_reader(template_id, file)
    }

    pub fn load_reader<R: Read>(
        &mut self,
        template_id: &str,
        reader: R,
    ) -> Result<(), CatalogError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut items: Vec<TemplateItemSnapshot> = Vec::new();
        for (index, record) in csv_reader.deserialize::<TemplateRow>().enumerate() {
            let row = record?;
            // The header occupies the first line of the file.
            let row_number = index + 2;
            let item = item_from_row(row, row_number, items.len())?;
            items.push(item);
        }

        if items.is_empty() {
            return Err(CatalogError::Empty(template_id.to_string()));
        }

        validate_items(&items)?;

        self.insert(TemplateSnapshot {
            template_id: template_id.to_string(),
            items,
        });
        Ok(())
    }

    /// Register an already-built snapshot, replacing any previous version of
    /// the same template.
    pub fn insert(&mut self, snapshot: TemplateSnapshot) {
        self.templates
            .insert(snapshot.template_id.clone(), snapshot);
    }

    pub fn get(&self, template_id: &str) -> Option<&TemplateSnapshot> {
        self.templates.get(template_id)
    }

    pub fn template_ids(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }
}

impl TemplateDirectory for TemplateCatalog {
    fn snapshot(&self, template_id: &str) -> Result<Option<TemplateSnapshot>, TemplateError> {
        Ok(self.get(template_id).cloned())
    }
}

#[derive(Debug, Deserialize)]
struct TemplateRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    item_id: Option<String>,
    title: String,
    category: String,
    input_type: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    required: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    is_critical: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    options: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    depends_on: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    aggregate: Option<String>,
}

fn item_from_row(
    row: TemplateRow,
    row_number: usize,
    position: usize,
) -> Result<TemplateItemSnapshot, CatalogError> {
    if row.title.is_empty() {
        return Err(CatalogError::MissingField {
            row: row_number,
            field: "title",
        });
    }
    if row.category.is_empty() {
        return Err(CatalogError::MissingField {
            row: row_number,
            field: "category",
        });
    }

    let input_type =
        parse_input_type(&row.input_type).ok_or_else(|| CatalogError::UnknownInputType {
            row: row_number,
            value: row.input_type.clone(),
        })?;

    let item_id = ItemId(
        row.item_id
            .unwrap_or_else(|| format!("item-{:03}", position + 1)),
    );

    let options = match row.options.as_deref() {
        Some(encoded) => {
            if !input_type.option_based() {
                return Err(CatalogError::UnexpectedOptions {
                    row: row_number,
                    input_type: input_type.label(),
                });
            }
            parse_options(encoded, &item_id, row_number)?
        }
        None if input_type.option_based() => {
            return Err(CatalogError::MissingField {
                row: row_number,
                field: "options",
            });
        }
        None => Vec::new(),
    };

    let derived_spec = match (row.depends_on.as_deref(), row.aggregate.as_deref()) {
        (Some(dependencies), aggregate) => Some(DerivedSpec {
            depends_on: dependencies
                .split(';')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(|value| ItemId(value.to_string()))
                .collect(),
            aggregate: parse_aggregate(aggregate, row_number)?,
        }),
        (None, Some(_)) => {
            return Err(CatalogError::MissingField {
                row: row_number,
                field: "depends_on",
            });
        }
        (None, None) => None,
    };

    Ok(TemplateItemSnapshot {
        item_id,
        title: row.title,
        category: row.category,
        input_type,
        required: parse_flag(row.required.as_deref(), row_number)?,
        is_critical: parse_flag(row.is_critical.as_deref(), row_number)?,
        options,
        derived_spec,
    })
}

fn validate_items(items: &[TemplateItemSnapshot]) -> Result<(), CatalogError> {
    for (position, item) in items.iter().enumerate() {
        if items[..position]
            .iter()
            .any(|earlier| earlier.item_id == item.item_id)
        {
            return Err(CatalogError::DuplicateItem {
                item_id: item.item_id.clone(),
            });
        }
    }

    for item in items {
        let Some(spec) = item.derived_spec.as_ref() else {
            continue;
        };

        if item.input_type != InputType::Number {
            return Err(CatalogError::DerivedNotNumeric {
                item_id: item.item_id.clone(),
            });
        }

        for dependency_id in &spec.depends_on {
            let Some(dependency) = items.iter().find(|other| &other.item_id == dependency_id)
            else {
                return Err(CatalogError::UnknownDependency {
                    item_id: item.item_id.clone(),
                    dependency: dependency_id.clone(),
                });
            };
            if dependency.is_derived() {
                return Err(CatalogError::NestedDependency {
                    item_id: item.item_id.clone(),
                    dependency: dependency_id.clone(),
                });
            }
            if dependency.category != item.category {
                return Err(CatalogError::CrossCategoryDependency {
                    item_id: item.item_id.clone(),
                    dependency: dependency_id.clone(),
                });
            }
            if dependency.input_type != InputType::Number {
                return Err(CatalogError::NonNumericDependency {
                    item_id: item.item_id.clone(),
                    dependency: dependency_id.clone(),
                });
            }
        }
    }

    Ok(())
}

fn parse_input_type(value: &str) -> Option<InputType> {
    let normalized = value.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    let input_type = match normalized.as_str() {
        "single_choice" => InputType::SingleChoice,
        "multiple_choice" => InputType::MultipleChoice,
        "multiple_answer" => InputType::MultipleAnswer,
        "image_upload" => InputType::ImageUpload,
        "open_ended" => InputType::OpenEnded,
        "text" => InputType::Text,
        "number" => InputType::Number,
        "date" => InputType::Date,
        "task" => InputType::Task,
        "signature" => InputType::Signature,
        _ => return None,
    };
    Some(input_type)
}

fn parse_flag(value: Option<&str>, row_number: usize) -> Result<bool, CatalogError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(CatalogError::InvalidFlag {
            row: row_number,
            value: value.to_string(),
        }),
    }
}

/// Options are encoded `Label:score` separated by pipes, with `NA` in the
/// score slot marking a not-applicable option.
fn parse_options(
    encoded: &str,
    item_id: &ItemId,
    row_number: usize,
) -> Result<Vec<OptionChoice>, CatalogError> {
    let invalid = |value: &str| CatalogError::InvalidOption {
        row: row_number,
        value: value.to_string(),
    };

    let mut options = Vec::new();
    for part in encoded.split('|') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (label, mark) = part.rsplit_once(':').ok_or_else(|| invalid(part))?;
        let label = label.trim();
        if label.is_empty() {
            return Err(invalid(part));
        }

        let mark = mark.trim();
        let score = if mark.eq_ignore_ascii_case("na") {
            None
        } else {
            let parsed: f64 = mark.parse().map_err(|_| invalid(part))?;
            if !parsed.is_finite() {
                return Err(invalid(part));
            }
            Some(parsed)
        };

        options.push(OptionChoice {
            option_id: OptionId(format!("{}-opt-{}", item_id, options.len() + 1)),
            label: label.to_string(),
            score,
        });
    }

    if options.is_empty() {
        return Err(CatalogError::MissingField {
            row: row_number,
            field: "options",
        });
    }

    Ok(options)
}

fn parse_aggregate(value: Option<&str>, row_number: usize) -> Result<Aggregate, CatalogError> {
    let Some(value) = value else {
        return Ok(Aggregate::Mean);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "mean" | "average" => Ok(Aggregate::Mean),
        _ => Err(CatalogError::UnknownAggregate {
            row: row_number,
            value: value.to_string(),
        }),
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
