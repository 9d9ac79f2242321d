use crate::audits::catalog::{CatalogError, TemplateCatalog};
use crate::audits::domain::{Aggregate, InputType};
use crate::audits::template::TemplateDirectory;

#[test]
fn parses_template_rows_in_file_order() {
    let csv = "item_id,title,category,input_type,required,is_critical,options,depends_on,aggregate\n\
fs-sanitizer,Sanitizer concentration correct,Food Safety,single_choice,yes,true,Yes:3|No:0|N/A:NA,,\n\
eq-attempt-1,First gauge reading,Equipment,number,,,,,\n\
eq-attempt-2,Second gauge reading,Equipment,number,,,,,\n\
eq-average,Average gauge reading,Equipment,number,yes,,,eq-attempt-1;eq-attempt-2,mean\n\
eq-photo,Gauge photo,Equipment,image_upload,yes,,,,\n";

    let catalog =
        TemplateCatalog::from_reader("store-walk", csv.as_bytes()).expect("template parses");
    let snapshot = catalog.get("store-walk").expect("template stored");

    assert_eq!(snapshot.items.len(), 5);
    assert_eq!(snapshot.items[0].item_id.0, "fs-sanitizer");
    assert!(snapshot.items[0].required);
    assert!(snapshot.items[0].is_critical);
    assert_eq!(snapshot.items[0].options.len(), 3);
    assert_eq!(snapshot.items[0].options[0].option_id.0, "fs-sanitizer-opt-1");
    assert_eq!(snapshot.items[0].options[0].label, "Yes");
    assert_eq!(snapshot.items[0].options[0].score, Some(3.0));
    assert_eq!(snapshot.items[0].options[2].label, "N/A");
    assert_eq!(snapshot.items[0].options[2].score, None);

    let average = &snapshot.items[3];
    assert_eq!(average.input_type, InputType::Number);
    let spec = average.derived_spec.as_ref().expect("derived spec");
    assert_eq!(spec.aggregate, Aggregate::Mean);
    assert_eq!(spec.depends_on.len(), 2);
    assert_eq!(spec.depends_on[0].0, "eq-attempt-1");

    assert_eq!(snapshot.categories(), vec!["Food Safety", "Equipment"]);
}

#[test]
fn generates_item_ids_for_blank_cells() {
    let csv = "item_id,title,category,input_type\n\
,Walkthrough notes,General,open_ended\n\
note-2,Closing notes,General,text\n\
,Door photo,General,image_upload\n";

    let catalog = TemplateCatalog::from_reader("walk", csv.as_bytes()).expect("template parses");
    let snapshot = catalog.get("walk").expect("template stored");

    assert_eq!(snapshot.items[0].item_id.0, "item-001");
    assert_eq!(snapshot.items[1].item_id.0, "note-2");
    assert_eq!(snapshot.items[2].item_id.0, "item-003");
}

#[test]
fn accepts_spaced_and_hyphenated_input_types() {
    let csv = "title,category,input_type,options\n\
Lobby photo,General,Image-Upload,\n\
Floor check,General,Single Choice,Pass:1|Fail:0\n";

    let catalog = TemplateCatalog::from_reader("walk", csv.as_bytes()).expect("template parses");
    let snapshot = catalog.get("walk").expect("template stored");
    assert_eq!(snapshot.items[0].input_type, InputType::ImageUpload);
    assert_eq!(snapshot.items[1].input_type, InputType::SingleChoice);
}

#[test]
fn rejects_unknown_input_types() {
    let csv = "title,category,input_type\nFloor check,General,checkbox\n";

    match TemplateCatalog::from_reader("walk", csv.as_bytes()) {
        Err(CatalogError::UnknownInputType { row, value }) => {
            assert_eq!(row, 2);
            assert_eq!(value, "checkbox");
        }
        other => panic!("expected unknown input type, got {other:?}"),
    }
}

#[test]
fn rejects_choice_rows_without_options() {
    let csv = "title,category,input_type,options\nFloor check,General,single_choice,\n";

    match TemplateCatalog::from_reader("walk", csv.as_bytes()) {
        Err(CatalogError::MissingField { row, field }) => {
            assert_eq!(row, 2);
            assert_eq!(field, "options");
        }
        other => panic!("expected missing options, got {other:?}"),
    }
}

#[test]
fn rejects_options_on_non_choice_rows() {
    let csv = "title,category,input_type,options\nGauge reading,Equipment,number,Yes:3|No:0\n";

    match TemplateCatalog::from_reader("walk", csv.as_bytes()) {
        Err(CatalogError::UnexpectedOptions { row, input_type }) => {
            assert_eq!(row, 2);
            assert_eq!(input_type, "number");
        }
        other => panic!("expected unexpected options, got {other:?}"),
    }
}

#[test]
fn rejects_malformed_options_and_flags() {
    let csv = "title,category,input_type,options\nFloor check,General,single_choice,Yes-3\n";
    match TemplateCatalog::from_reader("walk", csv.as_bytes()) {
        Err(CatalogError::InvalidOption { row, value }) => {
            assert_eq!(row, 2);
            assert_eq!(value, "Yes-3");
        }
        other => panic!("expected invalid option, got {other:?}"),
    }

    let csv = "title,category,input_type,required\nGauge reading,Equipment,number,maybe\n";
    match TemplateCatalog::from_reader("walk", csv.as_bytes()) {
        Err(CatalogError::InvalidFlag { row, value }) => {
            assert_eq!(row, 2);
            assert_eq!(value, "maybe");
        }
        other => panic!("expected invalid flag, got {other:?}"),
    }
}

#[test]
fn rejects_duplicate_item_ids() {
    let csv = "item_id,title,category,input_type\n\
note,First note,General,text\n\
note,Second note,General,text\n";

    match TemplateCatalog::from_reader("walk", csv.as_bytes()) {
        Err(CatalogError::DuplicateItem { item_id }) => {
            assert_eq!(item_id.0, "note");
        }
        other => panic!("expected duplicate item, got {other:?}"),
    }
}

#[test]
fn rejects_derived_rows_on_non_number_items() {
    let csv = "item_id,title,category,input_type,depends_on\n\
reading,Gauge reading,Equipment,number,\n\
summary,Reading summary,Equipment,text,reading\n";

    match TemplateCatalog::from_reader("walk", csv.as_bytes()) {
        Err(CatalogError::DerivedNotNumeric { item_id }) => {
            assert_eq!(item_id.0, "summary");
        }
        other => panic!("expected derived not numeric, got {other:?}"),
    }
}

#[test]
fn rejects_unknown_dependencies() {
    let csv = "item_id,title,category,input_type,depends_on\n\
average,Average reading,Equipment,number,reading-1\n";

    match TemplateCatalog::from_reader("walk", csv.as_bytes()) {
        Err(CatalogError::UnknownDependency { item_id, dependency }) => {
            assert_eq!(item_id.0, "average");
            assert_eq!(dependency.0, "reading-1");
        }
        other => panic!("expected unknown dependency, got {other:?}"),
    }
}

#[test]
fn rejects_nested_derived_dependencies() {
    let csv = "item_id,title,category,input_type,depends_on\n\
reading,Gauge reading,Equipment,number,\n\
average,Average reading,Equipment,number,reading\n\
meta,Average of averages,Equipment,number,average\n";

    match TemplateCatalog::from_reader("walk", csv.as_bytes()) {
        Err(CatalogError::NestedDependency { item_id, dependency }) => {
            assert_eq!(item_id.0, "meta");
            assert_eq!(dependency.0, "average");
        }
        other => panic!("expected nested dependency, got {other:?}"),
    }
}

#[test]
fn rejects_cross_category_dependencies() {
    let csv = "item_id,title,category,input_type,depends_on\n\
reading,Gauge reading,Equipment,number,\n\
average,Average reading,Food Safety,number,reading\n";

    match TemplateCatalog::from_reader("walk", csv.as_bytes()) {
        Err(CatalogError::CrossCategoryDependency { item_id, dependency }) => {
            assert_eq!(item_id.0, "average");
            assert_eq!(dependency.0, "reading");
        }
        other => panic!("expected cross category dependency, got {other:?}"),
    }
}

#[test]
fn rejects_non_numeric_dependencies() {
    let csv = "item_id,title,category,input_type,depends_on\n\
note,Walkthrough note,Equipment,text,\n\
average,Average reading,Equipment,number,note\n";

    match TemplateCatalog::from_reader("walk", csv.as_bytes()) {
        Err(CatalogError::NonNumericDependency { item_id, dependency }) => {
            assert_eq!(item_id.0, "average");
            assert_eq!(dependency.0, "note");
        }
        other => panic!("expected non-numeric dependency, got {other:?}"),
    }
}

#[test]
fn aggregate_requires_a_dependency_list() {
    let csv = "item_id,title,category,input_type,depends_on,aggregate\n\
average,Average reading,Equipment,number,,mean\n";

    match TemplateCatalog::from_reader("walk", csv.as_bytes()) {
        Err(CatalogError::MissingField { row, field }) => {
            assert_eq!(row, 2);
            assert_eq!(field, "depends_on");
        }
        other => panic!("expected missing depends_on, got {other:?}"),
    }
}

#[test]
fn aggregate_accepts_average_alias_and_rejects_others() {
    let csv = "item_id,title,category,input_type,depends_on,aggregate\n\
reading,Gauge reading,Equipment,number,,\n\
average,Average reading,Equipment,number,reading,average\n";
    let catalog = TemplateCatalog::from_reader("walk", csv.as_bytes()).expect("template parses");
    let snapshot = catalog.get("walk").expect("template stored");
    let spec = snapshot.items[1].derived_spec.as_ref().expect("derived spec");
    assert_eq!(spec.aggregate, Aggregate::Mean);

    let csv = "item_id,title,category,input_type,depends_on,aggregate\n\
reading,Gauge reading,Equipment,number,,\n\
average,Average reading,Equipment,number,reading,median\n";
    match TemplateCatalog::from_reader("walk", csv.as_bytes()) {
        Err(CatalogError::UnknownAggregate { row, value }) => {
            assert_eq!(row, 3);
            assert_eq!(value, "median");
        }
        other => panic!("expected unknown aggregate, got {other:?}"),
    }
}

#[test]
fn rejects_templates_without_items() {
    let csv = "title,category,input_type\n";

    match TemplateCatalog::from_reader("walk", csv.as_bytes()) {
        Err(CatalogError::Empty(template_id)) => {
            assert_eq!(template_id, "walk");
        }
        other => panic!("expected empty template, got {other:?}"),
    }
}

#[test]
fn from_path_propagates_io_errors() {
    match TemplateCatalog::from_path("walk", "./does-not-exist.csv") {
        Err(CatalogError::Io(_)) => {}
        other => panic!("expected io error, got {other:?}"),
    }
}

#[test]
fn catalog_serves_snapshots_by_template_id() {
    let csv = "title,category,input_type\nWalkthrough notes,General,open_ended\n";
    let catalog = TemplateCatalog::from_reader("walk", csv.as_bytes()).expect("template parses");

    let snapshot = catalog
        .snapshot("walk")
        .expect("directory lookup succeeds")
        .expect("template present");
    assert_eq!(snapshot.template_id, "walk");
    assert!(catalog
        .snapshot("other")
        .expect("directory lookup succeeds")
        .is_none());
    assert_eq!(catalog.template_ids(), vec!["walk"]);
}
