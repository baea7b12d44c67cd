//! Integration tests for model loading and saving.

use std::path::Path;

use chrono::NaiveDate;
use wn_model::{EdgeDef, ModelError, NodeKind, ValidationError};

#[test]
fn bundled_models_load() {
    let model = wn_model::load(Path::new("../../models/reservoir.json")).unwrap();
    assert_eq!(model.metadata.title, "Reservoir supply");
    assert_eq!(model.nodes.len(), 5);
    assert_eq!(model.edges.len(), 4);
    assert_eq!(model.timestepper().unwrap().len(), 365);

    let model = wn_model::load(Path::new("../../models/short_run.yaml")).unwrap();
    assert_eq!(model.timestepper.timestep, 1, "timestep defaults to one day");
    assert_eq!(
        model.timestepper.end,
        NaiveDate::from_ymd_opt(2015, 1, 5).unwrap()
    );
    assert_eq!(
        model.node("Link").map(|n| &n.kind),
        Some(&NodeKind::Link { max_flow: None })
    );
}

#[test]
fn edges_are_pairs() {
    let model = wn_model::from_json_str(
        r#"{
            "timestepper": {"start": "2015-01-01", "end": "2015-01-03"},
            "nodes": [
                {"name": "In", "type": "input", "max_flow": 1.0},
                {"name": "Out", "type": "output", "max_flow": 1.0}
            ],
            "edges": [["In", "Out"]]
        }"#,
    )
    .unwrap();
    assert_eq!(model.edges, vec![EdgeDef::new("In", "Out")]);
    assert_eq!(model.downstream("In").collect::<Vec<_>>(), vec!["Out"]);
    assert_eq!(model.upstream("Out").collect::<Vec<_>>(), vec!["In"]);
}

#[test]
fn invalid_model_is_rejected_on_load() {
    let err = wn_model::from_json_str(
        r#"{
            "timestepper": {"start": "2015-01-01", "end": "2015-01-03"},
            "nodes": [{"name": "In", "type": "input", "max_flow": -1.0}]
        }"#,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ModelError::Validation(ValidationError::InvalidValue { .. })
    ));
}

#[test]
fn save_and_reload_yaml() {
    let model = wn_model::load(Path::new("../../models/reservoir.json")).unwrap();
    let dir = std::env::temp_dir().join(format!("wn-model-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("reservoir.yaml");

    wn_model::save(&path, &model).unwrap();
    let reloaded = wn_model::load(&path).unwrap();
    assert_eq!(reloaded, model);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn unknown_extension_is_rejected() {
    let err = wn_model::load(Path::new("model.txt")).unwrap_err();
    assert!(matches!(err, ModelError::UnsupportedFormat { .. }));
}
