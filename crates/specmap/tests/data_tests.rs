//! Tests for loading configured components and building report data

mod common;

use common::create_temp_project;
use indoc::indoc;
use specmap::config::Config;
use specmap::data::{
    LoadedComponent, build_coverage_data, build_history_data, build_waterfall_data,
    load_component,
};
use specmap::load_config;
use specmap_core::SpecText;

fn load_fixture_config(root: &std::path::Path) -> Config {
    load_config(&root.join("config.yaml")).expect("fixture config loads")
}

#[test]
fn test_load_config() {
    let project = create_temp_project();
    let config = load_fixture_config(project.path());

    assert_eq!(config.component_names(), vec!["libfoo", "libbar"]);
    assert_eq!(config.component("libbar").unwrap().threshold, Some(10.0));

    let options = config.history.reconcile_options();
    assert_eq!(options.user_list_fields.len(), 1);
    assert!(options.user_list_fields.contains("write_permissions"));
}

#[test]
fn test_missing_config_explains_format() {
    let project = tempfile::tempdir().unwrap();
    let err = load_config(&project.path().join("config.yaml")).unwrap_err();
    assert!(err.to_string().contains("Config file not found"), "{err}");
    assert!(err.to_string().contains("components:"), "{err}");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let project = tempfile::tempdir().unwrap();
    let path = project.path().join("config.yaml");
    std::fs::write(
        &path,
        indoc! {"
            components:
              - name: libfoo
                snapshot: libfoo.json
        "},
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    let component = config.component("libfoo").unwrap();
    assert_eq!(component.specification, None);
    assert_eq!(component.threshold, None);
    assert!(config.history.user_list_fields.is_none());
}

#[test]
fn test_coverage_data() {
    let project = create_temp_project();
    let config = load_fixture_config(project.path());
    let data = build_coverage_data(project.path(), &config, 50.0);

    assert_eq!(data.components.len(), 2);

    let libfoo = &data.components[0];
    assert_eq!(libfoo.name, "libfoo");
    // (60% of 35 bytes + 100% of 23 bytes) over 60 bytes
    assert!((libfoo.coverage - 4400.0 / 60.0).abs() < 1e-9);
    assert_eq!(libfoo.threshold, 50.0);
    assert!(libfoo.passing);
    assert!(libfoo.unmapped.is_empty());
    assert!(libfoo.findings.is_empty());

    let lengths: Vec<_> = libfoo.sections.iter().map(|s| s.length).collect();
    assert_eq!(lengths, vec![35, 1, 23, 1]);
    let first = &libfoo.sections[0];
    assert_eq!(first.work_items.requirements.len(), 1);
    assert_eq!(first.work_items.requirements[0].title.as_deref(), Some("Open handles"));
    assert_eq!(first.work_items.requirements[0].coverage, 60.0);
    assert_eq!(first.gap, 40.0);
    assert_eq!(libfoo.sections[2].work_items.justifications.len(), 1);

    let libbar = &data.components[1];
    assert_eq!(libbar.threshold, 10.0);
    assert!(!libbar.passing);
    assert!(libbar.sections.is_empty());
    assert_eq!(libbar.unmapped.len(), 1);
    assert_eq!(libbar.unmapped[0].mapping_id, 20);
    assert_eq!(libbar.findings.len(), 1);
    assert_eq!(libbar.findings[0].code, "specification-unavailable");
}

#[test]
fn test_invalid_snapshot_fails_only_its_component() {
    let project = create_temp_project();
    std::fs::write(
        project.path().join("snapshots/libbar.json"),
        indoc! {r#"
            {
              "component": { "id": 2, "name": "libbar" },
              "mappings": [
                {
                  "id": 20,
                  "parent_kind": "section",
                  "parent_ref": 2,
                  "work_item_kind": "document",
                  "work_item_ref": 400,
                  "section": "bar_close()",
                  "offset": 4,
                  "coverage": 101,
                  "version": 1
                }
              ]
            }
        "#},
    )
    .unwrap();

    let config = load_fixture_config(project.path());
    let data = build_coverage_data(project.path(), &config, 50.0);
    assert_eq!(data.components.len(), 2);

    let libfoo = &data.components[0];
    assert!(libfoo.passing);
    assert_eq!(libfoo.sections.len(), 4);

    let libbar = &data.components[1];
    assert_eq!(libbar.name, "libbar");
    assert!(!libbar.passing);
    assert_eq!(libbar.coverage, 0.0);
    assert!(libbar.sections.is_empty());
    assert_eq!(libbar.findings.len(), 1);
    assert_eq!(libbar.findings[0].code, "load-failed");
    assert!(
        libbar.findings[0].message.contains("mapping row 20"),
        "{}",
        libbar.findings[0].message
    );
}

#[test]
fn test_specification_falls_back_to_snapshot() {
    let project = create_temp_project();
    let mut config = load_fixture_config(project.path());
    config.components[1].specification = None;

    let loaded = LoadedComponent::load(project.path(), &config.components[1]).unwrap();
    assert!(matches!(loaded.spec, SpecText::Unavailable(_)));
}

#[test]
fn test_unknown_component() {
    let project = create_temp_project();
    let config = load_fixture_config(project.path());
    let err = load_component(project.path(), &config, "libbaz")
        .err()
        .expect("unknown component is an error");
    assert!(err.to_string().contains("libfoo, libbar"), "{err}");
}

#[test]
fn test_waterfall_data() {
    let project = create_temp_project();
    let config = load_fixture_config(project.path());
    let loaded = load_component(project.path(), &config, "libfoo").unwrap();

    let waterfall = build_waterfall_data(&loaded, 10).unwrap();
    assert_eq!(waterfall.coverage, 60.0);
    let nodes: Vec<_> = waterfall
        .nodes
        .iter()
        .map(|n| (n.depth, n.mapping_id, n.kind.as_str()))
        .collect();
    assert_eq!(nodes, vec![(0, 10, "requirement"), (1, 11, "test_case")]);
    assert_eq!(waterfall.nodes[1].title.as_deref(), Some("test_open"));

    let err = build_waterfall_data(&loaded, 99).unwrap_err();
    assert!(err.to_string().contains("not found"), "{err}");
}

#[test]
fn test_history_data() {
    let project = create_temp_project();
    let config = load_fixture_config(project.path());
    let loaded = load_component(project.path(), &config, "libfoo").unwrap();
    let options = config.history.reconcile_options();

    let history = build_history_data(&loaded, 10, &options).unwrap();
    let versions: Vec<_> = history.records.iter().map(|r| r.version.as_str()).collect();
    assert_eq!(versions, vec!["2.2", "1.2", "1.1"]);
    assert!(history.findings.is_empty());

    let latest = &history.records[0];
    let field = |name: &str| latest.object.iter().find(|c| c.field == name).unwrap();
    assert_eq!(field("write_permissions").value, "alice, bob");
    assert_eq!(field("write_permissions").editor.as_deref(), Some("bob"));
    // Not configured as a user list, so left raw
    assert_eq!(field("read_denials").value, "[1]");
    assert!(latest.mapping.is_empty());

    let mapping_edit = &history.records[1];
    assert!(mapping_edit.object.is_empty());
    assert_eq!(mapping_edit.mapping[0].field, "coverage");
    assert_eq!(mapping_edit.mapping[0].value, "90");

    let initial = &history.records[2];
    assert!(initial.object.iter().all(|c| c.editor.is_none()));
    assert_eq!(initial.mapping.len(), 1);

    // Test case 200 has no object history
    let malformed = build_history_data(&loaded, 11, &options).unwrap();
    assert!(malformed.records.is_empty());
    assert_eq!(malformed.findings[0].code, "malformed-history");
    assert_eq!(malformed.findings[0].mapping_id, Some(11));
}
