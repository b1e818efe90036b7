mod common;

use std::io::Write;

use catsim::{CatConfig, ConfigError, ItemBank};

#[test]
fn sample_files_load_from_disk() {
    let root = env!("CARGO_MANIFEST_DIR");
    let bank = ItemBank::from_json_file(format!("{root}/data/item_bank.json")).unwrap();
    assert_eq!(bank.len(), 20);

    let config = CatConfig::from_toml_file(format!("{root}/data/cat.toml")).unwrap();
    assert_eq!(config, common::scenario_config());
}

#[test]
fn bare_array_bank_file_loads() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[{{"id": 7, "category_count": 3, "discrimination": 1.1, "thresholds": [-0.5, 0.5], "reverse_flag": true}}]"#
    )
    .unwrap();

    let bank = ItemBank::from_json_file(file.path()).unwrap();
    let item = bank.get(7).unwrap();
    assert!(item.is_reverse());
    assert_eq!(item.category_count(), 3);
}

#[test]
fn invalid_config_file_is_rejected_before_any_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cat.toml");
    let sample = include_str!("../data/cat.toml").replace("min_items = 8", "min_items = 20");
    std::fs::write(&path, sample).unwrap();

    let err = CatConfig::from_toml_file(&path).unwrap_err();
    assert_eq!(
        err,
        ConfigError::ItemLimits {
            min_items: 20,
            max_items: 15,
        }
    );
}

#[test]
fn config_file_missing_a_field_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cat.toml");
    std::fs::write(&path, "min_items = 8\nmax_items = 15\n").unwrap();

    let err = CatConfig::from_toml_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
}

#[test]
fn missing_file_reports_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ItemBank::from_json_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
