//! Integration tests for realizations read from disk
//!
//! Every test builds its own realization tree in a temporary directory.

mod common;

use chrono::NaiveDate;
use common::{EnsembleFixture, NPV, VOLUMES, write_realization};
use ensembledb::prelude::*;
use std::fs;

fn date(y: i32, m: u32, d: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
}

#[test]
fn test_open_loads_parameters_and_timeline() {
    let fixture = EnsembleFixture::new(4);
    let real = RealizationStore::open(fixture.realization(3)).unwrap();

    assert_eq!(real.index(), Some(3));
    assert!(real.origin().is_absolute());

    let params = real.parameters().unwrap();
    assert_eq!(params.get("FWL"), Some(&Value::Integer(1730)));
    assert_eq!(params.get("MULTFLT"), Some(&Value::Float(1.25)));
    assert_eq!(params.get("ZONE_NAME"), Some(&Value::Text("Upper".into())));

    let timeline = real.get("STATUS").unwrap().as_table().unwrap();
    // Three jobs ran, the sidecar lists a fourth that never started
    assert_eq!(timeline.row_count(), 4);
    assert!(timeline.has_column("FORWARD_MODEL"));
    assert!(timeline.has_column("executable"));
    assert_eq!(timeline.value(2, "DURATION"), Some(&Value::Float(195.0)));

    let mut keys = real.keys();
    keys.sort();
    assert_eq!(keys, vec!["STATUS", "parameters.txt"]);
}

#[test]
fn test_open_without_status_is_structural_error() {
    let fixture = EnsembleFixture::new(1);
    fs::remove_file(fixture.realization(0).join("STATUS")).unwrap();

    let result = RealizationStore::open(fixture.realization(0));
    assert!(matches!(result, Err(EnsembleError::Structural(_))));
}

#[test]
fn test_completion_follows_ok_marker() {
    let fixture = EnsembleFixture::new(2);
    assert!(RealizationStore::open(fixture.realization(0)).unwrap().is_complete());
    assert!(!RealizationStore::open(fixture.realization(1)).unwrap().is_complete());
}

#[test]
fn test_cached_data_survives_file_removal() {
    let fixture = EnsembleFixture::new(1);
    let mut real = RealizationStore::open(fixture.realization(0)).unwrap();

    let first = real.load_table(VOLUMES, true, false).unwrap().unwrap();
    fs::remove_file(fixture.realization(0).join(VOLUMES)).unwrap();

    let second = real.load_table(VOLUMES, true, false).unwrap().unwrap();
    assert_eq!(first, second);

    let forced = real.load_table(VOLUMES, true, true);
    assert!(matches!(forced, Err(EnsembleError::FileNotFound(_))));
}

#[test]
fn test_force_reload_picks_up_changes() {
    let fixture = EnsembleFixture::new(1);
    let mut real = RealizationStore::open(fixture.realization(0)).unwrap();

    assert_eq!(real.load_scalar(NPV, true, false).unwrap(), Some(Value::Integer(3000)));
    fs::write(fixture.realization(0).join(NPV), "4200.5\n").unwrap();

    assert_eq!(real.load_scalar(NPV, true, false).unwrap(), Some(Value::Integer(3000)));
    assert_eq!(real.load_scalar(NPV, true, true).unwrap(), Some(Value::Float(4200.5)));
}

#[test]
fn test_numeric_inference_can_be_disabled() {
    let fixture = EnsembleFixture::new(1);
    let mut real = RealizationStore::open(fixture.realization(0)).unwrap();

    let text = real.load_keyvalue("parameters.txt", false, true).unwrap();
    assert_eq!(text.get("FWL"), Some(&Value::Text("1700".into())));

    let table = real.load_table(VOLUMES, false, false).unwrap().unwrap();
    assert_eq!(table.value(0, "FIPNUM"), Some(&Value::Text("1".into())));
}

#[test]
fn test_empty_table_file_is_cached_as_absent() {
    let fixture = EnsembleFixture::new(1);
    let root = fixture.realization(0);
    fs::write(root.join("share/results/tables/empty.csv"), "").unwrap();

    let mut real = RealizationStore::open(&root).unwrap();
    assert!(real.load_table("share/results/tables/empty.csv", true, false).unwrap().is_none());
    assert!(real.get("empty.csv").unwrap().is_absent());
    assert!(real.load_table("share/results/tables/empty.csv", true, false).unwrap().is_none());
}

#[test]
fn test_loading_with_another_format_needs_force() {
    let fixture = EnsembleFixture::new(1);
    let mut real = RealizationStore::open(fixture.realization(0)).unwrap();

    real.load_scalar(NPV, true, false).unwrap();
    let mismatch = real.load_keyvalue(NPV, true, false);
    assert!(matches!(mismatch, Err(EnsembleError::TypeMismatch(_))));

    let reread = real.load_file(NPV, FileFormat::Text, true, true).unwrap();
    assert!(reread.as_key_values().is_some());
}

#[test]
fn test_shorthand_lookup() {
    let fixture = EnsembleFixture::new(1);
    let mut real = RealizationStore::open(fixture.realization(0)).unwrap();
    let table = real.load_table(VOLUMES, true, false).unwrap().unwrap();

    for key in [
        VOLUMES,
        "simulator_volume_fipnum.csv",
        "share/results/volumes/simulator_volume_fipnum",
        "simulator_volume_fipnum",
    ] {
        assert_eq!(real.get(key).unwrap().as_table(), Some(&table), "lookup by {}", key);
    }
    assert!(matches!(real.get("volumes"), Err(EnsembleError::KeyNotFound(_))));
}

#[test]
fn test_shorthand_ambiguity() {
    let fixture = EnsembleFixture::new(1);
    let root = fixture.realization(0);
    let duplicate = "share/results/tables/simulator_volume_fipnum.csv";
    fs::copy(root.join(VOLUMES), root.join(duplicate)).unwrap();

    let mut real = RealizationStore::open(&root).unwrap();
    real.load_table(VOLUMES, true, false).unwrap();
    real.load_table(duplicate, true, false).unwrap();

    for key in ["simulator_volume_fipnum.csv", "simulator_volume_fipnum"] {
        match real.get(key) {
            Err(EnsembleError::AmbiguousKey { candidates, .. }) => assert_eq!(candidates.len(), 2),
            other => panic!("expected ambiguity for {}, got {:?}", key, other),
        }
    }
    assert!(real.get("share/results/tables/simulator_volume_fipnum").is_ok());
}

#[test]
fn test_delete_is_exact_and_idempotent() {
    let fixture = EnsembleFixture::new(1);
    let mut real = RealizationStore::open(fixture.realization(0)).unwrap();
    real.load_table(VOLUMES, true, false).unwrap();

    real.delete("simulator_volume_fipnum.csv");
    assert!(real.contains_key(VOLUMES));

    real.delete(VOLUMES);
    real.delete(VOLUMES);
    assert!(!real.contains_key(VOLUMES));
}

#[test]
fn test_discover_files_with_metadata() {
    let fixture = EnsembleFixture::new(1);
    let mut real = RealizationStore::open(fixture.realization(0)).unwrap();

    let mut metadata = FileMetadata::new();
    metadata.insert("GRIDTYPE".into(), Value::from("volumes"));
    let found = real.discover(&["share/results/volumes/*.csv"], Some(&metadata)).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].filetype, "csv");
    assert_eq!(found[0].localpath, VOLUMES);

    let files = real.files().to_table().unwrap();
    assert_eq!(&files.columns()[..4], &["FULLPATH", "FILETYPE", "LOCALPATH", "BASENAME"]);
    assert!(files.has_column("GRIDTYPE"));
    // STATUS, jobs.json, OK, parameters.txt and the volumes table
    assert_eq!(files.row_count(), 5);

    let no_match = real.discover(&["share/results/grids/*.roff"], None).unwrap();
    assert!(no_match.is_empty());
}

#[test]
fn test_snapshot_is_independent_of_store() {
    let fixture = EnsembleFixture::new(1);
    let mut real = RealizationStore::open(fixture.realization(0)).unwrap();
    real.load_table(VOLUMES, true, false).unwrap();

    let snapshot = real.snapshot(Some("frozen"), true);
    real.delete(VOLUMES);

    assert_eq!(snapshot.name(), "frozen");
    assert!(snapshot.contains_key(VOLUMES));
    assert_eq!(snapshot.parameters().unwrap().get("FWL"), Some(&Value::Integer(1700)));
}

#[test]
fn test_summary_at_raw_and_yearly_resolution() {
    let fixture = EnsembleFixture::new(2);
    let mut real = RealizationStore::open(fixture.realization(1)).unwrap();
    assert!(real.has_summary());

    let raw = real.summary(&TimeIndex::default(), &[]).unwrap();
    assert_eq!(raw.columns(), &["DATE", "FOPR", "FOPT", "WOPR:OP_1"]);
    assert_eq!(raw.row_count(), 5);
    assert!(real.contains_key("share/results/tables/unsmry-raw.csv"));

    let yearly = real.summary(&Frequency::Yearly.into(), &["FOPT".to_string()]).unwrap();
    assert_eq!(yearly.columns(), &["DATE", "FOPT"]);
    let dates: Vec<_> = yearly.column("DATE").unwrap().filter_map(Value::as_timestamp).collect();
    assert_eq!(dates, vec![date(2000, 1, 1), date(2001, 1, 1), date(2002, 1, 1), date(2003, 1, 1)]);
    assert_eq!(yearly.value(2, "FOPT").unwrap().as_f64(), Some(8000.0));
    assert!(real.contains_key("share/results/tables/unsmry-yearly.csv"));
}

#[test]
fn test_summary_on_custom_dates_interpolates() {
    let fixture = EnsembleFixture::new(1);
    let mut real = RealizationStore::open(fixture.realization(0)).unwrap();

    let targets = vec![date(2000, 4, 1), date(2010, 1, 1)];
    let table = real.summary(&TimeIndex::from(targets), &["FOPT".to_string()]).unwrap();
    assert_eq!(table.row_count(), 2);
    // Halfway between the first two reports
    assert_eq!(table.value(0, "FOPT").unwrap().as_f64(), Some(500.0));
    // Clamped to the last report
    assert_eq!(table.value(1, "FOPT").unwrap().as_f64(), Some(6000.0));
    assert!(real.contains_key("share/results/tables/unsmry-custom.csv"));
}

#[test]
fn test_summary_keys_dates_and_values() {
    let fixture = EnsembleFixture::new(1);
    let mut real = RealizationStore::open(fixture.realization(0)).unwrap();

    assert_eq!(real.summary_keys(&["F*".to_string()]).unwrap(), vec!["FOPR", "FOPT"]);
    assert_eq!(real.summary_dates(Frequency::Last), Some(vec![date(2003, 1, 2)]));
    assert_eq!(real.summary_dates(Frequency::Monthly).map(|d| d.len()), Some(37));

    let values = real.summary_values(&["WOPR:*".to_string()]).unwrap();
    assert_eq!(values.columns(), &["DATE", "WOPR:OP_1"]);
    assert!(!real.contains_key("share/results/tables/unsmry-raw.csv"));
}

#[test]
fn test_missing_summary_gives_empty_table() {
    let fixture = EnsembleFixture::new(1);
    let root = fixture.realization(0);
    fs::remove_file(root.join("eclipse/model/MODEL-0.UNSMRY")).unwrap();

    let mut real = RealizationStore::open(&root).unwrap();
    assert!(!real.has_summary());
    assert!(real.summary(&Frequency::Monthly.into(), &[]).unwrap().is_empty());
    assert!(real.summary_dates(Frequency::Raw).is_none());
    assert!(!real.contains_key("share/results/tables/unsmry-monthly.csv"));
}

#[test]
fn test_custom_index_pattern() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path().join("member_7");
    write_realization(&root, 7);

    let config = RealizationConfig::default().index_pattern(r"member_(\d+)").unwrap();
    let real = RealizationStore::with_config(&root, config, &tracing::Span::none()).unwrap();
    assert_eq!(real.index(), Some(7));
}
