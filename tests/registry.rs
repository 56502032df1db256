use std::path::Path;
use std::thread;
use std::time::Duration;

use dataset_ingest::registry::DatasetRegistry;
use dataset_ingest::types::ColumnDescriptor;
use dataset_ingest::PipelineError;

fn columns_ab() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new("a", "integer"),
        ColumnDescriptor::new("b", "text"),
    ]
}

#[test]
fn create_then_get_roundtrips_the_record() {
    let registry = DatasetRegistry::open_in_memory().unwrap();
    let id = registry
        .create("people.csv", Path::new("/tmp/people.csv"), 57)
        .unwrap();

    let record = registry.get(&id).unwrap();
    assert_eq!(record.id, id);
    assert_eq!(record.name, "people.csv");
    assert_eq!(record.size_bytes, 57);
    assert!(record.row_count.is_none());
    assert!(record.columns.is_none());
    assert!(!record.uploaded_at.is_empty());
}

#[test]
fn get_unknown_id_is_not_found() {
    let registry = DatasetRegistry::open_in_memory().unwrap();
    let err = registry.get("nope").unwrap_err();
    assert!(matches!(err, PipelineError::NotFound { .. }));
}

#[test]
fn list_orders_most_recent_first() {
    let registry = DatasetRegistry::open_in_memory().unwrap();
    let first = registry
        .create("first.csv", Path::new("/tmp/first.csv"), 1)
        .unwrap();
    thread::sleep(Duration::from_millis(5));
    let second = registry
        .create("second.csv", Path::new("/tmp/second.csv"), 2)
        .unwrap();

    let summaries = registry.list().unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].id, second);
    assert_eq!(summaries[1].id, first);
}

#[test]
fn census_is_set_once() {
    let registry = DatasetRegistry::open_in_memory().unwrap();
    let id = registry
        .create("people.csv", Path::new("/tmp/people.csv"), 57)
        .unwrap();

    registry.record_census(&id, &columns_ab(), 2).unwrap();

    let record = registry.get(&id).unwrap();
    assert_eq!(record.row_count, Some(2));
    assert_eq!(record.column_count, Some(2));
    assert_eq!(record.columns, Some(columns_ab()));
}

#[test]
fn identical_census_rerecord_is_a_noop() {
    let registry = DatasetRegistry::open_in_memory().unwrap();
    let id = registry
        .create("people.csv", Path::new("/tmp/people.csv"), 57)
        .unwrap();

    registry.record_census(&id, &columns_ab(), 2).unwrap();
    registry.record_census(&id, &columns_ab(), 2).unwrap();

    assert_eq!(registry.get(&id).unwrap().row_count, Some(2));
}

#[test]
fn conflicting_census_rerecord_is_rejected() {
    let registry = DatasetRegistry::open_in_memory().unwrap();
    let id = registry
        .create("people.csv", Path::new("/tmp/people.csv"), 57)
        .unwrap();

    registry.record_census(&id, &columns_ab(), 2).unwrap();
    let err = registry.record_census(&id, &columns_ab(), 3).unwrap_err();
    assert!(matches!(err, PipelineError::RegistryConflict { .. }));

    // The original census survives.
    assert_eq!(registry.get(&id).unwrap().row_count, Some(2));
}

#[test]
fn census_for_unknown_id_is_not_found() {
    let registry = DatasetRegistry::open_in_memory().unwrap();
    let err = registry.record_census("nope", &columns_ab(), 1).unwrap_err();
    assert!(matches!(err, PipelineError::NotFound { .. }));
}
