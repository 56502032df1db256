use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::Connection;

use dataset_ingest::import::{BatchImporter, ImportStatus};
use dataset_ingest::registry::{DatasetRecord, DatasetRegistry};
use dataset_ingest::types::ColumnDescriptor;

fn tmp_file(ext: &str, content: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let path = std::env::temp_dir().join(format!("dataset-ingest-import-{nanos}.{ext}"));
    fs::write(&path, content).unwrap();
    path
}

fn register(registry: &DatasetRegistry, path: &Path) -> DatasetRecord {
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    let size = fs::metadata(path).unwrap().len();
    let id = registry.create(&name, path, size).unwrap();
    registry.get(&id).unwrap()
}

fn table_exists(conn: &Connection, name: &str) -> bool {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )
        .unwrap();
    count > 0
}

#[test]
fn batch_size_one_commits_every_row_in_source_order() {
    let registry = DatasetRegistry::open_in_memory().unwrap();
    let path = tmp_file("csv", "a,b\n1,x\n2,y\n");
    let record = register(&registry, &path);

    let importer = BatchImporter::new(registry.connection(), 1);
    let outcome = importer.run(&record, "people").unwrap();

    assert_eq!(outcome.status, ImportStatus::Succeeded);
    assert_eq!(outcome.rows_inserted, 2);
    assert_eq!(outcome.failed_batches, 0);
    assert!(outcome.error.is_none());

    let conn = registry.connection();
    let conn = conn.lock().unwrap();
    let values: Vec<(String, String)> = conn
        .prepare("SELECT \"a\", \"b\" FROM \"people\" ORDER BY \"_row_id\"")
        .unwrap()
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        values,
        vec![
            ("1".to_string(), "x".to_string()),
            ("2".to_string(), "y".to_string()),
        ]
    );

    let _ = fs::remove_file(&path);
}

#[test]
fn decode_error_after_k_rows_commits_exactly_k() {
    let registry = DatasetRegistry::open_in_memory().unwrap();
    let path = tmp_file("json", r#"[{"a":1},{"a":2},{"a":}]"#);
    let record = register(&registry, &path);

    let importer = BatchImporter::new(registry.connection(), 1);
    let outcome = importer.run(&record, "partial").unwrap();

    assert_eq!(outcome.status, ImportStatus::PartiallySucceeded);
    assert_eq!(outcome.rows_inserted, 2);
    assert!(outcome.error.is_some());

    let conn = registry.connection();
    let conn = conn.lock().unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM \"partial\"", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 2);

    let _ = fs::remove_file(&path);
}

#[test]
fn column_names_are_sanitized_for_the_destination() {
    let registry = DatasetRegistry::open_in_memory().unwrap();
    let path = tmp_file("csv", "Customer Name!,amount\nAda,10\n");
    let record = register(&registry, &path);

    let importer = BatchImporter::new(registry.connection(), 50);
    let outcome = importer.run(&record, "customers").unwrap();
    assert_eq!(outcome.rows_inserted, 1);

    let conn = registry.connection();
    let conn = conn.lock().unwrap();
    let name: String = conn
        .query_row("SELECT \"Customer_Name\" FROM \"customers\"", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(name, "Ada");

    let _ = fs::remove_file(&path);
}

#[test]
fn colliding_sanitized_names_get_positional_suffixes() {
    let registry = DatasetRegistry::open_in_memory().unwrap();
    let path = tmp_file("csv", "a b,a-b\n1,2\n");
    let record = register(&registry, &path);

    let importer = BatchImporter::new(registry.connection(), 50);
    importer.run(&record, "collisions").unwrap();

    let conn = registry.connection();
    let conn = conn.lock().unwrap();
    let (first, second): (String, String) = conn
        .query_row(
            "SELECT \"a_b\", \"a_b_2\" FROM \"collisions\"",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!((first.as_str(), second.as_str()), ("1", "2"));

    let _ = fs::remove_file(&path);
}

#[test]
fn empty_source_succeeds_without_creating_a_table() {
    let registry = DatasetRegistry::open_in_memory().unwrap();
    let path = tmp_file("csv", "a,b\n");
    let record = register(&registry, &path);

    let importer = BatchImporter::new(registry.connection(), 50);
    let outcome = importer.run(&record, "empty_target").unwrap();

    assert_eq!(outcome.status, ImportStatus::Succeeded);
    assert_eq!(outcome.rows_inserted, 0);

    let conn = registry.connection();
    let conn = conn.lock().unwrap();
    assert!(!table_exists(&conn, "empty_target"));

    let _ = fs::remove_file(&path);
}

#[test]
fn recorded_census_defines_the_destination_schema() {
    let registry = DatasetRegistry::open_in_memory().unwrap();
    let path = tmp_file("json", r#"[{"a":1,"b":2},{"a":3}]"#);
    let record = register(&registry, &path);
    registry
        .record_census(&record.id, &[ColumnDescriptor::new("a", "integer")], 2)
        .unwrap();
    let record = registry.get(&record.id).unwrap();

    let importer = BatchImporter::new(registry.connection(), 50);
    let outcome = importer.run(&record, "census_bound").unwrap();
    assert_eq!(outcome.rows_inserted, 2);

    // _row_id plus the single census column; the b key is not projected.
    let conn = registry.connection();
    let conn = conn.lock().unwrap();
    let column_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('census_bound')",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(column_count, 2);

    let _ = fs::remove_file(&path);
}

#[test]
fn import_into_existing_table_fails_without_committing() {
    let registry = DatasetRegistry::open_in_memory().unwrap();
    let path = tmp_file("csv", "a,b\n1,x\n");
    let record = register(&registry, &path);

    {
        let conn = registry.connection();
        let conn = conn.lock().unwrap();
        conn.execute("CREATE TABLE \"taken\" (x)", []).unwrap();
    }

    let importer = BatchImporter::new(registry.connection(), 50);
    let outcome = importer.run(&record, "taken").unwrap();

    assert_eq!(outcome.status, ImportStatus::Failed);
    assert_eq!(outcome.rows_inserted, 0);
    assert!(outcome.error.is_some());

    let _ = fs::remove_file(&path);
}

#[test]
fn scalar_kinds_survive_the_round_trip() {
    let registry = DatasetRegistry::open_in_memory().unwrap();
    let path = tmp_file(
        "json",
        r#"[{"i":7,"f":1.5,"b":true,"t":"hi","n":null}]"#,
    );
    let record = register(&registry, &path);

    let importer = BatchImporter::new(registry.connection(), 50);
    let outcome = importer.run(&record, "kinds").unwrap();
    assert_eq!(outcome.rows_inserted, 1);

    let conn = registry.connection();
    let conn = conn.lock().unwrap();
    let (i, f, b, t, n): (i64, f64, i64, String, Option<String>) = conn
        .query_row(
            "SELECT \"i\", \"f\", \"b\", \"t\", \"n\" FROM \"kinds\"",
            [],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            },
        )
        .unwrap();
    assert_eq!((i, f, b, t.as_str(), n), (7, 1.5, 1, "hi", None));

    let _ = fs::remove_file(&path);
}
