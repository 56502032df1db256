use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use rust_xlsxwriter::Workbook;

use dataset_ingest::census::scan_stream;
use dataset_ingest::decode::{RowReader, SourceFormat};
use dataset_ingest::types::Value;

fn tmp_path() -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("dataset-ingest-workbook-{nanos}.xlsx"))
}

fn write_people_workbook(path: &PathBuf) {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.set_name("Sheet1").unwrap();
    ws.write_string(0, 0, "id").unwrap();
    ws.write_string(0, 1, "name").unwrap();
    ws.write_string(0, 2, "score").unwrap();
    ws.write_string(0, 3, "active").unwrap();
    ws.write_number(1, 0, 1).unwrap();
    ws.write_string(1, 1, "Ada").unwrap();
    ws.write_number(1, 2, 98.5).unwrap();
    ws.write_boolean(1, 3, true).unwrap();
    ws.write_number(2, 0, 2).unwrap();
    ws.write_string(2, 1, "Grace").unwrap();
    ws.write_number(2, 2, 87.25).unwrap();
    ws.write_boolean(2, 3, false).unwrap();
    wb.save(path).unwrap();
}

#[test]
fn decodes_first_sheet_with_header_row() {
    let path = tmp_path();
    write_people_workbook(&path);

    let reader = RowReader::open(&path, SourceFormat::Workbook).unwrap();
    let scan = scan_stream(reader, 5);

    assert!(scan.decode_error.is_none());
    assert_eq!(scan.row_count, 2);
    let names: Vec<&str> = scan.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "name", "score", "active"]);
    assert_eq!(
        scan.preview[0].get("name"),
        Some(&Value::Text("Ada".to_string()))
    );
    assert_eq!(scan.preview[0].get("score"), Some(&Value::Float(98.5)));
    assert_eq!(scan.preview[1].get("active"), Some(&Value::Bool(false)));

    let _ = fs::remove_file(&path);
}

#[test]
fn short_rows_are_padded_with_absent_values() {
    let path = tmp_path();
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.write_string(0, 0, "a").unwrap();
    ws.write_string(0, 1, "b").unwrap();
    ws.write_string(0, 2, "c").unwrap();
    ws.write_string(1, 0, "only").unwrap();
    wb.save(&path).unwrap();

    let reader = RowReader::open(&path, SourceFormat::Workbook).unwrap();
    let rows: Vec<_> = reader.map(Result::unwrap).collect();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("a"), Some(&Value::Text("only".to_string())));
    assert_eq!(rows[0].get("b"), Some(&Value::Null));
    assert_eq!(rows[0].get("c"), Some(&Value::Null));

    let _ = fs::remove_file(&path);
}

#[test]
fn only_the_first_sheet_is_read() {
    let path = tmp_path();
    let mut wb = Workbook::new();
    let ws1 = wb.add_worksheet();
    ws1.set_name("First").unwrap();
    ws1.write_string(0, 0, "a").unwrap();
    ws1.write_number(1, 0, 1).unwrap();

    let ws2 = wb.add_worksheet();
    ws2.set_name("Second").unwrap();
    ws2.write_string(0, 0, "a").unwrap();
    ws2.write_number(1, 0, 2).unwrap();
    ws2.write_number(2, 0, 3).unwrap();
    wb.save(&path).unwrap();

    let reader = RowReader::open(&path, SourceFormat::Workbook).unwrap();
    let scan = scan_stream(reader, 5);

    assert_eq!(scan.row_count, 1);
    assert_eq!(scan.preview[0].get("a"), Some(&Value::Float(1.0)));

    let _ = fs::remove_file(&path);
}
