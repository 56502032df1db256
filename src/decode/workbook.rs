//! Spreadsheet workbook decoder.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::error::{PipelineError, PipelineResult};
use crate::types::{Row, Value};

use super::SourceFormat;

/// Row reader over the first sheet of a workbook.
///
/// Behavior:
/// - Only the first sheet is read.
/// - The first row encountered provides the header labels.
/// - Data rows are zipped positionally to the header; rows shorter than the
///   header are padded with absent ([`Value::Null`]) values.
///
/// `calamine` materializes the sheet's cell range up front; rows are lazily
/// converted from there.
pub struct WorkbookReader {
    headers: Vec<String>,
    rows: std::vec::IntoIter<Vec<Data>>,
}

impl WorkbookReader {
    /// Open a workbook and position the reader past the header row of its
    /// first sheet.
    pub fn open(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let mut workbook = open_workbook_auto(path).map_err(map_workbook_error)?;
        let sheet = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| {
                PipelineError::format(SourceFormat::Workbook, "workbook has no sheets", None)
            })?;
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(map_workbook_error)?;

        let mut rows = range.rows();
        let headers = match rows.next() {
            Some(cells) => cells.iter().map(cell_to_header_string).collect(),
            None => Vec::new(),
        };
        let data_rows: Vec<Vec<Data>> = rows.map(<[Data]>::to_vec).collect();

        Ok(Self {
            headers,
            rows: data_rows.into_iter(),
        })
    }

    /// Header labels from the first row of the first sheet.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl Iterator for WorkbookReader {
    type Item = PipelineResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let cells = self.rows.next()?;
        let fields = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let cell = cells.get(i).unwrap_or(&Data::Empty);
                (header.clone(), cell_to_value(cell))
            })
            .collect();
        Some(Ok(Row::from_pairs(fields)))
    }
}

fn map_workbook_error(err: calamine::Error) -> PipelineError {
    match err {
        calamine::Error::Io(e) => PipelineError::Io(e),
        other => PipelineError::format(SourceFormat::Workbook, other.to_string(), None),
    }
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(f) => f.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
        Data::Empty => String::new(),
    }
}

fn cell_to_value(c: &Data) -> Value {
    match c {
        Data::Empty => Value::Null,
        Data::String(s) => Value::Text(s.clone()),
        Data::Int(i) => Value::Int(*i),
        Data::Float(f) => Value::Float(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(f) => Value::Text(f.to_string()),
        Data::DateTimeIso(s) => Value::Text(s.clone()),
        Data::DurationIso(s) => Value::Text(s.clone()),
        Data::Error(e) => Value::Text(format!("{e:?}")),
    }
}
