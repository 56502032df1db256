//! Delimited-text decoder (CSV/TSV).

use std::fs::File;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::types::{Row, Value};

use super::SourceFormat;

/// Streaming row reader over a delimited text file.
///
/// Rules:
///
/// - The first non-empty line is the header; its labels become the column
///   names of every row.
/// - Fields are zipped positionally against the header. A record shorter
///   than the header yields absent ([`Value::Null`]) values for the missing
///   positions; extra trailing fields are ignored.
/// - Empty fields map to [`Value::Null`]; everything else stays verbatim
///   [`Value::Text`].
pub struct DelimitedReader {
    format: SourceFormat,
    headers: Vec<String>,
    records: csv::StringRecordsIntoIter<File>,
    done: bool,
}

impl DelimitedReader {
    /// Open a delimited file and read its header record.
    pub fn open(path: impl AsRef<Path>, format: SourceFormat) -> PipelineResult<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(format.delimiter())
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|e| map_csv_error(format, e))?;
        let headers = rdr
            .headers()
            .map_err(|e| map_csv_error(format, e))?
            .iter()
            .map(str::to_string)
            .collect();

        Ok(Self {
            format,
            headers,
            records: rdr.into_records(),
            done: false,
        })
    }

    /// Header labels, in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl Iterator for DelimitedReader {
    type Item = PipelineResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.records.next()? {
            Ok(record) => {
                let fields = self
                    .headers
                    .iter()
                    .enumerate()
                    .map(|(i, header)| {
                        let value = match record.get(i) {
                            None | Some("") => Value::Null,
                            Some(raw) => Value::Text(raw.to_string()),
                        };
                        (header.clone(), value)
                    })
                    .collect();
                Some(Ok(Row::from_pairs(fields)))
            }
            Err(e) => {
                // Fatal: the stream ends after the first decode error.
                self.done = true;
                Some(Err(map_csv_error(self.format, e)))
            }
        }
    }
}

fn map_csv_error(format: SourceFormat, err: csv::Error) -> PipelineError {
    let offset = err.position().map(csv::Position::byte);
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(e) => PipelineError::Io(e),
        _ => PipelineError::format(format, message, offset),
    }
}
