//! JSON decoders.
//!
//! Supported inputs:
//! - A single top-level JSON array of objects (`.json`), parsed
//!   incrementally element-at-a-time — the array is never materialized.
//! - Newline-delimited JSON objects (`.ndjson`), one row per non-empty line.
//!
//! Anything else at the top level is a [`PipelineError::Format`].

use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines, Read};
use std::path::Path;

use serde::Deserialize;

use crate::error::{PipelineError, PipelineResult};
use crate::types::{Row, Value};

use super::SourceFormat;

/// Byte reader with a one-byte lookahead and a consumed-byte counter, used
/// to hand out error offsets and to walk the `[ value , value ]` framing
/// around the per-element `serde_json` parses.
struct ByteScanner<R> {
    inner: R,
    peeked: Option<u8>,
    offset: u64,
}

impl<R: Read> ByteScanner<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            peeked: None,
            offset: 0,
        }
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        if let Some(b) = self.peeked.take() {
            return Ok(Some(b));
        }
        let mut buf = [0u8; 1];
        match self.inner.read(&mut buf)? {
            0 => Ok(None),
            _ => {
                self.offset += 1;
                Ok(Some(buf[0]))
            }
        }
    }

    fn peek_byte(&mut self) -> io::Result<Option<u8>> {
        if self.peeked.is_none() {
            self.peeked = self.next_byte()?;
        }
        Ok(self.peeked)
    }

    /// Consume whitespace, leaving the scanner at the next significant byte.
    fn skip_whitespace(&mut self) -> io::Result<()> {
        while let Some(b) = self.peek_byte()? {
            if b.is_ascii_whitespace() {
                self.peeked = None;
            } else {
                break;
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for ByteScanner<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(b) = self.peeked.take() {
            buf[0] = b;
            return Ok(1);
        }
        let n = self.inner.read(buf)?;
        self.offset += n as u64;
        Ok(n)
    }
}

enum ArrayState {
    /// Nothing read yet; expect `[`.
    Start,
    /// Inside the array; expect an object element.
    Elements,
    /// Natural end or fatal error already surfaced.
    Done,
}

/// Incremental reader over a top-level JSON array of objects.
///
/// Each element is parsed with its own `serde_json` deserializer; objects
/// are self-delimiting, so the scanner resumes right after the closing `}`
/// to consume the `,`/`]` framing itself.
pub struct JsonArrayReader {
    scanner: ByteScanner<BufReader<File>>,
    state: ArrayState,
    /// 1-based index of the element being read, for error messages.
    element: usize,
    /// Separator error detected after a successfully parsed element; yielded
    /// on the next call so the parsed row is not discarded.
    pending: Option<PipelineError>,
}

impl JsonArrayReader {
    /// Open a JSON file; the array framing is validated lazily on first read.
    pub fn open(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let file = File::open(path)?;
        Ok(Self {
            scanner: ByteScanner::new(BufReader::new(file)),
            state: ArrayState::Start,
            element: 0,
            pending: None,
        })
    }

    fn fail(&mut self, message: String) -> PipelineError {
        self.state = ArrayState::Done;
        PipelineError::format(SourceFormat::Json, message, Some(self.scanner.offset))
    }

    fn read_next(&mut self) -> PipelineResult<Option<Row>> {
        if let Some(err) = self.pending.take() {
            self.state = ArrayState::Done;
            return Err(err);
        }

        if matches!(self.state, ArrayState::Start) {
            self.scanner.skip_whitespace()?;
            match self.scanner.next_byte()? {
                Some(b'[') => {}
                Some(b) => {
                    return Err(self.fail(format!(
                        "top-level value is not an array (starts with '{}')",
                        b as char
                    )));
                }
                None => return Err(self.fail("source is empty".to_string())),
            }
            self.scanner.skip_whitespace()?;
            if self.scanner.peek_byte()? == Some(b']') {
                self.state = ArrayState::Done;
                return Ok(None);
            }
            self.state = ArrayState::Elements;
        }

        if matches!(self.state, ArrayState::Done) {
            return Ok(None);
        }

        self.element += 1;
        self.scanner.skip_whitespace()?;
        match self.scanner.peek_byte()? {
            Some(b'{') => {}
            Some(_) => {
                let element = self.element;
                return Err(self.fail(format!("array element {element} is not an object")));
            }
            None => return Err(self.fail("unexpected end of input inside array".to_string())),
        }

        let parsed = {
            let mut de = serde_json::Deserializer::from_reader(&mut self.scanner);
            serde_json::Map::<String, serde_json::Value>::deserialize(&mut de)
        };
        let object = match parsed {
            Ok(object) => object,
            Err(e) => {
                let element = self.element;
                return Err(self.fail(format!("array element {element}: {e}")));
            }
        };
        let row = object_to_row(object);

        // Consume the separator; a framing error here is reported on the
        // next call so this row still reaches the caller.
        if let Err(e) = self.consume_separator() {
            self.pending = Some(e);
        }
        Ok(Some(row))
    }

    fn consume_separator(&mut self) -> PipelineResult<()> {
        self.scanner.skip_whitespace()?;
        match self.scanner.next_byte()? {
            Some(b',') => Ok(()),
            Some(b']') => {
                self.state = ArrayState::Done;
                Ok(())
            }
            Some(b) => Err(self.fail(format!(
                "expected ',' or ']' after array element, found '{}'",
                b as char
            ))),
            None => Err(self.fail("unexpected end of input inside array".to_string())),
        }
    }
}

impl Iterator for JsonArrayReader {
    type Item = PipelineResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Reader over newline-delimited JSON objects.
///
/// Empty lines are skipped; every other line must be a single JSON object.
pub struct JsonLinesReader {
    lines: Lines<BufReader<File>>,
    line_no: usize,
    done: bool,
}

impl JsonLinesReader {
    /// Open an NDJSON file.
    pub fn open(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let file = File::open(path)?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_no: 0,
            done: false,
        })
    }
}

impl Iterator for JsonLinesReader {
    type Item = PipelineResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.done = true;
                    return Some(Err(PipelineError::Io(e)));
                }
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            return match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(
                line.trim(),
            ) {
                Ok(object) => Some(Ok(object_to_row(object))),
                Err(e) => {
                    self.done = true;
                    Some(Err(PipelineError::format(
                        SourceFormat::NdJson,
                        format!("invalid ndjson at line {}: {e}", self.line_no),
                        None,
                    )))
                }
            };
        }
    }
}

fn object_to_row(object: serde_json::Map<String, serde_json::Value>) -> Row {
    let fields = object
        .into_iter()
        .map(|(name, value)| (name, json_scalar(value)))
        .collect();
    Row::from_pairs(fields)
}

fn json_scalar(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::Text(s),
        // Nested containers are kept verbatim as their JSON text.
        nested => Value::Text(nested.to_string()),
    }
}
