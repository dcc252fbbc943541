//! Delimited-table record source and result sink
//!
//! I/O glue around the pipeline core: the source yields rows in file order
//! and validates the input schema up front; the sink appends one augmented
//! row at a time so the output never needs full materialization in memory.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::error::{Error, Result};
use crate::types::{Outcome, Row, REQUIRED_COLUMNS};

/// Streaming reader over the input table
#[derive(Debug)]
pub struct RecordSource {
    reader: csv::Reader<File>,
    header: Arc<Vec<String>>,
    next_index: usize,
}

impl RecordSource {
    /// Open the input table and validate its schema.
    ///
    /// A required column missing from the header is fatal here, before any
    /// row is read; a missing value on an individual row is handled later by
    /// the precondition filter.
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
        let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|column| !header.iter().any(|h| h == *column))
            .map(|column| column.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingColumns(missing));
        }

        Ok(Self {
            reader,
            header: Arc::new(header),
            next_index: 0,
        })
    }

    /// Input header, shared with every row this source produces
    pub fn header(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.header)
    }

    /// Next row in file order, or `None` at end of input.
    ///
    /// Short records are padded with empty values so every row spans the full
    /// header.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        let mut record = StringRecord::new();
        if !self.reader.read_record(&mut record)? {
            return Ok(None);
        }

        let mut values: Vec<String> = record.iter().map(str::to_string).collect();
        values.resize(self.header.len(), String::new());

        let row = Row::new(self.next_index, Arc::clone(&self.header), values);
        self.next_index += 1;
        Ok(Some(row))
    }

    /// Fill a batch of up to `size` rows; shorter only at end of input.
    pub fn next_batch(&mut self, size: usize) -> Result<Vec<Row>> {
        let mut batch = Vec::with_capacity(size);
        while batch.len() < size {
            match self.next_row()? {
                Some(row) => batch.push(row),
                None => break,
            }
        }
        Ok(batch)
    }
}

/// Streaming writer for the augmented output table
pub struct ResultSink {
    writer: csv::Writer<File>,
}

impl ResultSink {
    /// Create the output table. The schema is the input header plus exactly
    /// one trailing column holding the classification outcome.
    pub fn create(path: &Path, header: &[String], output_column: &str) -> Result<Self> {
        let mut writer = WriterBuilder::new().from_path(path)?;

        let mut out_header: Vec<&str> = header.iter().map(String::as_str).collect();
        out_header.push(output_column);
        writer.write_record(&out_header)?;

        Ok(Self { writer })
    }

    /// Append one row with its rendered outcome.
    ///
    /// Skipped and failed rows are written like classified ones, with the
    /// reason string as the sentinel value.
    pub fn write(&mut self, row: &Row, outcome: &Outcome) -> Result<()> {
        let mut record: Vec<&str> = row.values().iter().map(String::as_str).collect();
        record.push(outcome.as_cell());
        self.writer.write_record(&record)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
