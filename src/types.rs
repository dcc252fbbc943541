//! Core row and outcome types

use std::sync::Arc;

/// Columns every input table must carry in its header.
///
/// A row may leave individual values empty (that row is skipped), but the
/// columns themselves must exist or the job aborts before processing.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "name",
    "scan-item",
    "rules",
    "cloud-platform",
    "scan-type",
    "content-description",
    "description",
];

/// One input record plus its position in the input stream.
///
/// The position is the row's correlation identity; records carry no unique
/// business key. Values are kept in header order.
#[derive(Debug, Clone)]
pub struct Row {
    index: usize,
    header: Arc<Vec<String>>,
    values: Vec<String>,
}

impl Row {
    /// `values` must already be padded/truncated to the header length.
    pub fn new(index: usize, header: Arc<Vec<String>>, values: Vec<String>) -> Self {
        debug_assert_eq!(header.len(), values.len());
        Self {
            index,
            header,
            values,
        }
    }

    /// Position in the input stream (0-based)
    pub fn index(&self) -> usize {
        self.index
    }

    /// Value under the named column, if the column exists
    pub fn get(&self, column: &str) -> Option<&str> {
        self.header
            .iter()
            .position(|h| h == column)
            .map(|i| self.values[i].as_str())
    }

    /// All values in header order
    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// Tagged result of processing one row.
///
/// Exactly one outcome exists per row by the time it reaches the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Remote service produced a classification
    Classified(String),
    /// Precondition failed; no remote call was made
    Skipped(String),
    /// Remote call exhausted retries or returned an unusable payload
    Failed(String),
}

impl Outcome {
    /// Value written under the output column for this row
    pub fn as_cell(&self) -> &str {
        match self {
            Outcome::Classified(content) => content,
            Outcome::Skipped(reason) => reason,
            Outcome::Failed(reason) => reason,
        }
    }
}
