//! Row preconditions checked before any remote dispatch

use crate::config::JobConfig;
use crate::types::{Outcome, Row, REQUIRED_COLUMNS};

/// Decide whether a row is eligible for remote classification.
///
/// Returns `Some(Skipped)` for ineligible rows and `None` when the row should
/// be dispatched. Pure function of the row and the job config; never touches
/// the network.
///
/// Checks, in order:
/// 1. Every required field carries a non-empty value. The column's existence
///    was already validated at startup; an empty value on one row only skips
///    that row.
/// 2. The row's cloud-platform matches the configured scope,
///    case-insensitively and ignoring surrounding whitespace.
pub fn precheck(row: &Row, config: &JobConfig) -> Option<Outcome> {
    for column in REQUIRED_COLUMNS {
        match row.get(column) {
            Some(value) if !value.trim().is_empty() => {}
            _ => return Some(Outcome::Skipped(format!("missing field: {column}"))),
        }
    }

    let platform = row.get("cloud-platform").unwrap_or_default();
    if platform.trim().to_lowercase() != config.scope.trim().to_lowercase() {
        return Some(Outcome::Skipped("scope mismatch".to_string()));
    }

    None
}
