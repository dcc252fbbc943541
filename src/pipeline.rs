//! Batch-by-batch pipeline driver
//!
//! Drains the record source through the scheduler into the result sink, one
//! batch at a time. The sink is owned exclusively by this single task and
//! workers never write, so no write-side locking is needed. A batch is fully
//! resolved and written before the next batch is read, which keeps output
//! buffering bounded by the batch size.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::client::Classify;
use crate::config::JobConfig;
use crate::error::Result;
use crate::filter;
use crate::scheduler::BatchScheduler;
use crate::table::{RecordSource, ResultSink};
use crate::types::Outcome;

/// Totals accumulated over one run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub rows: usize,
    pub classified: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Run the whole job.
///
/// Row-level failures are recorded as data in the output column and never
/// abort the run; only source/sink I/O errors propagate.
pub async fn run<C: Classify + 'static>(
    config: &JobConfig,
    classifier: Arc<C>,
    source: &mut RecordSource,
    sink: &mut ResultSink,
) -> Result<RunSummary> {
    let scheduler = BatchScheduler::new(classifier, config.concurrency());
    let mut summary = RunSummary::default();
    let mut batch_no = 0usize;

    loop {
        let rows = source.next_batch(config.batch_size)?;
        if rows.is_empty() {
            break;
        }
        batch_no += 1;

        let prechecked: Vec<Option<Outcome>> = rows
            .iter()
            .map(|row| filter::precheck(row, config))
            .collect();
        let dispatched = prechecked.iter().filter(|p| p.is_none()).count();

        debug!(
            batch = batch_no,
            rows = rows.len(),
            dispatched,
            "dispatching batch"
        );

        let outcomes = scheduler.run_batch(&rows, prechecked).await;

        for (row, outcome) in rows.iter().zip(&outcomes) {
            match outcome {
                Outcome::Classified(_) => summary.classified += 1,
                Outcome::Skipped(reason) => {
                    debug!(row = row.index(), reason = %reason, "row skipped");
                    summary.skipped += 1;
                }
                Outcome::Failed(reason) => {
                    warn!(row = row.index(), reason = %reason, "row failed");
                    summary.failed += 1;
                }
            }
            summary.rows += 1;
            sink.write(row, outcome)?;
        }
        sink.flush()?;

        info!(batch = batch_no, rows = rows.len(), "batch written");
    }

    Ok(summary)
}
