//! Batch fan-out and result correlation
//!
//! Dispatches a batch's eligible rows concurrently under a bounded worker
//! budget and restores input order at the join barrier. Completion order
//! within a batch is unspecified; each settled result carries its batch-local
//! index as the correlation token and is slotted back by that index.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::client::Classify;
use crate::types::{Outcome, Row};

pub struct BatchScheduler<C: Classify> {
    classifier: Arc<C>,
    concurrency: usize,
}

impl<C: Classify + 'static> BatchScheduler<C> {
    pub fn new(classifier: Arc<C>, concurrency: usize) -> Self {
        Self {
            classifier,
            concurrency: concurrency.max(1),
        }
    }

    /// Resolve one batch.
    ///
    /// `prechecked[i]` holds the filter's verdict for `rows[i]`; rows already
    /// resolved to `Skipped` are not dispatched at all. Waits for every
    /// dispatched call to settle before returning, so the batch is an atomic
    /// unit of progress. The returned outcomes are aligned index-for-index
    /// with `rows`.
    pub async fn run_batch(&self, rows: &[Row], prechecked: Vec<Option<Outcome>>) -> Vec<Outcome> {
        debug_assert_eq!(rows.len(), prechecked.len());
        let mut slots = prechecked;

        let pending: Vec<(usize, &Row)> = rows
            .iter()
            .enumerate()
            .filter(|(i, _)| slots[*i].is_none())
            .collect();

        let settled: Vec<(usize, Outcome)> = stream::iter(pending)
            .map(|(slot, row)| {
                let classifier = Arc::clone(&self.classifier);
                async move { (slot, classifier.classify(row).await) }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (slot, outcome) in settled {
            slots[slot] = Some(outcome);
        }

        slots
            .into_iter()
            .map(|slot| slot.expect("every batch slot settled at the join barrier"))
            .collect()
    }
}
