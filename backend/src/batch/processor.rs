//! Sequential batch processing of validated shipments.
//!
//! Each valid row moves through `pending → processing → success | error`.
//! Rows with validation errors start as `invalid` and are never sent.
//! Exactly one request is in flight at a time, in ascending row order, and a
//! failed row never stops the batch.

use serde::{Deserialize, Serialize};

use crate::api::logs::{log_error_indent, log_info, log_success, log_warning, ProgressEvent, LOG_BROADCASTER};
use crate::emissions::{EmissionsEstimator, EstimateRequest};
use crate::models::{RowResult, RowStatus, ShipmentRow};
use crate::validation::{errors_for_row, ValidationError};

/// Progress after a row has finished.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchProgress {
    /// Row that just finished, `None` for the completion signal of an empty batch
    pub index: Option<usize>,
    pub processed: usize,
    pub total: usize,
    pub percent: u8,
    pub result: Option<RowResult>,
}

impl BatchProgress {
    pub fn is_done(&self) -> bool {
        self.processed == self.total
    }
}

/// Integer percentage of `processed` over `total`; an empty batch is complete.
pub fn percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((processed as f64 / total as f64) * 100.0).round() as u8
}

/// Counts at the end of a batch.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchSummary {
    pub total_valid: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub invalid: usize,
}

/// Per-row result tracker and processing loop.
pub struct BatchProcessor<'a> {
    rows: &'a [ShipmentRow],
    results: Vec<RowResult>,
    batch_id: String,
}

impl<'a> BatchProcessor<'a> {
    /// Start a batch: invalid rows are marked `invalid`, the rest `pending`.
    pub fn new(rows: &'a [ShipmentRow], errors: &[ValidationError]) -> Self {
        let results = (0..rows.len())
            .map(|index| {
                let row_errors = errors_for_row(errors, index);
                if row_errors.is_empty() {
                    RowResult::pending()
                } else {
                    let messages: Vec<&str> =
                        row_errors.iter().map(|e| e.message.as_str()).collect();
                    RowResult::invalid(messages.join("; "))
                }
            })
            .collect();

        Self {
            rows,
            results,
            batch_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Tag progress events with a caller-supplied id.
    pub fn with_batch_id(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = batch_id.into();
        self
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    /// Current per-row results, indexed like the input rows.
    pub fn results(&self) -> &[RowResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<RowResult> {
        self.results
    }

    /// Indices that will be sent to the estimator, in processing order.
    pub fn valid_indices(&self) -> Vec<usize> {
        self.results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.status != RowStatus::Invalid)
            .map(|(i, _)| i)
            .collect()
    }

    /// Process every valid row, one at a time.
    ///
    /// `on_progress` runs after each row, and once with 100% when there is
    /// nothing to process.
    pub async fn process_all<E, F>(&mut self, estimator: &E, mut on_progress: F) -> BatchSummary
    where
        E: EmissionsEstimator + Sync,
        F: FnMut(&BatchProgress) + Send,
    {
        let rows = self.rows;
        let queue = self.valid_indices();
        let total = queue.len();

        if total == 0 {
            log_warning("No valid rows to process");
            self.report(&mut on_progress, None, 0, 0);
            return self.summary();
        }

        log_info(format!("⚙️  Processing {} shipment(s)...", total));

        for (done, index) in queue.into_iter().enumerate() {
            self.results[index].status = RowStatus::Processing;

            let row = &rows[index];
            let outcome = match EstimateRequest::from_row(row) {
                Some(request) => estimator.estimate(&request).await.map(|e| e.co2e_kg),
                None => Err(crate::error::EmissionsError::InvalidRequest(
                    "weight_kg must be a positive number".to_string(),
                )),
            };

            self.results[index] = match outcome {
                Ok(co2e_kg) => RowResult::success(co2e_kg),
                Err(e) => {
                    log_error_indent(format!("Row {} ({}): {}", index, row.shipment_id, e), 1);
                    RowResult::failed(non_empty_message(e.to_string()))
                }
            };

            self.report(&mut on_progress, Some(index), done + 1, total);
        }

        let summary = self.summary();
        log_success(format!(
            "Batch complete: {} succeeded, {} failed, {} invalid",
            summary.succeeded, summary.failed, summary.invalid
        ));
        summary
    }

    fn report<F: FnMut(&BatchProgress)>(
        &self,
        on_progress: &mut F,
        index: Option<usize>,
        processed: usize,
        total: usize,
    ) {
        let result = index.map(|i| self.results[i].clone());
        let progress = BatchProgress {
            index,
            processed,
            total,
            percent: percent(processed, total),
            result,
        };

        LOG_BROADCASTER.progress(ProgressEvent {
            batch_id: self.batch_id.clone(),
            row: index,
            status: progress.result.as_ref().map(|r| r.status),
            processed,
            total,
            percent: progress.percent,
        });

        on_progress(&progress);
    }

    /// Counts over the current results.
    pub fn summary(&self) -> BatchSummary {
        let count = |status| self.results.iter().filter(|r| r.status == status).count();
        let invalid = count(RowStatus::Invalid);
        BatchSummary {
            total_valid: self.results.len() - invalid,
            succeeded: count(RowStatus::Success),
            failed: count(RowStatus::Error),
            invalid,
        }
    }
}

fn non_empty_message(message: String) -> String {
    if message.trim().is_empty() {
        "Failed to process".to_string()
    } else {
        message
    }
}
