//! Concurrency-limited batch replay.
//!
//! Replays one flow once per `(repeat, row)` pair drawn from a tabular
//! dataset, seeding each replay's variable store from the row's bound
//! columns and reducing that replay's value-change events into a single
//! per-cell result map. Repeat groups run sequentially; within a group, up
//! to the configured number of rows are in flight at once behind a
//! semaphore. Every replay owns an independent store and graph index, so no
//! state is shared across concurrent rows.

use crate::error::RunError;
use crate::event::RunEvent;
use crate::flow::VariableId;
use crate::scheduler::Scheduler;
use crate::store::VariableValueMap;
use ahash::AHashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tuning for a batch evaluation.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// How many times the whole dataset is replayed.
    pub repeats: usize,
    /// Upper bound on rows in flight within one repeat group.
    pub concurrency: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            repeats: 1,
            concurrency: 4,
        }
    }
}

/// Terminal status of one `(repeat, row)` cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchCellStatus {
    Succeeded,
    Failed(String),
}

/// The reduced outcome of one replay: the last value seen per port id over
/// the replay's `VariableValueChanged` events, plus a status. Failures are
/// isolated per cell and never abort sibling rows.
#[derive(Debug, Clone)]
pub struct BatchCellResult {
    pub repeat: usize,
    pub row: usize,
    pub values: VariableValueMap,
    pub status: BatchCellStatus,
}

/// Maps dataset columns onto the flow's externally seeded ports.
pub type ColumnBindings = AHashMap<VariableId, usize>;

pub struct BatchRunner {
    scheduler: Arc<Scheduler>,
    options: BatchOptions,
}

impl BatchRunner {
    pub fn new(scheduler: Arc<Scheduler>, options: BatchOptions) -> Self {
        Self { scheduler, options }
    }

    /// Runs the batch, pushing one [`BatchCellResult`] per completed cell.
    ///
    /// Rows within a repeat group are dispatched in row order: each row
    /// waits its turn for a concurrency permit before its worker is
    /// spawned, so under a limit of `k` at most `k` rows overlap and a
    /// later row never starts ahead of an earlier one.
    ///
    /// Cancellation stops dispatching new rows; rows already in flight
    /// finish (or abort) without reporting, and the result stream simply
    /// ends.
    pub async fn run(
        &self,
        rows: Vec<Vec<String>>,
        bindings: ColumnBindings,
        results: mpsc::UnboundedSender<BatchCellResult>,
        cancel: CancellationToken,
    ) {
        let rows = Arc::new(rows);
        let bindings = Arc::new(bindings);
        let limit = self.options.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        info!(
            rows = rows.len(),
            repeats = self.options.repeats,
            limit,
            "starting batch evaluation"
        );

        for repeat in 0..self.options.repeats {
            if cancel.is_cancelled() {
                break;
            }

            let mut workers = JoinSet::new();
            for row in 0..rows.len() {
                if cancel.is_cancelled() {
                    break;
                }
                // The permit is taken here, not in the worker, so rows
                // start in row order; it travels into the worker and is
                // released when the cell finishes.
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };
                workers.spawn(replay_cell(
                    self.scheduler.clone(),
                    rows.clone(),
                    bindings.clone(),
                    repeat,
                    row,
                    permit,
                    results.clone(),
                    cancel.clone(),
                ));
            }

            // Repeat groups do not overlap: drain the group before the next.
            while let Some(joined) = workers.join_next().await {
                if let Err(join_error) = joined {
                    warn!(error = %join_error, "batch worker panicked");
                }
            }
        }
    }

    /// Convenience wrapper collecting every cell result, for callers that
    /// do not need live progress.
    pub async fn run_collect(
        &self,
        rows: Vec<Vec<String>>,
        bindings: ColumnBindings,
    ) -> Vec<BatchCellResult> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.run(rows, bindings, tx, CancellationToken::new()).await;
        let mut cells = Vec::new();
        while let Ok(cell) = rx.try_recv() {
            cells.push(cell);
        }
        cells
    }
}

/// One replay slot: holds its concurrency permit for the duration, seeds a
/// fresh store from the row, runs an independent scheduler pass, and
/// reduces its event stream into the cell result.
#[allow(clippy::too_many_arguments)]
async fn replay_cell(
    scheduler: Arc<Scheduler>,
    rows: Arc<Vec<Vec<String>>>,
    bindings: Arc<ColumnBindings>,
    repeat: usize,
    row: usize,
    _permit: OwnedSemaphorePermit,
    results: mpsc::UnboundedSender<BatchCellResult>,
    cancel: CancellationToken,
) {
    if cancel.is_cancelled() {
        return;
    }

    let seed = seed_for_row(&bindings, &rows[row]);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let outcome = scheduler.run(seed, event_tx, cancel.child_token()).await;

    // Last-value-wins reduction over the replay's value changes.
    let mut values = VariableValueMap::new();
    while let Ok(event) = event_rx.try_recv() {
        if let RunEvent::VariableValueChanged { changes } = event {
            for (id, value) in changes {
                values.insert(id, value);
            }
        }
    }

    let status = match outcome {
        Ok(_) => BatchCellStatus::Succeeded,
        Err(RunError::Cancelled) => return,
        Err(error) => {
            debug!(repeat, row, error = %error, "batch cell failed");
            BatchCellStatus::Failed(error.to_string())
        }
    };
    let _ = results.send(BatchCellResult {
        repeat,
        row,
        values,
        status,
    });
}

/// Seeds a replay's variable store from the bound columns of one row.
/// Bindings pointing past the row's width resolve to `null`.
fn seed_for_row(bindings: &ColumnBindings, row: &[String]) -> VariableValueMap {
    let mut seed = VariableValueMap::new();
    for (port_id, column) in bindings {
        let value = row
            .get(*column)
            .map(|cell| Value::String(cell.clone()))
            .unwrap_or(Value::Null);
        seed.insert(port_id.clone(), value);
    }
    seed
}
