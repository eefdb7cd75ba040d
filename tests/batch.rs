mod common;

use common::*;
use nagare::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn bindings() -> ColumnBindings {
    let mut bindings = ColumnBindings::new();
    bindings.insert("in-x".to_string(), 0);
    bindings
}

fn inference_runner(client: Arc<EchoInferenceClient>, options: BatchOptions) -> BatchRunner {
    let registry = HandlerRegistry::builder()
        .with_credentials(Arc::new(StaticCredentialStore::single("test-api", "sk-test")))
        .with_inference_client(client)
        .build();
    let scheduler = Arc::new(Scheduler::new(Arc::new(inference_flow()), Arc::new(registry)));
    BatchRunner::new(scheduler, options)
}

fn rows(values: &[&str]) -> Vec<Vec<String>> {
    values.iter().map(|v| vec![v.to_string()]).collect()
}

#[tokio::test]
async fn concurrency_stays_within_the_cap() {
    let client = Arc::new(EchoInferenceClient::paused(Duration::from_millis(30)));
    let gauge = client.gauge.clone();
    let runner = inference_runner(
        client,
        BatchOptions {
            repeats: 1,
            concurrency: 2,
        },
    );

    let cells = runner
        .run_collect(rows(&["a", "b", "c", "d", "e", "f"]), bindings())
        .await;

    assert_eq!(cells.len(), 6);
    assert!(cells.iter().all(|c| c.status == BatchCellStatus::Succeeded));
    assert!(gauge.max_seen() <= 2, "cap exceeded: {}", gauge.max_seen());
}

#[tokio::test]
async fn each_cell_carries_its_own_row_values() {
    let runner = inference_runner(Arc::new(EchoInferenceClient::new()), BatchOptions::default());

    let cells = runner
        .run_collect(rows(&["r0", "r1", "r2", "r3"]), bindings())
        .await;

    assert_eq!(cells.len(), 4);
    for cell in &cells {
        assert_eq!(cell.values["out-result"], json!(format!("r{}", cell.row)));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rows_start_in_row_order_within_a_repeat() {
    let client = Arc::new(EchoInferenceClient::paused(Duration::from_millis(5)));
    let runner = inference_runner(
        client.clone(),
        BatchOptions {
            repeats: 1,
            concurrency: 1,
        },
    );

    let labels: Vec<String> = (0..12).map(|i| format!("{:02}", i)).collect();
    let dataset: Vec<Vec<String>> = labels.iter().map(|l| vec![l.clone()]).collect();
    let cells = runner.run_collect(dataset, bindings()).await;

    assert_eq!(cells.len(), 12);
    // A later row never reaches the client before an earlier one.
    assert_eq!(client.entry_order(), labels);
}

#[tokio::test]
async fn a_failed_row_does_not_sink_its_neighbours() {
    let runner = inference_runner(
        Arc::new(EchoInferenceClient::poisoned("boom")),
        BatchOptions {
            repeats: 1,
            concurrency: 1,
        },
    );

    let cells = runner.run_collect(rows(&["ok", "boom", "ok"]), bindings()).await;

    assert_eq!(cells.len(), 3);
    let failed: Vec<usize> = cells
        .iter()
        .filter(|c| matches!(c.status, BatchCellStatus::Failed(_)))
        .map(|c| c.row)
        .collect();
    assert_eq!(failed, vec![1]);
    assert_eq!(
        cells
            .iter()
            .filter(|c| c.status == BatchCellStatus::Succeeded)
            .count(),
        2
    );
}

#[tokio::test]
async fn repeats_replay_the_dataset_sequentially() {
    let runner = inference_runner(
        Arc::new(EchoInferenceClient::new()),
        BatchOptions {
            repeats: 2,
            concurrency: 4,
        },
    );

    let cells = runner.run_collect(rows(&["a", "b"]), bindings()).await;

    assert_eq!(cells.len(), 4);
    let mut keys: Vec<(usize, usize)> = cells.iter().map(|c| (c.repeat, c.row)).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);

    // The first repeat group fully precedes the second.
    let last_of_first = cells
        .iter()
        .rposition(|c| c.repeat == 0)
        .unwrap();
    let first_of_second = cells.iter().position(|c| c.repeat == 1).unwrap();
    assert!(last_of_first < first_of_second);
}

#[tokio::test]
async fn cancelled_batch_produces_no_cells() {
    let runner = inference_runner(Arc::new(EchoInferenceClient::new()), BatchOptions::default());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let (tx, mut rx) = mpsc::unbounded_channel();
    runner.run(rows(&["a", "b"]), bindings(), tx, cancel).await;

    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn out_of_range_columns_seed_null() {
    let mut bindings = ColumnBindings::new();
    bindings.insert("in-x".to_string(), 5);
    let runner = inference_runner(Arc::new(EchoInferenceClient::new()), BatchOptions::default());

    let cells = runner.run_collect(rows(&["only"]), bindings).await;

    assert_eq!(cells.len(), 1);
    // A null seed renders as an empty template substitution.
    assert_eq!(cells[0].values["out-result"], json!(""));
}
