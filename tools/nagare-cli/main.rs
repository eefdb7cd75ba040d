use clap::Parser;
use nagare::prelude::*;
use serde_json::Value;
use std::fs;
use std::process;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Flow execution engine CLI: runs a visual-editor flow graph from JSON.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the flow definition JSON file
    flow_path: String,

    /// Optional path to a JSON object seeding the run's input values,
    /// keyed by input-node output-port id
    inputs_path: Option<String>,

    /// Print every run event as a JSON line while the flow executes
    #[arg(short, long)]
    events: bool,

    /// Maximum tracing verbosity (info when unset)
    #[arg(short, long)]
    verbose: bool,
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let total_start = Instant::now();

    // --- 1. File Loading ---
    let load_start = Instant::now();
    let flow_json = fs::read_to_string(&cli.flow_path).unwrap_or_else(|e| {
        exit_with_error(&format!(
            "Failed to read flow file '{}': {}",
            &cli.flow_path, e
        ))
    });
    let seed: VariableValueMap = match &cli.inputs_path {
        Some(path) => {
            let inputs_json = fs::read_to_string(path).unwrap_or_else(|e| {
                exit_with_error(&format!("Failed to read inputs file '{}': {}", path, e))
            });
            serde_json::from_str(&inputs_json)
                .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse inputs JSON: {}", e)))
        }
        None => VariableValueMap::new(),
    };
    let load_duration = load_start.elapsed();

    // --- 2. Parsing ---
    let flow: FlowDefinition = serde_json::from_str(&flow_json)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse flow JSON: {}", e)));
    println!(
        "Loaded flow: {} nodes, {} edges, {} seeded inputs",
        flow.nodes.len(),
        flow.edges.len(),
        seed.len()
    );

    // --- 3. Execution ---
    // Remote-call kinds stay unregistered here; flows using them need a
    // credential store and model client wired in through the library API.
    let registry = Arc::new(HandlerRegistry::builder().build());
    let scheduler = Scheduler::new(Arc::new(flow), registry);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let print_events = cli.events;
    let printer = tokio::spawn(async move {
        let mut count = 0usize;
        while let Some(event) = event_rx.recv().await {
            count += 1;
            if print_events
                && let Ok(line) = serde_json::to_string(&event)
            {
                println!("{}", line);
            }
        }
        count
    });

    println!("\nStarting flow run...");
    let run_start = Instant::now();
    let outcome = scheduler
        .run(seed, event_tx, CancellationToken::new())
        .await;
    let run_duration = run_start.elapsed();
    let event_count = printer.await.unwrap_or(0);

    // --- 4. Results and Summary ---
    let summary = match outcome {
        Ok(summary) => summary,
        Err(e) => exit_with_error(&format!("Run failed: {}", e)),
    };

    println!("\nRun Finished!");
    if summary.outputs.is_empty() {
        println!("  -> No output nodes surfaced values");
    } else {
        let mut outputs: Vec<(&String, &Value)> = summary.outputs.iter().collect();
        outputs.sort_by(|a, b| a.0.cmp(b.0));
        for (port_id, value) in outputs {
            println!("  -> {}: {}", port_id, value);
        }
    }
    if summary.skipped > 0 {
        println!(
            "  -> {} node(s) skipped (unreachable or cyclic)",
            summary.skipped
        );
    }

    println!("\n--- Performance Summary ---");
    println!("File Loading:   {:?}", load_duration);
    println!("Flow Run:       {:?}", run_duration);
    println!("---------------------------");
    println!("Total:          {:?}", total_start.elapsed());
    println!("Nodes Visited:  {}", summary.visited);
    println!("Events Emitted: {}", event_count);
    println!();
}
