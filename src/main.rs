use std::sync::Arc;

use foreman::classify::KeywordClassifier;
use foreman::config::OrchestratorConfig;
use foreman::dispatch::CommandDispatcher;
use foreman::scheduler::build_plan;
use foreman::session::{OrchestrationSession, SessionDeps};
use foreman::source::{ItemSource, JsonFileSource};
use foreman::store::JsonlStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(items_path) = args.next() else {
        eprintln!("Usage: foreman <items.json> [--plan-only]");
        eprintln!("  FOREMAN_STORE_DIR     knowledge store root (default ./data/knowledge)");
        eprintln!("  FOREMAN_WORKER_CMD    worker command; gets agent as arg, prompt on stdin");
        eprintln!("  FOREMAN_MAX_PARALLEL  max dispatches in flight per wave (default 4)");
        eprintln!("  FOREMAN_TOKEN_BUDGET  context bundle token budget (default 4000)");
        std::process::exit(2);
    };
    let plan_only = args.next().as_deref() == Some("--plan-only");

    let store_dir =
        std::env::var("FOREMAN_STORE_DIR").unwrap_or_else(|_| "./data/knowledge".to_string());
    let max_parallel: usize = std::env::var("FOREMAN_MAX_PARALLEL")
        .unwrap_or_else(|_| "4".to_string())
        .parse()
        .unwrap_or(4);
    let token_budget: usize = std::env::var("FOREMAN_TOKEN_BUDGET")
        .unwrap_or_else(|_| "4000".to_string())
        .parse()
        .unwrap_or(4000);

    let source = Arc::new(JsonFileSource::new(&items_path));
    let items = source.load().await?;

    eprintln!("⚙️  Foreman v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Items: {} ({})", items.len(), items_path);

    if plan_only {
        let plan = build_plan(&items)?;
        for (i, wave) in plan.waves.iter().enumerate() {
            println!("wave {i}: {}", wave.items.join(", "));
        }
        return Ok(());
    }

    let worker_cmd = std::env::var("FOREMAN_WORKER_CMD").unwrap_or_else(|_| {
        eprintln!("Error: FOREMAN_WORKER_CMD not set");
        eprintln!("  export FOREMAN_WORKER_CMD=./run-worker.sh");
        std::process::exit(1);
    });

    let store = Arc::new(JsonlStore::open(&store_dir).await?);
    eprintln!("   Store: {store_dir}");

    let config = OrchestratorConfig {
        max_parallel_agents: max_parallel,
        context_token_budget: token_budget,
        ..Default::default()
    };
    let deps = SessionDeps {
        store,
        dispatcher: Arc::new(CommandDispatcher::new(worker_cmd, vec![])),
        classifier: Arc::new(KeywordClassifier),
        source: Some(source),
    };
    let mut session = OrchestrationSession::new(config, items, deps);

    // Ctrl+C cancels between waves; in-flight workers finish first.
    let cancel = session.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Ctrl+C received; stopping after the current wave");
            cancel.cancel();
        }
    });

    let summary = session.run().await?;

    println!(
        "done={} blocked={} needs_review={} failed={} pending={} dispatches={}",
        summary.done,
        summary.blocked,
        summary.needs_review,
        summary.failed,
        summary.pending,
        summary.dispatches,
    );
    for note in &summary.notes {
        println!("note: {note}");
    }

    Ok(())
}
