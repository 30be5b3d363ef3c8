//! Demo end-to-end en memoria: intake → run → inspección → búsqueda.
//!
//! Muestra el cableado completo del motor con el store en memoria, el
//! índice en memoria y los workers incorporados. Para el store durable
//! ver `flow-cli`.

use std::sync::Arc;
use std::time::Duration;

use flow_adapters::{CaptionWorker, TranslateWorker};
use flow_core::{InMemoryMetadataStore, MetadataStore, Orchestrator, OrchestratorConfig, WorkerDispatcher,
                WorkerRegistry};
use flow_domain::RoleName;
use flow_index::{InMemoryVectorBackend, SearchIndex};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    env_logger::init();

    let mut registry = WorkerRegistry::new();
    registry.register(Arc::new(CaptionWorker));
    registry.register(Arc::new(TranslateWorker));

    let index = Arc::new(SearchIndex::new(InMemoryVectorBackend::new()));
    let orch = Orchestrator::new(Arc::new(InMemoryMetadataStore::new()),
                                 WorkerDispatcher::new(registry),
                                 Arc::clone(&index) as Arc<dyn flow_core::RecordProjection>,
                                 OrchestratorConfig::default());

    let record = match orch.create_record("/uploads/cat.jpg", RoleName::new("captioner"), 5).await {
        Ok(record) => record,
        Err(e) => {
            eprintln!("[demo] intake failed: {e}");
            std::process::exit(1);
        }
    };
    println!("created {} at role '{}'", record.id, record.current.role);

    if let Err(e) = orch.run_workflow(record.id).await {
        eprintln!("[demo] run failed: {e}");
        std::process::exit(1);
    }

    let done = match orch.store().load(record.id).await {
        Ok(Some(done)) => done,
        _ => {
            eprintln!("[demo] record vanished");
            std::process::exit(1);
        }
    };
    println!("final: role={} status={} progress={}%", done.current.role, done.current.status, done.progress());
    for entry in &done.history {
        println!("  history: [{}] {} ({}ms)", entry.status, entry.message, entry.duration_ms);
    }
    for (key, value) in &done.outputs {
        println!("  output:  {key} = {value}");
    }

    // La proyección es fire-and-forget: darle un momento antes de consultar.
    tokio::time::sleep(Duration::from_millis(100)).await;
    match index.search("cat.jpg done complete", 5, false).await {
        Ok(matches) => {
            for m in matches {
                println!("  search:  {} (score {:.1})", m.id, m.score);
            }
        }
        Err(e) => eprintln!("[demo] search skipped: {e}"),
    }
}
