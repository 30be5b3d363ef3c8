//! CLI mínima contra el store durable:
//! `selfflow create --path <ASSET> [--role <ROLE>] [--priority <N>]`
//! `selfflow run --id <UUID>`
//! `selfflow status --id <UUID>`
//! `selfflow history --id <UUID>`
//! `selfflow search --query <TEXT> [--limit <N>] [--include-history]`
//! `selfflow stats`
//! `selfflow prune --id <UUID> --keep <N>`

use std::sync::Arc;

use flow_adapters::{CaptionWorker, GenericWorker, TranslateWorker};
use flow_core::{EngineError, NullProjection, Orchestrator, OrchestratorConfig, WorkerDispatcher, WorkerRegistry};
use flow_domain::{RoleName, Status};
use flow_index::{InMemoryVectorBackend, SearchIndex};
use flow_persistence::FileMetadataStore;
use serde_json::Value;
use uuid::Uuid;

fn usage() -> ! {
    eprintln!("usage: selfflow <create|run|status|history|search|stats|prune> [options]");
    std::process::exit(2);
}

fn flag(args: &[String], name: &str) -> Option<String> {
    args.iter().position(|a| a == name).and_then(|i| args.get(i + 1)).cloned()
}

fn parse_id(args: &[String]) -> Uuid {
    let Some(raw) = flag(args, "--id") else {
        eprintln!("[selfflow] --id <UUID> is required");
        std::process::exit(2);
    };
    match Uuid::parse_str(&raw) {
        Ok(id) => id,
        Err(_) => {
            eprintln!("[selfflow] invalid asset id: {raw}");
            std::process::exit(2);
        }
    }
}

fn open_store() -> FileMetadataStore {
    match FileMetadataStore::from_env() {
        Ok(store) => store,
        Err(e) => {
            eprintln!("[selfflow] store config error: {e}");
            std::process::exit(5);
        }
    }
}

fn build_orchestrator(store: FileMetadataStore) -> Orchestrator {
    let mut registry = WorkerRegistry::new();
    registry.register(Arc::new(CaptionWorker));
    registry.register(Arc::new(TranslateWorker));
    for role in ["resizer", "optimizer", "analyzer"] {
        registry.register(Arc::new(GenericWorker::new(RoleName::new(role))));
    }
    // Un índice en memoria no sobrevive la invocación del binario:
    // mirrorear acá sería tirar las escrituras. `search` reconstruye la
    // proyección desde el store durable al momento de la consulta.
    Orchestrator::new(Arc::new(store),
                      WorkerDispatcher::new(registry),
                      Arc::new(NullProjection),
                      OrchestratorConfig::default())
}

/// Reconstruye la proyección de búsqueda desde el store durable (la
/// fuente de verdad). Registros ilegibles se saltean con warning.
async fn rebuild_index(store: &FileMetadataStore) -> Result<SearchIndex<InMemoryVectorBackend>, EngineError> {
    let index = SearchIndex::new(InMemoryVectorBackend::new());
    for id in flow_core::MetadataStore::list_ids(store).await? {
        let Some(record) = flow_core::MetadataStore::load(store, id).await? else { continue };
        if let Err(err) = index.upsert_record(&record).await {
            log::warn!("skipping record {id} during index rebuild: {err}");
            continue;
        }
        for entry in &record.history {
            if let Err(err) = index.upsert_history(id, entry).await {
                log::warn!("skipping a history entry of {id} during index rebuild: {err}");
            }
        }
    }
    Ok(index)
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else { usage() };

    match command.as_str() {
        "create" => {
            let Some(path) = flag(&args, "--path") else {
                eprintln!("[selfflow] --path <ASSET> is required");
                std::process::exit(2);
            };
            let role = flag(&args, "--role").unwrap_or_else(|| "captioner".to_string());
            let priority = flag(&args, "--priority").and_then(|p| p.parse::<i32>().ok()).unwrap_or(5);

            let orch = build_orchestrator(open_store());
            match orch.create_record(path, RoleName::new(role), priority).await {
                Ok(record) => {
                    println!("created {} ({} -> {:?})",
                             record.id,
                             record.current.role,
                             record.config.allowed_roles.iter().map(|r| r.as_str()).collect::<Vec<_>>());
                }
                Err(e) => {
                    eprintln!("[selfflow create] {e}");
                    std::process::exit(4);
                }
            }
        }
        "run" => {
            let id = parse_id(&args);
            let orch = build_orchestrator(open_store());
            if let Err(e) = orch.rehydrate().await {
                eprintln!("[selfflow run] rehydrate failed: {e}");
                std::process::exit(5);
            }
            match orch.run_workflow(id).await {
                Ok(()) => println!("workflow complete for {id}"),
                Err(e) => {
                    eprintln!("[selfflow run] {e}");
                    std::process::exit(4);
                }
            }
        }
        "status" => {
            let id = parse_id(&args);
            let store = open_store();
            match flow_core::MetadataStore::load(&store, id).await {
                Ok(Some(record)) => {
                    println!("asset:    {}", record.asset_path);
                    println!("role:     {}", record.current.role);
                    println!("status:   {}", record.current.status);
                    println!("progress: {}%", record.progress());
                    println!("history:  {} entr(ies)", record.history.len());
                    println!("outputs:  {:?}", record.outputs.keys().collect::<Vec<_>>());
                }
                Ok(None) => {
                    eprintln!("[selfflow status] record not found: {id}");
                    std::process::exit(4);
                }
                Err(e) => {
                    eprintln!("[selfflow status] {e}");
                    std::process::exit(5);
                }
            }
        }
        "history" => {
            let id = parse_id(&args);
            let store = open_store();
            match flow_core::MetadataStore::load(&store, id).await {
                Ok(Some(record)) => {
                    for entry in &record.history {
                        println!("{} [{}] {} ({}, {}ms, {})",
                                 entry.timestamp.to_rfc3339(),
                                 entry.status,
                                 entry.message,
                                 entry.role,
                                 entry.duration_ms,
                                 entry.worker_ref);
                    }
                }
                Ok(None) => {
                    eprintln!("[selfflow history] record not found: {id}");
                    std::process::exit(4);
                }
                Err(e) => {
                    eprintln!("[selfflow history] {e}");
                    std::process::exit(5);
                }
            }
        }
        "search" => {
            let Some(query) = flag(&args, "--query") else {
                eprintln!("[selfflow search] --query <TEXT> is required");
                std::process::exit(2);
            };
            let limit = flag(&args, "--limit").and_then(|l| l.parse::<usize>().ok()).unwrap_or(10);
            let include_history = args.iter().any(|a| a == "--include-history");

            let store = open_store();
            let index = match rebuild_index(&store).await {
                Ok(index) => index,
                Err(e) => {
                    eprintln!("[selfflow search] {e}");
                    std::process::exit(5);
                }
            };
            match index.search(&query, limit, include_history).await {
                Ok(matches) => {
                    for m in matches {
                        let text = m.metadata.get("searchable_text").and_then(Value::as_str).unwrap_or("");
                        println!("{} score={:.1} {}", m.id, m.score, text);
                    }
                }
                Err(e) => {
                    eprintln!("[selfflow search] {e}");
                    std::process::exit(5);
                }
            }
        }
        "stats" => {
            // Agregados escaneando el store durable (el índice es un
            // proceso aparte y puede estar rezagado).
            let store = open_store();
            let ids = match flow_core::MetadataStore::list_ids(&store).await {
                Ok(ids) => ids,
                Err(e) => {
                    eprintln!("[selfflow stats] {e}");
                    std::process::exit(5);
                }
            };
            let (mut processing, mut complete, mut pending, mut error) = (0u32, 0u32, 0u32, 0u32);
            let total = ids.len();
            for id in ids {
                if let Ok(Some(record)) = flow_core::MetadataStore::load(&store, id).await {
                    match record.current.status {
                        Status::Processing => processing += 1,
                        Status::Complete => complete += 1,
                        Status::Pending => pending += 1,
                        Status::Error => error += 1,
                    }
                }
            }
            println!("total={total} processing={processing} complete={complete} pending={pending} error={error}");
        }
        "prune" => {
            let id = parse_id(&args);
            let keep = flag(&args, "--keep").and_then(|k| k.parse::<usize>().ok()).unwrap_or(50);
            let store = open_store();
            match store.prune_history(id, keep).await {
                Ok(pruned) => println!("pruned {pruned} entr(ies) from {id}"),
                Err(e) => {
                    eprintln!("[selfflow prune] {e}");
                    std::process::exit(4);
                }
            }
        }
        _ => usage(),
    }
}
