//! La proyección al índice es derivada, asincrónica y best-effort: el
//! store responde siempre primero, el índice converge después y un
//! índice caído jamás afecta el resultado del run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use flow_adapters::{CaptionWorker, TranslateWorker};
use flow_core::{IndexUnavailable, InMemoryMetadataStore, MetadataStore, Orchestrator, OrchestratorConfig,
                RecordProjection, WorkerDispatcher, WorkerRegistry};
use flow_domain::{HistoryEntry, RoleName, Status, WorkflowRecord};
use flow_index::{InMemoryVectorBackend, SearchIndex};

fn orchestrator_with(projection: Arc<dyn RecordProjection>) -> Orchestrator {
    let mut registry = WorkerRegistry::new();
    registry.register(Arc::new(CaptionWorker));
    registry.register(Arc::new(TranslateWorker));
    Orchestrator::new(Arc::new(InMemoryMetadataStore::new()),
                      WorkerDispatcher::new(registry),
                      projection,
                      OrchestratorConfig::default())
}

/// Margen para que las tareas fire-and-forget de la proyección drenen.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}

#[tokio::test]
async fn store_answers_before_the_index_converges() {
    let index = Arc::new(SearchIndex::new(InMemoryVectorBackend::new()));
    let orch = orchestrator_with(Arc::clone(&index) as Arc<dyn RecordProjection>);

    let record = orch.create_record("/uploads/cat.jpg", RoleName::new("captioner"), 5).await.unwrap();

    // El store es la fuente de verdad desde el primer instante.
    let stored = orch.store().load(record.id).await.unwrap().unwrap();
    assert_eq!(stored.current.status, Status::Pending);

    settle().await;
    let mirrored = index.fetch(&record.id.to_string()).await.unwrap().unwrap();
    assert_eq!(mirrored.metadata["status"], serde_json::json!("pending"));
    assert_eq!(mirrored.metadata["name"], serde_json::json!("cat.jpg"));
}

#[tokio::test]
async fn history_entries_are_mirrored_per_role() {
    let index = Arc::new(SearchIndex::new(InMemoryVectorBackend::new()));
    let orch = orchestrator_with(Arc::clone(&index) as Arc<dyn RecordProjection>);

    let record = orch.create_record("/uploads/cat.jpg", RoleName::new("captioner"), 5).await.unwrap();
    orch.run_workflow(record.id).await.unwrap();
    settle().await;

    let assets = index.search("cat.jpg", 10, false).await.unwrap();
    assert_eq!(assets.len(), 1, "history records never leak into asset searches");
    assert_eq!(assets[0].id, record.id.to_string());

    let history = index.file_history(record.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["role"], serde_json::json!("captioner"));
    assert_eq!(history[1]["role"], serde_json::json!("translator"));
}

#[tokio::test]
async fn a_broken_index_never_breaks_the_run() {
    struct BrokenProjection;

    #[async_trait]
    impl RecordProjection for BrokenProjection {
        async fn mirror_record(&self, _record: &WorkflowRecord) -> Result<(), IndexUnavailable> {
            Err(IndexUnavailable("index offline".into()))
        }

        async fn mirror_history(&self, _asset_id: Uuid, _entry: &HistoryEntry) -> Result<(), IndexUnavailable> {
            Err(IndexUnavailable("index offline".into()))
        }
    }

    let orch = orchestrator_with(Arc::new(BrokenProjection));
    let record = orch.create_record("/uploads/cat.jpg", RoleName::new("captioner"), 5).await.unwrap();

    orch.run_workflow(record.id).await.unwrap();

    let done = orch.store().load(record.id).await.unwrap().unwrap();
    assert_eq!(done.current.status, Status::Complete);
    assert_eq!(done.history.len(), 2, "projection failures leave no trace in the record");
}
