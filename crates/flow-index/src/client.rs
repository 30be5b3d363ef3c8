//! Cliente del índice de búsqueda: construye los registros de vector a
//! partir del estado del workflow.
//!
//! `upsert_record` regenera siempre el embedding desde el texto buscable
//! canónico (nombre + rol actual + status) para que nunca quede texto
//! rancio tras una actualización. Las entradas de historial se indexan
//! como registros separados etiquetados `type = "history"` y ligados por
//! `file_id`; las búsquedas de assets las filtran salvo pedido explícito.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use flow_core::{IndexUnavailable, RecordProjection};
use flow_domain::{HistoryEntry, WorkflowRecord};

use crate::backend::{SearchMatch, VectorBackend, VectorRecord};
use crate::embedding::embed;
use crate::errors::IndexError;

/// Conteos agregados derivados de escanear el índice. Consumidor de
/// status/analytics; fuera del camino de escritura del core.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemStats {
    pub total: usize,
    pub processing: usize,
    pub complete: usize,
    pub pending: usize,
    pub error: usize,
}

pub struct SearchIndex<B: VectorBackend> {
    backend: B,
}

const STATS_SCAN_LIMIT: usize = 1000;
const HISTORY_SCAN_LIMIT: usize = 50;

impl<B: VectorBackend> SearchIndex<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Texto buscable canónico de un registro.
    fn searchable_text(record: &WorkflowRecord) -> String {
        format!("{} {} {}", record.asset_name(), record.current.role, record.current.status)
    }

    /// Refleja el estado del registro. Idempotente por id.
    pub async fn upsert_record(&self, record: &WorkflowRecord) -> Result<(), IndexError> {
        let text = Self::searchable_text(record);
        let mut metadata = Map::new();
        metadata.insert("name".into(), json!(record.asset_name()));
        metadata.insert("current_role".into(), json!(record.current.role.as_str()));
        metadata.insert("status".into(), json!(record.current.status.to_string()));
        metadata.insert("progress".into(), json!(record.progress()));
        metadata.insert("history_count".into(), json!(record.history.len()));
        metadata.insert("priority".into(), json!(record.current.priority));
        metadata.insert("created_at".into(), json!(record.current.created_at.to_rfc3339()));
        metadata.insert("updated_at".into(), json!(record.current.updated_at.to_rfc3339()));
        metadata.insert("searchable_text".into(), json!(text));

        self.backend.upsert(VectorRecord { id: record.id.to_string(),
                                           vector: embed(&text),
                                           metadata }).await
    }

    /// Indexa una entrada de historial como registro separado,
    /// `"{file_id}_history_{micros}"`.
    pub async fn upsert_history(&self, asset_id: Uuid, entry: &HistoryEntry) -> Result<(), IndexError> {
        let text = format!("{} {} {}", entry.role, entry.action, entry.message);
        let mut metadata = Map::new();
        metadata.insert("type".into(), json!("history"));
        metadata.insert("file_id".into(), json!(asset_id.to_string()));
        metadata.insert("timestamp".into(), json!(entry.timestamp.to_rfc3339()));
        metadata.insert("role".into(), json!(entry.role.as_str()));
        metadata.insert("action".into(), json!(entry.action));
        metadata.insert("status".into(), json!(entry.status.to_string()));
        metadata.insert("message".into(), json!(entry.message));
        metadata.insert("duration_ms".into(), json!(entry.duration_ms));
        metadata.insert("worker_ref".into(), json!(entry.worker_ref));
        metadata.insert("searchable_text".into(), json!(text));

        // Micros y no millis: dos roles pueden terminar en el mismo ms.
        let id = format!("{}_history_{}", asset_id, entry.timestamp.timestamp_micros());
        self.backend.upsert(VectorRecord { id, vector: embed(&text), metadata }).await
    }

    pub async fn fetch(&self, id: &str) -> Result<Option<VectorRecord>, IndexError> {
        self.backend.fetch(id).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), IndexError> {
        self.backend.delete(id).await
    }

    /// Búsqueda por similitud. Las entradas de historial se filtran de
    /// los resultados salvo que `include_history` sea true.
    pub async fn search(&self, query: &str, limit: usize, include_history: bool) -> Result<Vec<SearchMatch>, IndexError> {
        let matches = self.backend.query(&embed(query), limit).await?;
        if include_history {
            return Ok(matches);
        }
        Ok(matches.into_iter().filter(|m| !is_history(&m.metadata)).collect())
    }

    /// Historial indexado de un asset, ordenado por timestamp.
    pub async fn file_history(&self, asset_id: Uuid) -> Result<Vec<Map<String, Value>>, IndexError> {
        let query = format!("file_id:{asset_id} type:history");
        let matches = self.backend.query(&embed(&query), HISTORY_SCAN_LIMIT).await?;
        let wanted = asset_id.to_string();
        let mut entries: Vec<Map<String, Value>> =
            matches.into_iter()
                   .filter(|m| is_history(&m.metadata) && m.metadata.get("file_id") == Some(&json!(wanted)))
                   .map(|m| m.metadata)
                   .collect();
        entries.sort_by(|a, b| {
                   let ta = a.get("timestamp").and_then(Value::as_str).unwrap_or("");
                   let tb = b.get("timestamp").and_then(Value::as_str).unwrap_or("");
                   ta.cmp(tb)
               });
        Ok(entries)
    }

    /// Conteos por status sobre los registros de asset del índice.
    pub async fn system_stats(&self) -> Result<SystemStats, IndexError> {
        let files = self.search("", STATS_SCAN_LIMIT, false).await?;
        let mut stats = SystemStats { total: files.len(), ..SystemStats::default() };
        for m in &files {
            match m.metadata.get("status").and_then(Value::as_str) {
                Some("processing") => stats.processing += 1,
                Some("complete") => stats.complete += 1,
                Some("pending") => stats.pending += 1,
                Some("error") => stats.error += 1,
                _ => {}
            }
        }
        Ok(stats)
    }
}

fn is_history(metadata: &Map<String, Value>) -> bool {
    metadata.get("type").and_then(Value::as_str) == Some("history")
}

/// El índice es la proyección best-effort que consume el orquestador.
#[async_trait]
impl<B: VectorBackend> RecordProjection for SearchIndex<B> {
    async fn mirror_record(&self, record: &WorkflowRecord) -> Result<(), IndexUnavailable> {
        self.upsert_record(record).await.map_err(|e| IndexUnavailable(e.to_string()))
    }

    async fn mirror_history(&self, asset_id: Uuid, entry: &HistoryEntry) -> Result<(), IndexUnavailable> {
        self.upsert_history(asset_id, entry).await.map_err(|e| IndexUnavailable(e.to_string()))
    }
}
