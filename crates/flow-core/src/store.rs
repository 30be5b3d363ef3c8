//! Contrato del `MetadataStore` y backend en memoria.
//!
//! El store es la única fuente de verdad durable del registro. `save` es un
//! reemplazo completo del documento, atómico por llamada; no hay
//! compare-and-swap entre procesos. La disciplina single-writer-per-asset
//! del orquestador es lo que hace esto seguro en la práctica.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use flow_domain::{HistoryEntry, WorkflowRecord};

use crate::errors::EngineError;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Carga el registro de un asset. Un asset desconocido devuelve
    /// `Ok(None)`, nunca un registro con valores por defecto.
    async fn load(&self, id: Uuid) -> Result<Option<WorkflowRecord>, EngineError>;

    /// Reemplazo completo del registro. Los callers deben cargar
    /// inmediatamente antes de un `save` que dependa de estado previo.
    async fn save(&self, id: Uuid, record: &WorkflowRecord) -> Result<(), EngineError>;

    /// Enumeración de ids conocidos (stats y rehidratación al arranque).
    async fn list_ids(&self) -> Result<Vec<Uuid>, EngineError>;

    /// Conveniencia load-modify-save para agregar una entrada de historial.
    async fn append_history(&self, id: Uuid, entry: HistoryEntry) -> Result<(), EngineError> {
        let mut record = self.load(id).await?.ok_or(EngineError::RecordNotFound(id))?;
        record.push_history(entry);
        self.save(id, &record).await
    }
}

/// Backend en memoria, paridad 1:1 con el backend durable de
/// flow-persistence. Usado por los tests y el binario demo.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    inner: DashMap<Uuid, WorkflowRecord>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self { inner: DashMap::new() }
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn load(&self, id: Uuid) -> Result<Option<WorkflowRecord>, EngineError> {
        Ok(self.inner.get(&id).map(|r| r.clone()))
    }

    async fn save(&self, id: Uuid, record: &WorkflowRecord) -> Result<(), EngineError> {
        self.inner.insert(id, record.clone());
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<Uuid>, EngineError> {
        Ok(self.inner.iter().map(|e| *e.key()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_domain::{RoleName, Status};

    #[tokio::test]
    async fn load_on_missing_record_is_none() {
        let store = InMemoryMetadataStore::new();
        assert!(store.load(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let store = InMemoryMetadataStore::new();
        let rec = WorkflowRecord::new("/tmp/cat.jpg", RoleName::new("captioner"), 5).unwrap();
        store.save(rec.id, &rec).await.unwrap();
        let back = store.load(rec.id).await.unwrap().unwrap();
        assert_eq!(back.asset_path, "/tmp/cat.jpg");
        assert_eq!(back.current.status, Status::Pending);
    }

    #[tokio::test]
    async fn append_history_on_missing_record_fails() {
        let store = InMemoryMetadataStore::new();
        let entry = HistoryEntry::new(RoleName::new("captioner"), "execute", Status::Error, "x", 0, "test");
        let err = store.append_history(Uuid::new_v4(), entry).await.unwrap_err();
        assert!(matches!(err, EngineError::RecordNotFound(_)));
    }

    #[tokio::test]
    async fn append_history_grows_monotonically() {
        let store = InMemoryMetadataStore::new();
        let rec = WorkflowRecord::new("/tmp/cat.jpg", RoleName::new("captioner"), 5).unwrap();
        store.save(rec.id, &rec).await.unwrap();
        for i in 0..3 {
            let entry = HistoryEntry::new(RoleName::new("captioner"), "execute", Status::Complete, format!("n{i}"), 1, "test");
            store.append_history(rec.id, entry).await.unwrap();
            let back = store.load(rec.id).await.unwrap().unwrap();
            assert_eq!(back.history.len(), i + 1);
        }
    }
}
