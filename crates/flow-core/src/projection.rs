//! Proyección derivada del registro hacia el índice de búsqueda.
//!
//! Interfaz estrecha que el core consume sin conocer el backend concreto.
//! El contrato es eventual-consistency: la proyección puede quedar por
//! detrás del registro hasta un ciclo de despacho y sus fallos nunca
//! afectan la máquina de estados.

use async_trait::async_trait;
use uuid::Uuid;

use flow_domain::{HistoryEntry, WorkflowRecord};

use crate::errors::IndexUnavailable;

#[async_trait]
pub trait RecordProjection: Send + Sync {
    /// Refleja el estado actual del registro (idempotente por id,
    /// last-write-wins).
    async fn mirror_record(&self, record: &WorkflowRecord) -> Result<(), IndexUnavailable>;

    /// Indexa una entrada de historial como registro separado ligado al
    /// asset.
    async fn mirror_history(&self, asset_id: Uuid, entry: &HistoryEntry) -> Result<(), IndexUnavailable>;
}

/// Proyección nula: descarta todo. Para tests y runs sin índice.
#[derive(Debug, Default)]
pub struct NullProjection;

#[async_trait]
impl RecordProjection for NullProjection {
    async fn mirror_record(&self, _record: &WorkflowRecord) -> Result<(), IndexUnavailable> {
        Ok(())
    }

    async fn mirror_history(&self, _asset_id: Uuid, _entry: &HistoryEntry) -> Result<(), IndexUnavailable> {
        Ok(())
    }
}
