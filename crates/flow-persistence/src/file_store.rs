//! Store de registros respaldado por archivos: un documento
//! `<root>/<id>.meta.json` por asset.
//!
//! - `save` escribe a un archivo temporal y renombra: el reemplazo del
//!   documento es atómico por llamada.
//! - Errores transitorios de I/O se reintentan con backoff fijo acotado
//!   antes de propagarse.
//! - La poda de historial viejo es una operación de mantenimiento
//!   explícita, nunca parte del flujo normal.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use flow_core::{EngineError, MetadataStore};
use flow_domain::WorkflowRecord;

use crate::config::StoreConfig;
use crate::error::PersistenceError;

const IO_RETRIES: u32 = 2;
const IO_RETRY_DELAY: Duration = Duration::from_millis(100);

const META_SUFFIX: &str = ".meta.json";

pub struct FileMetadataStore {
    root: PathBuf,
}

impl FileMetadataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_env() -> Result<Self, PersistenceError> {
        Ok(Self::new(StoreConfig::from_env()?.root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}{META_SUFFIX}"))
    }

    async fn read_document(&self, id: Uuid) -> Result<Option<WorkflowRecord>, PersistenceError> {
        let path = self.record_path(id);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let record = serde_json::from_slice(&raw)?;
        Ok(Some(record))
    }

    async fn write_document(&self, id: Uuid, record: &WorkflowRecord) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.record_path(id);
        let tmp = self.root.join(format!("{id}{META_SUFFIX}.tmp"));
        let raw = serde_json::to_vec(record)?;
        tokio::fs::write(&tmp, &raw).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Mantenimiento explícito: conserva las últimas `keep_last` entradas
    /// de historial y descarta el resto. Devuelve cuántas se podaron.
    pub async fn prune_history(&self, id: Uuid, keep_last: usize) -> Result<usize, EngineError> {
        let mut record = self.load(id).await?.ok_or(EngineError::RecordNotFound(id))?;
        let len = record.history.len();
        if len <= keep_last {
            return Ok(0);
        }
        let pruned = len - keep_last;
        record.history.drain(..pruned);
        self.save(id, &record).await?;
        log::info!("pruned {pruned} history entr(ies) from {id}");
        Ok(pruned)
    }

    /// Acción administrativa: elimina el documento del asset. El core
    /// nunca borra registros por sí mismo.
    pub async fn delete(&self, id: Uuid) -> Result<(), EngineError> {
        match tokio::fs::remove_file(self.record_path(id)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(EngineError::RecordNotFound(id)),
            Err(err) => Err(EngineError::StoreUnavailable(err.to_string())),
        }
    }
}

#[async_trait]
impl MetadataStore for FileMetadataStore {
    async fn load(&self, id: Uuid) -> Result<Option<WorkflowRecord>, EngineError> {
        let mut attempt = 0u32;
        loop {
            match self.read_document(id).await {
                Ok(found) => return Ok(found),
                Err(PersistenceError::TransientIo(msg)) if attempt < IO_RETRIES => {
                    attempt += 1;
                    log::warn!("transient read error for {id} (attempt {attempt}): {msg}");
                    tokio::time::sleep(IO_RETRY_DELAY).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn save(&self, id: Uuid, record: &WorkflowRecord) -> Result<(), EngineError> {
        let mut attempt = 0u32;
        loop {
            match self.write_document(id, record).await {
                Ok(()) => return Ok(()),
                Err(PersistenceError::TransientIo(msg)) if attempt < IO_RETRIES => {
                    attempt += 1;
                    log::warn!("transient write error for {id} (attempt {attempt}): {msg}");
                    tokio::time::sleep(IO_RETRY_DELAY).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn list_ids(&self) -> Result<Vec<Uuid>, EngineError> {
        let mut ids = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            // Raíz todavía no creada: cero registros, no un error.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(err) => return Err(EngineError::StoreUnavailable(err.to_string())),
        };
        while let Some(entry) = dir.next_entry()
                                   .await
                                   .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name.strip_suffix(META_SUFFIX) else { continue };
            if let Ok(id) = Uuid::parse_str(stem) {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}
