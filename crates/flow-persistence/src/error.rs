//! Errores de persistencia. Mapea I/O y parseo a variantes semánticas
//! que el core clasifica para retries.

use thiserror::Error;

use flow_core::EngineError;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("transient IO error: {0}")]
    TransientIo(String),
    #[error("corrupt record document: {0}")]
    Corrupt(String),
    #[error("invalid store configuration: {0}")]
    Config(String),
}

impl From<std::io::Error> for PersistenceError {
    fn from(err: std::io::Error) -> Self {
        PersistenceError::TransientIo(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Corrupt(err.to_string())
    }
}

impl From<PersistenceError> for EngineError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::TransientIo(msg) => EngineError::StoreUnavailable(msg),
            PersistenceError::Corrupt(msg) => EngineError::InvalidRecord(msg),
            PersistenceError::Config(msg) => EngineError::Internal(msg),
        }
    }
}
