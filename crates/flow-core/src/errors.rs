//! Taxonomía de errores del motor y su clasificación para retries.

use thiserror::Error;
use uuid::Uuid;

use flow_domain::DomainError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Fallo de I/O leyendo o escribiendo un registro. Reintentable.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    /// Asset desconocido. Error del caller, no se reintenta.
    #[error("record not found: {0}")]
    RecordNotFound(Uuid),
    /// El rol actual no pertenece a `allowed_roles` del propio registro.
    /// Corrupción de datos: fatal para el run de ese asset.
    #[error("role not allowed: {0}")]
    RoleNotAllowed(String),
    /// Resultado anómalo del worker (fallo, timeout o verificación de
    /// contrato). Se reintenta hasta `max_retries`, luego es fatal.
    #[error("worker failure: {0}")]
    WorkerFailure(String),
    /// Ya hay un run activo para este asset (invariante de exclusión).
    #[error("run already in progress for asset {0}")]
    RunInProgress(Uuid),
    #[error("run cancelled")]
    Cancelled,
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl From<DomainError> for EngineError {
    fn from(err: DomainError) -> Self {
        EngineError::InvalidRecord(err.to_string())
    }
}

/// Fallo del backend de búsqueda. Siempre no-fatal para la orquestación:
/// se loggea y se omite, nunca se convierte en `EngineError` en el camino
/// de transición de estados.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("index unavailable: {0}")]
pub struct IndexUnavailable(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Vale la pena reintentar con backoff.
    Transient,
    /// Reintentar no cambia el resultado.
    Permanent,
}

pub fn classify_error(err: &EngineError) -> ErrorClass {
    match err {
        EngineError::StoreUnavailable(_) => ErrorClass::Transient,
        _ => ErrorClass::Permanent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_store_failures_are_transient() {
        assert_eq!(classify_error(&EngineError::StoreUnavailable("disk".into())), ErrorClass::Transient);
        assert_eq!(classify_error(&EngineError::RecordNotFound(Uuid::new_v4())), ErrorClass::Permanent);
        assert_eq!(classify_error(&EngineError::WorkerFailure("boom".into())), ErrorClass::Permanent);
        assert_eq!(classify_error(&EngineError::Cancelled), ErrorClass::Permanent);
    }
}
