//! Errores del dominio (validación del documento).

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DomainError {
    #[error("validation error: {0}")]
    Validation(String),
}
