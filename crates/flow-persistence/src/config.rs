//! Configuración del store por variables de entorno (`.env` soportado).

use std::path::PathBuf;

use crate::error::PersistenceError;

/// Variable con el directorio raíz de los documentos de registro.
pub const STORE_ROOT_VAR: &str = "SELFFLOW_STORE_ROOT";

const DEFAULT_STORE_ROOT: &str = "./selfflow-data";

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub root: PathBuf,
}

impl StoreConfig {
    /// Lee la configuración del entorno, cargando `.env` si existe.
    pub fn from_env() -> Result<Self, PersistenceError> {
        let _ = dotenvy::dotenv();
        let root = std::env::var(STORE_ROOT_VAR).unwrap_or_else(|_| DEFAULT_STORE_ROOT.to_string());
        if root.is_empty() {
            return Err(PersistenceError::Config(format!("{STORE_ROOT_VAR} must not be empty")));
        }
        Ok(Self { root: PathBuf::from(root) })
    }
}
