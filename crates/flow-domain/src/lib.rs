//! flow-domain: modelo de datos del workflow de assets.
//!
//! Contiene el registro persistido (`WorkflowRecord`), su paso activo,
//! la configuración fija por asset y el historial append-only. Ninguna
//! lógica de orquestación vive aquí: sólo invariantes del documento.

pub mod errors;
pub mod history;
pub mod record;
pub mod role;
pub mod status;

pub use errors::DomainError;
pub use history::HistoryEntry;
pub use record::{CurrentStep, WorkflowConfig, WorkflowRecord, DEFAULT_MAX_RETRIES, SCHEMA_VERSION};
pub use role::{role_sequence, RoleName, DONE_ROLE};
pub use status::Status;
