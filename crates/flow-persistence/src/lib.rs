//! flow-persistence: backend durable del `MetadataStore`.
//!
//! Paridad 1:1 con el backend en memoria del core: un documento JSON por
//! asset bajo un directorio raíz, direccionable por id. El reemplazo es
//! atómico (archivo temporal + rename) y los errores transitorios de I/O
//! se reintentan con backoff acotado antes de propagarse como
//! `StoreUnavailable`.

pub mod config;
pub mod error;
pub mod file_store;

pub use config::StoreConfig;
pub use error::PersistenceError;
pub use file_store::FileMetadataStore;
