//! flow-index: proyección de registros hacia un store de vectores.
//!
//! El índice es derivado y best-effort: puede quedar brevemente por
//! detrás del `MetadataStore` (hasta un ciclo de despacho) y ninguna
//! decisión del motor depende de él. El cliente es el único caller del
//! backend remoto; acá se provee además un backend en memoria para tests
//! y para el binario demo.

pub mod backend;
pub mod client;
pub mod embedding;
pub mod errors;

pub use backend::{InMemoryVectorBackend, SearchMatch, VectorBackend, VectorRecord};
pub use client::{SearchIndex, SystemStats};
pub use embedding::{embed, EMBEDDING_DIM};
pub use errors::IndexError;
