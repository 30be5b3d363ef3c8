//! flow-core: motor de orquestación de workflows de assets.
//!
//! Un run por asset avanza el registro a través de su secuencia lineal de
//! roles, despachando cada rol a un worker externo bajo timeout y
//! persistiendo cada transición en el `MetadataStore`. El índice de
//! búsqueda es una proyección derivada y best-effort: nunca bloquea ni
//! corrompe la máquina de estados.

pub mod dispatch;
pub mod errors;
pub mod machine;
pub mod orchestrator;
pub mod projection;
pub mod store;

pub use dispatch::{Worker, WorkerContext, WorkerDispatcher, WorkerOutcome, WorkerRegistry};
pub use errors::{classify_error, EngineError, ErrorClass, IndexUnavailable};
pub use machine::{Decision, WorkflowMachine};
pub use orchestrator::{CancelFlag, Orchestrator, OrchestratorConfig};
pub use projection::{NullProjection, RecordProjection};
pub use store::{InMemoryMetadataStore, MetadataStore};
