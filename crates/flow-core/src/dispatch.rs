//! Despacho de workers: registry tipado rol→worker y ejecución bajo
//! timeout.
//!
//! El dispatcher nunca muta el registro. Toda mutación es responsabilidad
//! del worker bajo su contrato: releer el estado persistido, verificar
//! `current.role`, escribir su output bajo su propia clave, agregar una
//! entrada de historial y avanzar `current` con `status = pending`. Esa
//! separación permite intercambiar workers sin tocar el core.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use flow_domain::RoleName;

use crate::store::MetadataStore;

/// Lo único que recibe un worker: la referencia al asset y un handle al
/// store. Nunca el registro en memoria, para evitar estado rancio.
pub struct WorkerContext {
    pub asset_id: Uuid,
    pub store: Arc<dyn MetadataStore>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    Success,
    Failure(String),
}

impl WorkerOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WorkerOutcome::Success)
    }
}

/// Unidad de procesamiento externa para un rol. Opaca para el core.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Rol que este worker sabe ejecutar.
    fn role(&self) -> RoleName;

    async fn run(&self, ctx: &WorkerContext) -> WorkerOutcome;
}

/// Registry tipado rol→worker, poblado al arranque. Roles desconocidos
/// fallan cerrado.
#[derive(Default)]
pub struct WorkerRegistry {
    workers: HashMap<RoleName, Arc<dyn Worker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self { workers: HashMap::new() }
    }

    pub fn register(&mut self, worker: Arc<dyn Worker>) {
        self.workers.insert(worker.role(), worker);
    }

    pub fn get(&self, role: &RoleName) -> Option<Arc<dyn Worker>> {
        self.workers.get(role).cloned()
    }

    pub fn roles(&self) -> Vec<RoleName> {
        self.workers.keys().cloned().collect()
    }
}

pub struct WorkerDispatcher {
    registry: WorkerRegistry,
}

impl WorkerDispatcher {
    pub fn new(registry: WorkerRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    /// Ejecuta el worker registrado para `role` bajo `timeout` y devuelve
    /// el resultado junto al tiempo de pared transcurrido en ms (se mide
    /// siempre, también en fallo, para telemetría).
    ///
    /// El worker corre en una tarea aislada: un panic no desenrolla hacia
    /// el run-loop, se reporta como `Failure` y sigue el camino normal de
    /// retries.
    pub async fn run(&self,
                     role: &RoleName,
                     asset_id: Uuid,
                     store: Arc<dyn MetadataStore>,
                     timeout: Duration)
                     -> (WorkerOutcome, u64) {
        let started = Instant::now();
        let Some(worker) = self.registry.get(role) else {
            // Sin worker registrado: fallo cerrado, sin efectos.
            return (WorkerOutcome::Failure(format!("unknown role: {role}")), elapsed_ms(started));
        };

        let ctx = WorkerContext { asset_id, store };
        let mut handle = tokio::spawn(async move { worker.run(&ctx).await });

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(outcome)) => (outcome, elapsed_ms(started)),
            Ok(Err(join_err)) => {
                let reason = if join_err.is_panic() {
                    format!("worker panicked: {}", panic_message(join_err))
                } else {
                    "worker task cancelled".to_string()
                };
                log::error!("worker for role '{role}' crashed (asset {asset_id}): {reason}");
                (WorkerOutcome::Failure(reason), elapsed_ms(started))
            }
            Err(_) => {
                // La tarea se aborta: un worker colgado no sigue corriendo
                // detrás del re-despacho.
                handle.abort();
                log::warn!("worker for role '{role}' timed out after {}ms (asset {asset_id})", timeout.as_millis());
                (WorkerOutcome::Failure(format!("timeout after {}ms", timeout.as_millis())), elapsed_ms(started))
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Payload del panic como texto, para la entrada de historial.
fn panic_message(join_err: tokio::task::JoinError) -> String {
    match join_err.into_panic().downcast::<String>() {
        Ok(msg) => *msg,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "opaque panic payload".to_string(),
        },
    }
}
