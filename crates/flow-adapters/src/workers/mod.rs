//! Workers incorporados y el camino común del contrato de ejecución.

mod captioner;
mod generic;
mod translator;

pub use captioner::CaptionWorker;
pub use generic::GenericWorker;
pub use translator::TranslateWorker;

use std::time::Instant;

use flow_core::{WorkerContext, WorkerOutcome};
use flow_domain::{HistoryEntry, RoleName, Status, WorkflowRecord};

/// Camino común del contrato de worker: releer el registro persistido,
/// rechazar despachos rancios o duplicados (`current.role` distinto del
/// rol propio, sin efectos secundarios), aplicar la mutación del rol,
/// agregar exactamente una entrada de historial y avanzar `current` con
/// `status = pending`.
pub(crate) async fn execute_role<F>(ctx: &WorkerContext, role: &RoleName, apply: F) -> WorkerOutcome
    where F: FnOnce(&mut WorkflowRecord) -> Result<String, String>
{
    let started = Instant::now();

    let mut record = match ctx.store.load(ctx.asset_id).await {
        Ok(Some(record)) => record,
        Ok(None) => return WorkerOutcome::Failure(format!("no record for asset {}", ctx.asset_id)),
        Err(err) => return WorkerOutcome::Failure(format!("store error: {err}")),
    };

    if &record.current.role != role {
        log::warn!("stale dispatch for asset {}: current role is '{}', expected '{role}'",
                   ctx.asset_id,
                   record.current.role);
        return WorkerOutcome::Failure(format!("stale dispatch: current role is '{}', expected '{role}'",
                                              record.current.role));
    }

    let message = match apply(&mut record) {
        Ok(message) => message,
        Err(reason) => return WorkerOutcome::Failure(reason),
    };

    record.push_history(HistoryEntry::new(role.clone(),
                                          "execute",
                                          Status::Complete,
                                          message,
                                          started.elapsed().as_millis() as u64,
                                          format!("worker:{role}")));
    record.advance();

    match ctx.store.save(ctx.asset_id, &record).await {
        Ok(()) => WorkerOutcome::Success,
        Err(err) => WorkerOutcome::Failure(format!("store error: {err}")),
    }
}
