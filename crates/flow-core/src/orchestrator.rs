//! Orquestador: un run-loop lógico por asset.
//!
//! Estado process-wide explícito (nada de registries a nivel de módulo):
//! el orquestador recibe store, dispatcher y proyección como dependencias
//! y mantiene el guard de exclusión por asset. Invariante central de
//! correctitud: a lo sumo un run activo por asset id, aplicado con un
//! mapa de runs activos y no por convención.
//!
//! Entre assets los runs son independientes y concurrentes; dentro de un
//! asset el procesamiento es estrictamente secuencial. La cancelación se
//! chequea al tope del loop: un despacho en vuelo siempre completa o
//! expira antes de que la cancelación surta efecto, porque durante el
//! despacho el registro pertenece al worker.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use flow_domain::{HistoryEntry, RoleName, Status, WorkflowRecord};

use crate::dispatch::{WorkerDispatcher, WorkerOutcome};
use crate::errors::{classify_error, EngineError, ErrorClass};
use crate::machine::{Decision, WorkflowMachine};
use crate::projection::RecordProjection;
use crate::store::MetadataStore;

/// Política externa del run-loop: timeout de worker, delay fijo entre
/// retries y presupuesto de reintentos contra el store.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Cota superior no negociable para cada despacho de worker.
    pub worker_timeout: Duration,
    /// Delay entre re-despachos del mismo rol tras un fallo.
    pub retry_delay: Duration,
    /// Reintentos ante `StoreUnavailable` antes de propagar.
    pub store_retries: u32,
    pub store_retry_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { worker_timeout: Duration::from_secs(30),
               retry_delay: Duration::from_millis(500),
               store_retries: 3,
               store_retry_delay: Duration::from_millis(200) }
    }
}

/// Bandera de cancelación cooperativa compartida entre runs.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Orchestrator {
    store: Arc<dyn MetadataStore>,
    dispatcher: WorkerDispatcher,
    projection: Arc<dyn RecordProjection>,
    config: OrchestratorConfig,
    active: DashMap<Uuid, ()>,
    cancel: CancelFlag,
}

/// Guard RAII del run activo: libera la entrada del asset al salir del
/// run por cualquier camino.
struct RunGuard<'a> {
    active: &'a DashMap<Uuid, ()>,
    id: Uuid,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.active.remove(&self.id);
    }
}

impl Orchestrator {
    pub fn new(store: Arc<dyn MetadataStore>,
               dispatcher: WorkerDispatcher,
               projection: Arc<dyn RecordProjection>,
               config: OrchestratorConfig)
               -> Self {
        Self { store,
               dispatcher,
               projection,
               config,
               active: DashMap::new(),
               cancel: CancelFlag::new() }
    }

    pub fn store(&self) -> Arc<dyn MetadataStore> {
        Arc::clone(&self.store)
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Intake: crea el registro, lo persiste y lo refleja al índice.
    pub async fn create_record(&self,
                               asset_path: impl Into<String>,
                               initial_role: RoleName,
                               priority: i32)
                               -> Result<WorkflowRecord, EngineError> {
        let record = WorkflowRecord::new(asset_path, initial_role, priority)?;
        self.save_with_retry(record.id, &record).await?;
        self.mirror(&record);
        log::info!("created record {} for '{}'", record.id, record.asset_path);
        Ok(record)
    }

    /// Al arranque del servicio: vuelve a `pending` los registros que un
    /// proceso anterior dejó en `processing`. Devuelve cuántos se
    /// rehidrataron. Los assets con un run activo en este proceso se
    /// saltean: su registro pertenece al run, no a la rehidratación.
    pub async fn rehydrate(&self) -> Result<usize, EngineError> {
        let mut reset = 0usize;
        for id in self.store.list_ids().await? {
            if self.active.contains_key(&id) {
                continue;
            }
            if let Some(mut record) = self.store.load(id).await? {
                if record.current.status == Status::Processing {
                    record.set_status(Status::Pending);
                    self.save_with_retry(id, &record).await?;
                    self.mirror(&record);
                    reset += 1;
                }
            }
        }
        if reset > 0 {
            log::info!("rehydrated {reset} record(s) stuck in processing");
        }
        Ok(reset)
    }

    /// Ejecuta el workflow de un asset hasta terminal (`complete` o
    /// `error`). Un segundo run concurrente sobre el mismo asset devuelve
    /// `RunInProgress` sin tocar el registro.
    pub async fn run_workflow(&self, id: Uuid) -> Result<(), EngineError> {
        let _guard = self.acquire_run(id)?;
        let mut failures: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                log::info!("run for asset {id} cancelled between dispatches");
                return Err(EngineError::Cancelled);
            }

            let mut record = self.load_required(id).await?;

            match WorkflowMachine::decide(&record) {
                Decision::Complete => {
                    // Chequeo terminal idempotente: sin despacho y sin
                    // historial nuevo.
                    if record.current.status != Status::Complete {
                        record.set_status(Status::Complete);
                        self.save_with_retry(id, &record).await?;
                        self.mirror(&record);
                    }
                    log::debug!("asset {id} complete (progress {})", record.progress());
                    return Ok(());
                }
                Decision::Reject { role } => {
                    let entry = HistoryEntry::new(role.clone(),
                                                  "verify",
                                                  Status::Error,
                                                  format!("role '{role}' not present in allowed_roles"),
                                                  0,
                                                  worker_ref());
                    record.push_history(entry.clone());
                    record.set_status(Status::Error);
                    self.save_with_retry(id, &record).await?;
                    self.mirror(&record);
                    self.mirror_history(id, &entry);
                    return Err(EngineError::RoleNotAllowed(role.to_string()));
                }
                Decision::Dispatch { role } => {
                    record.set_status(Status::Processing);
                    self.save_with_retry(id, &record).await?;
                    self.mirror(&record);

                    let (outcome, duration_ms) = self.dispatcher
                                                     .run(&role, id, Arc::clone(&self.store), self.config.worker_timeout)
                                                     .await;

                    match outcome {
                        WorkerOutcome::Success => {
                            failures = 0;
                            // El worker ya avanzó el registro: releer en
                            // vez de confiar en su valor de retorno.
                            let advanced = self.load_required(id).await?;
                            if let Some(entry) = advanced.history.last() {
                                self.mirror_history(id, entry);
                            }
                            self.mirror(&advanced);
                        }
                        WorkerOutcome::Failure(reason) => {
                            failures += 1;
                            let mut record = self.load_required(id).await?;
                            let entry = HistoryEntry::new(role.clone(),
                                                          "execute",
                                                          Status::Error,
                                                          reason.clone(),
                                                          duration_ms,
                                                          worker_ref());
                            record.push_history(entry.clone());

                            let exhausted = failures > record.config.max_retries;
                            record.set_status(if exhausted { Status::Error } else { Status::Pending });
                            self.save_with_retry(id, &record).await?;
                            self.mirror(&record);
                            self.mirror_history(id, &entry);

                            if exhausted {
                                log::error!("asset {id}: role '{role}' failed after {failures} attempt(s): {reason}");
                                return Err(EngineError::WorkerFailure(reason));
                            }
                            log::warn!("asset {id}: role '{role}' failed (attempt {failures}), retrying: {reason}");
                            tokio::time::sleep(self.config.retry_delay).await;
                        }
                    }
                }
            }
        }
    }

    fn acquire_run(&self, id: Uuid) -> Result<RunGuard<'_>, EngineError> {
        if self.active.insert(id, ()).is_some() {
            return Err(EngineError::RunInProgress(id));
        }
        Ok(RunGuard { active: &self.active, id })
    }

    async fn load_required(&self, id: Uuid) -> Result<WorkflowRecord, EngineError> {
        let mut attempt = 0u32;
        loop {
            match self.store.load(id).await {
                Ok(Some(record)) => return Ok(record),
                Ok(None) => return Err(EngineError::RecordNotFound(id)),
                Err(err) if classify_error(&err) == ErrorClass::Transient && attempt < self.config.store_retries => {
                    attempt += 1;
                    log::warn!("transient store error loading {id} (attempt {attempt}): {err}");
                    tokio::time::sleep(self.config.store_retry_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn save_with_retry(&self, id: Uuid, record: &WorkflowRecord) -> Result<(), EngineError> {
        let mut attempt = 0u32;
        loop {
            match self.store.save(id, record).await {
                Ok(()) => return Ok(()),
                Err(err) if classify_error(&err) == ErrorClass::Transient && attempt < self.config.store_retries => {
                    attempt += 1;
                    log::warn!("transient store error saving {id} (attempt {attempt}): {err}");
                    tokio::time::sleep(self.config.store_retry_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Refleja el registro al índice sin bloquear el camino crítico:
    /// tarea fire-and-forget, el fallo se loggea y se descarta.
    fn mirror(&self, record: &WorkflowRecord) {
        let projection = Arc::clone(&self.projection);
        let record = record.clone();
        tokio::spawn(async move {
            if let Err(err) = projection.mirror_record(&record).await {
                log::warn!("index projection skipped for {}: {err}", record.id);
            }
        });
    }

    fn mirror_history(&self, id: Uuid, entry: &HistoryEntry) {
        let projection = Arc::clone(&self.projection);
        let entry = entry.clone();
        tokio::spawn(async move {
            if let Err(err) = projection.mirror_history(id, &entry).await {
                log::warn!("history projection skipped for {id}: {err}");
            }
        });
    }
}

fn worker_ref() -> String {
    format!("pid:{}", std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{Worker, WorkerContext, WorkerRegistry};
    use crate::projection::NullProjection;
    use crate::store::InMemoryMetadataStore;
    use async_trait::async_trait;
    use serde_json::json;

    /// Worker de test que cumple el contrato completo: releer, verificar
    /// rol, escribir output, historial y avanzar.
    struct ContractWorker {
        role: RoleName,
    }

    #[async_trait]
    impl Worker for ContractWorker {
        fn role(&self) -> RoleName {
            self.role.clone()
        }

        async fn run(&self, ctx: &WorkerContext) -> WorkerOutcome {
            let mut record = match ctx.store.load(ctx.asset_id).await {
                Ok(Some(r)) => r,
                _ => return WorkerOutcome::Failure("record missing".into()),
            };
            if record.current.role != self.role {
                return WorkerOutcome::Failure(format!("stale dispatch: current role is {}", record.current.role));
            }
            record.set_output(self.role.as_str(), json!(format!("{} output", self.role)));
            record.push_history(HistoryEntry::new(self.role.clone(),
                                                  "execute",
                                                  Status::Complete,
                                                  format!("Processed by {}", self.role),
                                                  5,
                                                  "test-worker"));
            record.advance();
            match ctx.store.save(ctx.asset_id, &record).await {
                Ok(()) => WorkerOutcome::Success,
                Err(e) => WorkerOutcome::Failure(e.to_string()),
            }
        }
    }

    struct AlwaysFailWorker {
        role: RoleName,
    }

    #[async_trait]
    impl Worker for AlwaysFailWorker {
        fn role(&self) -> RoleName {
            self.role.clone()
        }

        async fn run(&self, _ctx: &WorkerContext) -> WorkerOutcome {
            WorkerOutcome::Failure("synthetic failure".into())
        }
    }

    struct SleepyWorker {
        role: RoleName,
    }

    #[async_trait]
    impl Worker for SleepyWorker {
        fn role(&self) -> RoleName {
            self.role.clone()
        }

        async fn run(&self, ctx: &WorkerContext) -> WorkerOutcome {
            tokio::time::sleep(Duration::from_millis(150)).await;
            ContractWorker { role: self.role.clone() }.run(ctx).await
        }
    }

    fn fast_config() -> OrchestratorConfig {
        OrchestratorConfig { worker_timeout: Duration::from_secs(1),
                             retry_delay: Duration::from_millis(1),
                             store_retries: 1,
                             store_retry_delay: Duration::from_millis(1) }
    }

    fn orchestrator(workers: Vec<Arc<dyn Worker>>) -> Orchestrator {
        let mut registry = WorkerRegistry::new();
        for w in workers {
            registry.register(w);
        }
        Orchestrator::new(Arc::new(InMemoryMetadataStore::new()),
                          WorkerDispatcher::new(registry),
                          Arc::new(NullProjection),
                          fast_config())
    }

    #[tokio::test]
    async fn run_advances_through_sequence_to_complete() {
        let orch = orchestrator(vec![Arc::new(ContractWorker { role: RoleName::new("captioner") }),
                                     Arc::new(ContractWorker { role: RoleName::new("translator") })]);
        let record = orch.create_record("/tmp/cat.jpg", RoleName::new("captioner"), 5).await.unwrap();

        orch.run_workflow(record.id).await.unwrap();

        let done = orch.store().load(record.id).await.unwrap().unwrap();
        assert!(done.current.role.is_done());
        assert_eq!(done.current.status, Status::Complete);
        assert_eq!(done.progress(), 100);
        assert_eq!(done.history.len(), 2, "one worker-authored entry per role");
        assert!(done.outputs.contains_key("captioner"));
        assert!(done.outputs.contains_key("translator"));
    }

    #[tokio::test]
    async fn retry_budget_is_exactly_max_retries_plus_one() {
        let orch = orchestrator(vec![Arc::new(AlwaysFailWorker { role: RoleName::new("optimizer") })]);
        let record = orch.create_record("/tmp/doc.pdf", RoleName::new("optimizer"), 5).await.unwrap();
        let max_retries = record.config.max_retries;

        let err = orch.run_workflow(record.id).await.unwrap_err();
        assert!(matches!(err, EngineError::WorkerFailure(_)));

        let failed = orch.store().load(record.id).await.unwrap().unwrap();
        assert_eq!(failed.current.status, Status::Error);
        assert_eq!(failed.current.role.as_str(), "optimizer", "role does not advance on failure");
        assert_eq!(failed.history.len(), (max_retries + 1) as usize, "one failure entry per attempt");
        assert!(failed.history.iter().all(|h| h.status == Status::Error));
        assert!(failed.outputs.is_empty(), "failed role never writes outputs");
    }

    #[tokio::test]
    async fn terminal_check_is_idempotent() {
        // Sin workers registrados: cualquier despacho fallaría.
        let orch = orchestrator(vec![]);
        let mut record = orch.create_record("/tmp/x.png", RoleName::new("optimizer"), 5).await.unwrap();
        record.advance();
        record.set_status(Status::Complete);
        orch.store().save(record.id, &record).await.unwrap();

        orch.run_workflow(record.id).await.unwrap();
        orch.run_workflow(record.id).await.unwrap();

        let after = orch.store().load(record.id).await.unwrap().unwrap();
        assert_eq!(after.history.len(), 0, "terminal check appends no history");
        assert_eq!(after.current.status, Status::Complete);
    }

    #[tokio::test]
    async fn second_concurrent_run_is_rejected() {
        let orch = Arc::new(orchestrator(vec![Arc::new(SleepyWorker { role: RoleName::new("optimizer") })]));
        let record = orch.create_record("/tmp/slow.bin", RoleName::new("optimizer"), 5).await.unwrap();

        let first = {
            let orch = Arc::clone(&orch);
            let id = record.id;
            tokio::spawn(async move { orch.run_workflow(id).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        let second = orch.run_workflow(record.id).await;
        assert!(matches!(second, Err(EngineError::RunInProgress(_))));

        first.await.unwrap().unwrap();
        // Con el primer run terminado, el guard quedó liberado.
        orch.run_workflow(record.id).await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_run_leaves_record_untouched() {
        let orch = orchestrator(vec![Arc::new(ContractWorker { role: RoleName::new("optimizer") })]);
        let record = orch.create_record("/tmp/c.bin", RoleName::new("optimizer"), 5).await.unwrap();

        orch.cancel_flag().cancel();
        let err = orch.run_workflow(record.id).await.unwrap_err();
        assert_eq!(err, EngineError::Cancelled);

        let after = orch.store().load(record.id).await.unwrap().unwrap();
        assert_eq!(after.current.status, Status::Pending);
        assert!(after.history.is_empty());
    }

    #[tokio::test]
    async fn unknown_asset_is_a_caller_error() {
        let orch = orchestrator(vec![]);
        let err = orch.run_workflow(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, EngineError::RecordNotFound(_)));
    }

    #[tokio::test]
    async fn corrupted_role_fails_the_run_with_history() {
        let orch = orchestrator(vec![]);
        let mut record = orch.create_record("/tmp/z.bin", RoleName::new("optimizer"), 5).await.unwrap();
        record.current.role = RoleName::new("ghost");
        orch.store().save(record.id, &record).await.unwrap();

        let err = orch.run_workflow(record.id).await.unwrap_err();
        assert!(matches!(err, EngineError::RoleNotAllowed(_)));

        let after = orch.store().load(record.id).await.unwrap().unwrap();
        assert_eq!(after.current.status, Status::Error);
        assert_eq!(after.history.len(), 1);
    }

    #[tokio::test]
    async fn panicking_worker_fails_the_run_without_unwinding() {
        struct CrashingWorker {
            role: RoleName,
        }

        #[async_trait]
        impl Worker for CrashingWorker {
            fn role(&self) -> RoleName {
                self.role.clone()
            }

            async fn run(&self, _ctx: &WorkerContext) -> WorkerOutcome {
                panic!("synthetic crash");
            }
        }

        let orch = orchestrator(vec![Arc::new(CrashingWorker { role: RoleName::new("captioner") })]);
        let record = orch.create_record("/tmp/boom.jpg", RoleName::new("captioner"), 5).await.unwrap();
        let max_retries = record.config.max_retries;

        // El panic del worker no debe desenrollar hacia acá: el run
        // devuelve un error común de worker.
        let err = orch.run_workflow(record.id).await.unwrap_err();
        assert!(matches!(err, EngineError::WorkerFailure(ref r) if r.contains("panicked")), "got {err:?}");

        let failed = orch.store().load(record.id).await.unwrap().unwrap();
        assert_eq!(failed.current.status, Status::Error);
        assert_eq!(failed.current.role.as_str(), "captioner");
        assert_eq!(failed.history.len(), (max_retries + 1) as usize, "each crash consumes one attempt");
        assert!(failed.history.iter().all(|h| h.status == Status::Error && h.message.contains("panicked")));
    }

    #[tokio::test]
    async fn rehydrate_skips_assets_with_an_active_run() {
        let orch = Arc::new(orchestrator(vec![Arc::new(SleepyWorker { role: RoleName::new("optimizer") })]));
        let record = orch.create_record("/tmp/busy.bin", RoleName::new("optimizer"), 5).await.unwrap();

        let run = {
            let orch = Arc::clone(&orch);
            let id = record.id;
            tokio::spawn(async move { orch.run_workflow(id).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Con el despacho en vuelo el registro está en `processing`, pero
        // pertenece al run activo: la rehidratación no lo toca.
        assert_eq!(orch.rehydrate().await.unwrap(), 0);

        run.await.unwrap().unwrap();
        let done = orch.store().load(record.id).await.unwrap().unwrap();
        assert_eq!(done.current.status, Status::Complete);
    }

    #[tokio::test]
    async fn rehydrate_resets_stuck_processing_records() {
        let orch = orchestrator(vec![]);
        let mut record = orch.create_record("/tmp/stuck.bin", RoleName::new("optimizer"), 5).await.unwrap();
        record.set_status(Status::Processing);
        orch.store().save(record.id, &record).await.unwrap();

        let reset = orch.rehydrate().await.unwrap();
        assert_eq!(reset, 1);
        let after = orch.store().load(record.id).await.unwrap().unwrap();
        assert_eq!(after.current.status, Status::Pending);
    }
}
