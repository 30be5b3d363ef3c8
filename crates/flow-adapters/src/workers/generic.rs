//! Worker genérico: cubre cualquier rol sin procesamiento real
//! (resizer, optimizer, analyzer). Marca su clave de output como hecha.

use async_trait::async_trait;
use serde_json::json;

use flow_core::{Worker, WorkerContext, WorkerOutcome};
use flow_domain::RoleName;

use super::execute_role;

pub struct GenericWorker {
    role: RoleName,
}

impl GenericWorker {
    pub fn new(role: RoleName) -> Self {
        Self { role }
    }
}

#[async_trait]
impl Worker for GenericWorker {
    fn role(&self) -> RoleName {
        self.role.clone()
    }

    async fn run(&self, ctx: &WorkerContext) -> WorkerOutcome {
        let role = self.role.clone();
        let key = role.clone();
        execute_role(ctx, &role, move |record| {
            record.set_output(key.as_str(), json!("done"));
            Ok(format!("Processed by {key}"))
        }).await
    }
}
