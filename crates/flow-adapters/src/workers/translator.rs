//! Worker de traducción (dummy): traduce el caption previo.

use async_trait::async_trait;
use serde_json::{json, Value};

use flow_core::{Worker, WorkerContext, WorkerOutcome};
use flow_domain::RoleName;

use super::execute_role;

pub struct TranslateWorker;

#[async_trait]
impl Worker for TranslateWorker {
    fn role(&self) -> RoleName {
        RoleName::new("translator")
    }

    async fn run(&self, ctx: &WorkerContext) -> WorkerOutcome {
        let role = self.role();
        execute_role(ctx, &role, |record| {
            // Caption ausente se tolera: el output queda vacío-traducido.
            let caption = record.outputs
                                .get("caption")
                                .and_then(Value::as_str)
                                .unwrap_or("")
                                .to_string();
            record.set_output("translation", json!(format!("{caption} (translated)")));
            Ok("Translated caption".to_string())
        }).await
    }
}
