//! Worker de captioning (dummy): escribe `outputs.caption`.

use async_trait::async_trait;
use serde_json::json;

use flow_core::{Worker, WorkerContext, WorkerOutcome};
use flow_domain::RoleName;

use super::execute_role;

pub struct CaptionWorker;

#[async_trait]
impl Worker for CaptionWorker {
    fn role(&self) -> RoleName {
        RoleName::new("captioner")
    }

    async fn run(&self, ctx: &WorkerContext) -> WorkerOutcome {
        let role = self.role();
        execute_role(ctx, &role, |record| {
            let caption = format!("Caption for {}", record.asset_name());
            record.set_output("caption", json!(caption));
            Ok("Generated caption".to_string())
        }).await
    }
}
