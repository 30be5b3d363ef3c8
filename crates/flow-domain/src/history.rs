//! Entradas de historial: registro de auditoría inmutable de cada
//! intento de ejecución de rol. La lista sólo crece; nunca se reordena
//! ni se borra en el flujo normal (la poda de entradas viejas es una
//! operación de mantenimiento explícita, ver flow-persistence).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::role::RoleName;
use crate::status::Status;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub role: RoleName,
    pub action: String,
    pub status: Status,
    pub message: String,
    pub duration_ms: u64,
    pub worker_ref: String,
}

impl HistoryEntry {
    pub fn new(role: RoleName,
               action: impl Into<String>,
               status: Status,
               message: impl Into<String>,
               duration_ms: u64,
               worker_ref: impl Into<String>)
               -> Self {
        HistoryEntry { timestamp: Utc::now(),
                       role,
                       action: action.into(),
                       status,
                       message: message.into(),
                       duration_ms,
                       worker_ref: worker_ref.into() }
    }
}
