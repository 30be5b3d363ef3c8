//! Registro de workflow por asset: única fuente de verdad durable.
//!
//! Invariantes del documento:
//! - `current.role` siempre pertenece a `config.allowed_roles` o es `done`.
//! - Hay exactamente un paso activo (`current`) por registro.
//! - `history` sólo crece; `outputs` acumula de forma monótona (una clave
//!   por rol; la re-ejecución tras retry sobreescribe, no duplica).

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::DomainError;
use crate::history::HistoryEntry;
use crate::role::{role_sequence, RoleName};
use crate::status::Status;

/// Etiqueta de formato del documento, para compatibilidad hacia adelante.
pub const SCHEMA_VERSION: &str = "selfflow.v1";

/// Presupuesto de re-despachos por rol antes de pasar a `error`.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// El único paso activo del registro.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentStep {
    pub role: RoleName,
    pub status: Status,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Configuración fijada en la creación; nunca se muta después.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub allowed_roles: Vec<RoleName>,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub id: Uuid,
    pub asset_path: String,
    pub schema: String,
    pub current: CurrentStep,
    pub config: WorkflowConfig,
    pub history: Vec<HistoryEntry>,
    pub outputs: IndexMap<String, Value>,
}

impl WorkflowRecord {
    /// Crea el registro de intake: `current.role = initial_role`,
    /// `status = pending`, secuencia sembrada desde la tabla rol→secuencia.
    pub fn new(asset_path: impl Into<String>, initial_role: RoleName, priority: i32) -> Result<Self, DomainError> {
        let asset_path = asset_path.into();
        if asset_path.is_empty() {
            return Err(DomainError::Validation("asset path must not be empty".to_string()));
        }
        if initial_role.is_done() {
            return Err(DomainError::Validation("initial role cannot be the terminal role".to_string()));
        }
        let now = Utc::now();
        Ok(WorkflowRecord { id: Uuid::new_v4(),
                            asset_path,
                            schema: SCHEMA_VERSION.to_string(),
                            current: CurrentStep { role: initial_role.clone(),
                                                   status: Status::Pending,
                                                   priority,
                                                   created_at: now,
                                                   updated_at: now },
                            config: WorkflowConfig { allowed_roles: role_sequence(&initial_role),
                                                     max_retries: DEFAULT_MAX_RETRIES },
                            history: Vec::new(),
                            outputs: IndexMap::new() })
    }

    /// Componente final de `asset_path` (nombre visible del asset).
    pub fn asset_name(&self) -> &str {
        self.asset_path.rsplit(['/', '\\']).next().unwrap_or(&self.asset_path)
    }

    /// Posición del rol actual dentro de `allowed_roles`. `None` si el rol
    /// no pertenece a la secuencia (registro corrupto) y no es `done`.
    pub fn role_index(&self) -> Option<usize> {
        self.config.allowed_roles.iter().position(|r| r == &self.current.role)
    }

    /// Sucesor del rol actual en la secuencia, o `done` si está agotada.
    pub fn next_role(&self) -> RoleName {
        match self.role_index() {
            Some(i) if i + 1 < self.config.allowed_roles.len() => self.config.allowed_roles[i + 1].clone(),
            _ => RoleName::done(),
        }
    }

    /// Avanza `current` al siguiente rol con `status = pending`.
    pub fn advance(&mut self) {
        self.current.role = self.next_role();
        self.current.status = Status::Pending;
        self.touch();
    }

    /// Estimación gruesa y monótona de progreso: `(index + 1) / len * 100`
    /// topada en 95 mientras no sea terminal; 100 sólo al llegar a `done`.
    pub fn progress(&self) -> u8 {
        if self.current.role.is_done() {
            return 100;
        }
        let len = self.config.allowed_roles.len();
        match self.role_index() {
            Some(i) if len > 0 => {
                let pct = ((i + 1) * 100 / len) as u8;
                pct.min(95)
            }
            _ => 0,
        }
    }

    pub fn set_status(&mut self, status: Status) {
        self.current.status = status;
        self.touch();
    }

    /// Agrega una entrada de historial (append-only).
    pub fn push_history(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
        self.touch();
    }

    /// Escribe el output de un rol bajo su propia clave. La clave se
    /// sobreescribe en re-ejecución, nunca se duplica.
    pub fn set_output(&mut self, key: impl Into<String>, value: Value) {
        self.outputs.insert(key.into(), value);
        self.touch();
    }

    fn touch(&mut self) {
        self.current.updated_at = Utc::now();
    }
}
