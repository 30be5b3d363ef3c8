//! Estado observable de un asset o de una entrada de historial.
//!
//! Es una bandera, no una métrica de progreso: no se asume orden total
//! de deseabilidad entre variantes.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Esperando ejecución.
    Pending,
    /// Un run activo está despachando el rol actual.
    Processing,
    /// El asset alcanzó el rol terminal.
    Complete,
    /// Fallo terminal (presupuesto de retries agotado o registro corrupto).
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Pending => "pending",
            Status::Processing => "processing",
            Status::Complete => "complete",
            Status::Error => "error",
        };
        write!(f, "{s}")
    }
}
