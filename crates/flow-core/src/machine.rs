//! Máquina de estados del workflow.
//!
//! Decisión pura sobre un registro: no hace I/O ni muta nada. Las
//! transiciones válidas por asset son `pending → processing →
//! {complete | error}` más la sub-secuencia por rol `roles[0] → … → done`.

use flow_domain::{RoleName, WorkflowRecord};

/// Qué debe hacer el orquestador con el registro observado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// El rol actual es `done`: marcar completo y parar. Chequeo terminal
    /// idempotente: no despacha ni produce historial nuevo.
    Complete,
    /// El rol actual no pertenece a la secuencia del registro.
    Reject { role: RoleName },
    /// Despachar el rol actual al worker registrado.
    Dispatch { role: RoleName },
}

pub struct WorkflowMachine;

impl WorkflowMachine {
    pub fn decide(record: &WorkflowRecord) -> Decision {
        if record.current.role.is_done() {
            return Decision::Complete;
        }
        match record.role_index() {
            Some(_) => Decision::Dispatch { role: record.current.role.clone() },
            None => Decision::Reject { role: record.current.role.clone() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_domain::RoleName;

    #[test]
    fn dispatches_current_role() {
        let rec = WorkflowRecord::new("/tmp/a.jpg", RoleName::new("captioner"), 5).unwrap();
        assert_eq!(WorkflowMachine::decide(&rec), Decision::Dispatch { role: RoleName::new("captioner") });
    }

    #[test]
    fn terminal_role_is_complete() {
        let mut rec = WorkflowRecord::new("/tmp/a.jpg", RoleName::new("optimizer"), 5).unwrap();
        rec.advance();
        assert!(rec.current.role.is_done());
        assert_eq!(WorkflowMachine::decide(&rec), Decision::Complete);
        // Decisión estable: repetir no cambia nada
        assert_eq!(WorkflowMachine::decide(&rec), Decision::Complete);
    }

    #[test]
    fn foreign_role_is_rejected() {
        let mut rec = WorkflowRecord::new("/tmp/a.jpg", RoleName::new("captioner"), 5).unwrap();
        rec.current.role = RoleName::new("ghost");
        assert_eq!(WorkflowMachine::decide(&rec), Decision::Reject { role: RoleName::new("ghost") });
    }
}
