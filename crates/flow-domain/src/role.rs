//! Roles de procesamiento y la tabla rol→secuencia.
//!
//! Un `RoleName` es un string opaco que nombra una capacidad de
//! procesamiento. El valor distinguido `done` es terminal y nunca se
//! despacha a un worker.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Rol terminal: alcanzarlo marca el workflow como completo.
pub const DONE_ROLE: &str = "done";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleName(String);

impl RoleName {
    pub fn new(name: impl Into<String>) -> Self {
        RoleName(name.into())
    }

    pub fn done() -> Self {
        RoleName(DONE_ROLE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_done(&self) -> bool {
        self.0 == DONE_ROLE
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RoleName {
    fn from(s: &str) -> Self {
        RoleName(s.to_string())
    }
}

/// Secuencias conocidas por rol inicial. Cualquier rol fuera de la tabla
/// obtiene la secuencia mínima `[rol, done]`.
static ROLE_SEQUENCES: Lazy<HashMap<&'static str, Vec<&'static str>>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("captioner", vec!["captioner", "translator", DONE_ROLE]);
    m
});

/// Construye la lista `allowed_roles` para un rol inicial dado.
pub fn role_sequence(initial: &RoleName) -> Vec<RoleName> {
    match ROLE_SEQUENCES.get(initial.as_str()) {
        Some(seq) => seq.iter().map(|r| RoleName::new(*r)).collect(),
        None => vec![initial.clone(), RoleName::done()],
    }
}
