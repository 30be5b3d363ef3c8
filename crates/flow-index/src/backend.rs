//! Contrato del backend de vectores y backend en memoria.
//!
//! El backend remoto real (store clave/vector tipo Upstash) queda fuera
//! del core; el cliente sólo depende de esta interfaz estrecha:
//! upsert / fetch / query top-K / delete, last-write-wins por id.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::embedding::EMBEDDING_DIM;
use crate::errors::IndexError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: Map<String, Value>,
}

/// Un match de `query`: orden descendente por score, secuencia finita.
#[derive(Debug, Clone)]
pub struct SearchMatch {
    pub id: String,
    pub score: f32,
    pub metadata: Map<String, Value>,
}

#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Idempotente por `id`: la última escritura gana.
    async fn upsert(&self, record: VectorRecord) -> Result<(), IndexError>;

    async fn fetch(&self, id: &str) -> Result<Option<VectorRecord>, IndexError>;

    /// Top-K vecinos por score, descendente.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchMatch>, IndexError>;

    async fn delete(&self, id: &str) -> Result<(), IndexError>;
}

/// Backend en memoria con scoring por producto punto. Referencia para
/// tests y demo; el orden de empates no está especificado.
#[derive(Debug, Default)]
pub struct InMemoryVectorBackend {
    inner: DashMap<String, VectorRecord>,
}

impl InMemoryVectorBackend {
    pub fn new() -> Self {
        Self { inner: DashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[async_trait]
impl VectorBackend for InMemoryVectorBackend {
    async fn upsert(&self, record: VectorRecord) -> Result<(), IndexError> {
        if record.vector.len() != EMBEDDING_DIM {
            return Err(IndexError::DimensionMismatch { expected: EMBEDDING_DIM,
                                                       got: record.vector.len() });
        }
        self.inner.insert(record.id.clone(), record);
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<VectorRecord>, IndexError> {
        Ok(self.inner.get(id).map(|r| r.clone()))
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchMatch>, IndexError> {
        if vector.len() != EMBEDDING_DIM {
            return Err(IndexError::DimensionMismatch { expected: EMBEDDING_DIM,
                                                       got: vector.len() });
        }
        let mut matches: Vec<SearchMatch> = self.inner
                                                .iter()
                                                .map(|r| SearchMatch { id: r.id.clone(),
                                                                       score: dot(vector, &r.vector),
                                                                       metadata: r.metadata.clone() })
                                                .collect();
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete(&self, id: &str) -> Result<(), IndexError> {
        self.inner.remove(id);
        Ok(())
    }
}
