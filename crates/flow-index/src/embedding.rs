//! Pseudo-embedding determinista derivado de hash criptográfico.
//!
//! Placeholder explícito de un modelo de embeddings real: el contrato es
//! estabilidad (mismo texto ⇒ mismo vector, bit a bit), rango uniforme y
//! dimensión fija acordada con el backend (384), no significado
//! semántico. Dos textos distintos producen vectores distintos con
//! probabilidad abrumadora (colisión SHA-256).
//!
//! Expansión: cada byte del digest SHA-256 se expande LSB-first en ocho
//! componentes ±1.0 (256 componentes) y se rellena con ceros hasta 384.

use sha2::{Digest, Sha256};

/// Dimensión fija acordada con el backend de búsqueda.
pub const EMBEDDING_DIM: usize = 384;

/// Función pura y determinista texto → vector de dimensión fija.
pub fn embed(text: &str) -> Vec<f32> {
    let digest = Sha256::digest(text.as_bytes());
    let mut vector = Vec::with_capacity(EMBEDDING_DIM);
    for byte in digest.iter().take(48) {
        for bit in 0..8 {
            let bit_val = (byte >> bit) & 1;
            vector.push(2.0 * f32::from(bit_val) - 1.0);
        }
    }
    vector.resize(EMBEDDING_DIM, 0.0);
    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_is_deterministic() {
        let a = embed("cat.jpg captioner pending");
        let b = embed("cat.jpg captioner pending");
        assert_eq!(a, b, "equal text must yield an identical vector");
    }

    #[test]
    fn distinct_texts_yield_distinct_vectors() {
        assert_ne!(embed("cat.jpg captioner pending"), embed("cat.jpg captioner processing"));
        assert_ne!(embed("a"), embed("b"));
    }

    #[test]
    fn dimension_and_range_are_fixed() {
        let v = embed("");
        assert_eq!(v.len(), EMBEDDING_DIM);
        assert!(v.iter().all(|x| (-1.0..=1.0).contains(x)));
        // Los primeros 256 componentes vienen del digest, el resto es relleno.
        assert!(v[..256].iter().all(|x| *x == 1.0 || *x == -1.0));
        assert!(v[256..].iter().all(|x| *x == 0.0));
    }
}
