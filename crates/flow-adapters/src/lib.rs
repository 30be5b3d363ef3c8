//! flow-adapters: workers incorporados que satisfacen el contrato de
//! despacho del core.
//!
//! Cada worker es una unidad opaca para el motor: relee el estado
//! persistido, verifica que el rol activo sea el suyo, escribe su output
//! bajo su propia clave, agrega una entrada de historial y avanza
//! `current`. El contenido real (captioning, traducción) es dummy aquí:
//! lo que importa es el contrato.

pub mod workers;

pub use workers::{CaptionWorker, GenericWorker, TranslateWorker};
