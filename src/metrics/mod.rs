//! # Sistema de Métricas
//! src/metrics/mod.rs
//!
//! - `sink`: interfaz que el servidor usa para reportar cada request
//! - `collector`: agregador del lado del host (conteo, latencias, uptime)

pub mod collector;
pub mod sink;

pub use collector::{RequestStats, StatsSnapshot};
pub use sink::MetricsSink;
