//! # Interfaz de Métricas
//! src/metrics/sink.rs
//!
//! El servidor no agrega nada: por cada request atendido entrega los
//! timestamps de inicio y fin a un `MetricsSink` que implementa el host.

use std::time::SystemTime;

/// Receptor de métricas por request
///
/// `record` se llama exactamente una vez por request atendido (incluidas
/// las respuestas de error) y desde varios threads a la vez, así que la
/// implementación debe serializar o acumular de forma atómica.
pub trait MetricsSink: Send + Sync {
    fn record(&self, start: SystemTime, end: SystemTime);
}

/// Cualquier closure `Fn(start, end)` thread-safe sirve como sink
impl<F> MetricsSink for F
where
    F: Fn(SystemTime, SystemTime) + Send + Sync,
{
    fn record(&self, start: SystemTime, end: SystemTime) {
        self(start, end)
    }
}
