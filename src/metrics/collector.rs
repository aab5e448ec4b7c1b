//! # Collector de Métricas
//! src/metrics/collector.rs
//!
//! Agregador del lado del host: cuenta requests, guarda una ventana de
//! latencias y lleva el uptime del servidor. Es lo que una UI consulta para
//! mostrar "requests totales" y "00m:42s".

use super::MetricsSink;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

/// Máximo de latencias a guardar (para calcular percentiles)
const LATENCY_WINDOW: usize = 10_000;

/// Estadísticas agregadas thread-safe
#[derive(Debug)]
pub struct RequestStats {
    inner: Mutex<StatsData>,
}

#[derive(Debug)]
struct StatsData {
    total_requests: u64,

    /// Latencias en microsegundos, las más viejas al frente
    latencies: VecDeque<u64>,

    /// `Some` mientras el servidor está corriendo
    started_at: Option<Instant>,
}

/// Snapshot serializable de las estadísticas
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub running: bool,
    pub uptime_secs: u64,
    pub uptime: String,
    pub total_requests: u64,
    pub latency_avg_us: u64,
    pub latency_p50_us: u64,
    pub latency_p95_us: u64,
    pub latency_p99_us: u64,
    pub samples: usize,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StatsData {
                total_requests: 0,
                latencies: VecDeque::with_capacity(LATENCY_WINDOW),
                started_at: None,
            }),
        }
    }

    fn data(&self) -> MutexGuard<'_, StatsData> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marca el servidor como corriendo y reinicia el reloj de uptime
    pub fn mark_started(&self) {
        self.data().started_at = Some(Instant::now());
    }

    /// Marca el servidor como detenido; el uptime vuelve a cero
    pub fn mark_stopped(&self) {
        self.data().started_at = None;
    }

    pub fn is_running(&self) -> bool {
        self.data().started_at.is_some()
    }

    pub fn total_requests(&self) -> u64 {
        self.data().total_requests
    }

    pub fn uptime(&self) -> Duration {
        self.data()
            .started_at
            .map(|t| t.elapsed())
            .unwrap_or_default()
    }

    /// Uptime con formato `MMm:SSs` (los minutos pueden pasar de 99)
    ///
    /// # Ejemplo
    /// ```
    /// use pocket_host::metrics::RequestStats;
    ///
    /// let stats = RequestStats::new();
    /// assert_eq!(stats.uptime_display(), "00m:00s");
    /// ```
    pub fn uptime_display(&self) -> String {
        format_uptime(self.uptime())
    }

    /// Obtiene un snapshot de las métricas
    pub fn snapshot(&self) -> StatsSnapshot {
        let data = self.data();
        let uptime = data.started_at.map(|t| t.elapsed()).unwrap_or_default();
        let (p50, p95, p99, avg) = calculate_percentiles(&data.latencies);

        StatsSnapshot {
            running: data.started_at.is_some(),
            uptime_secs: uptime.as_secs(),
            uptime: format_uptime(uptime),
            total_requests: data.total_requests,
            latency_avg_us: avg,
            latency_p50_us: p50,
            latency_p95_us: p95,
            latency_p99_us: p99,
            samples: data.latencies.len(),
        }
    }

    /// Snapshot en JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for RequestStats {
    fn record(&self, start: SystemTime, end: SystemTime) {
        // Un reloj que retrocede cuenta como latencia cero
        let latency_us = end.duration_since(start).unwrap_or_default().as_micros() as u64;

        let mut data = self.data();
        data.total_requests += 1;

        if data.latencies.len() >= LATENCY_WINDOW {
            data.latencies.pop_front();
        }
        data.latencies.push_back(latency_us);
    }
}

pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!("{:02}m:{:02}s", secs / 60, secs % 60)
}

/// Retorna (p50, p95, p99, promedio)
fn calculate_percentiles(latencies: &VecDeque<u64>) -> (u64, u64, u64, u64) {
    if latencies.is_empty() {
        return (0, 0, 0, 0);
    }

    let mut sorted: Vec<u64> = latencies.iter().copied().collect();
    sorted.sort_unstable();

    let len = sorted.len();
    let p50 = sorted[len * 50 / 100];
    let p95 = sorted[len * 95 / 100];
    let p99 = sorted[len * 99 / 100];

    let sum: u64 = sorted.iter().sum();
    let avg = sum / len as u64;

    (p50, p95, p99, avg)
}
