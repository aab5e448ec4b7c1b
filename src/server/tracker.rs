//! # Registro de Conexiones en Curso
//! src/server/tracker.rs
//!
//! Lleva la cuenta de las conexiones que se están atendiendo para que `stop`
//! pueda esperarlas durante el período de gracia y, vencido ese plazo,
//! cortar sus sockets.

use std::collections::HashMap;
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct ConnectionTracker {
    inner: Mutex<TrackerState>,
    idle: Condvar,
}

#[derive(Debug, Default)]
struct TrackerState {
    next_id: u64,

    /// Clon del socket de cada conexión activa (None si `try_clone` falló)
    streams: HashMap<u64, Option<TcpStream>>,
}

/// Mantiene registrada una conexión mientras vive
///
/// Al soltarse (incluso durante un pánico del handler) la conexión se
/// desregistra y se despierta a quien espere en `wait_idle`.
#[derive(Debug)]
pub struct ConnectionGuard {
    tracker: Arc<ConnectionTracker>,
    id: u64,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registra una conexión aceptada
    pub fn register(self: &Arc<Self>, stream: &TcpStream) -> ConnectionGuard {
        let clone = stream.try_clone().ok();
        let mut state = self.state();
        let id = state.next_id;
        state.next_id += 1;
        state.streams.insert(id, clone);

        ConnectionGuard {
            tracker: Arc::clone(self),
            id,
        }
    }

    /// Número de conexiones activas
    pub fn active(&self) -> usize {
        self.state().streams.len()
    }

    /// Espera hasta que no queden conexiones o venza `timeout`
    ///
    /// Retorna `true` si quedó vacío.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state();

        while !state.streams.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = match self.idle.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }

    /// Corta lectura y escritura de todas las conexiones activas
    ///
    /// Los handlers bloqueados en I/O reciben un error y terminan. Retorna
    /// cuántas conexiones se cortaron.
    pub fn shutdown_all(&self) -> usize {
        let state = self.state();
        for stream in state.streams.values().flatten() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        state.streams.len()
    }

    fn deregister(&self, id: u64) {
        let mut state = self.state();
        state.streams.remove(&id);
        if state.streams.is_empty() {
            self.idle.notify_all();
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.tracker.deregister(self.id);
    }
}
