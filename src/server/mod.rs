//! # Módulo del Servidor
//! src/server/mod.rs
//!
//! Servidor TCP concurrente, un thread por conexión:
//! 1. `probe`: verifica que el puerto esté libre antes del bind
//! 2. `lifecycle`: estados, accept loop y cierre con período de gracia
//! 3. `connection`: lee un request, responde y reporta la métrica
//! 4. `tracker`: conexiones en curso, para esperarlas o cortarlas al detener

pub mod connection;
pub mod lifecycle;
pub mod probe;
pub mod tracker;

// Re-exportar para facilitar el uso
pub use lifecycle::{Server, ServerState};
