//! # Errores del Servidor
//! src/error.rs
//!
//! Solo los errores de ciclo de vida llegan al host. Los errores por request
//! (ruta, parsing, I/O al enviar) se convierten en respuestas HTTP dentro del
//! manejador de conexión y nunca salen de ahí.

use std::io;
use thiserror::Error;

/// Falla al arrancar; el servidor queda siempre en `Stopped`
#[derive(Debug, Error)]
pub enum StartError {
    /// El puerto está ocupado o no se tiene permiso para usarlo
    #[error("Port unavailable: {address}")]
    PortUnavailable {
        address: String,
        #[source]
        source: io::Error,
    },

    /// La configuración no pasó `ServerConfig::validate`
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Cualquier otra falla de I/O al preparar el listener
    #[error("I/O error while starting: {0}")]
    Io(#[from] io::Error),
}

impl StartError {
    /// Clasifica un error de bind: los de puerto ocupado/prohibido son `PortUnavailable`
    pub fn from_bind(address: &str, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::AddrInUse
            | io::ErrorKind::PermissionDenied
            | io::ErrorKind::AddrNotAvailable => StartError::PortUnavailable {
                address: address.to_string(),
                source,
            },
            _ => StartError::Io(source),
        }
    }
}

/// Falla al detener
#[derive(Debug, Error)]
pub enum ServerError {
    /// El thread del accept loop no se pudo unir limpiamente
    #[error("Shutdown error: {0}")]
    Shutdown(String),
}

/// Resultado del arranque
pub type StartResult<T> = Result<T, StartError>;
