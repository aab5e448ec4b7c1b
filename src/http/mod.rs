//! # Módulo HTTP
//! src/http/mod.rs
//!
//! Implementación mínima del protocolo para servir archivos estáticos:
//!
//! - Parsing de la cabecera del request (request line + headers)
//! - Construcción de responses con body en memoria o en streaming
//! - Códigos de estado
//! - Tabla de tipos MIME
//!
//! Quedan fuera a propósito: keep-alive, rangos, compresión y chunked
//! transfer-encoding. Cada conexión atiende un request y se cierra.

pub mod mime;
pub mod request;
pub mod response;
pub mod status;

// Re-exportamos los tipos principales para facilitar su uso
pub use request::{Method, ParseError, Request};
pub use response::{Body, Response, WriteError};
pub use status::StatusCode;
