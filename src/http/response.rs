//! # Construcción de Respuestas HTTP
//! src/http/response.rs
//!
//! API para construir respuestas HTTP/1.1 y escribirlas en el socket.
//!
//! Hay dos tipos de body:
//! - `Body::Bytes`: contenido en memoria (mensajes de error JSON)
//! - `Body::File`: archivo abierto que se copia al socket por bloques, sin
//!   cargarlo entero en memoria
//!
//! ## Formato de una respuesta
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Content-Type: text/html; charset=utf-8\r\n
//! Content-Length: 1532\r\n
//! Connection: close\r\n
//! \r\n
//! <!doctype html>...
//! ```
//!
//! ## Ejemplo de uso
//!
//! ```
//! use pocket_host::http::{Response, StatusCode};
//!
//! let response = Response::new(StatusCode::Ok)
//!     .with_header("Content-Type", "text/plain; charset=utf-8")
//!     .with_body("hola");
//!
//! let mut wire = Vec::new();
//! response.write_to(&mut wire, true).unwrap();
//! assert!(wire.ends_with(b"\r\n\r\nhola"));
//! ```

use super::StatusCode;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Write};
use thiserror::Error;

/// Tamaño del bloque usado al copiar archivos al socket
const STREAM_CHUNK: usize = 16 * 1024;

/// Cuerpo de la respuesta
#[derive(Debug)]
pub enum Body {
    /// Contenido en memoria
    Bytes(Vec<u8>),

    /// Archivo abierto; `len` es el tamaño anunciado en `Content-Length`
    File { file: File, len: u64 },
}

impl Body {
    pub fn len(&self) -> u64 {
        match self {
            Body::Bytes(bytes) => bytes.len() as u64,
            Body::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Error al escribir una respuesta
///
/// Distingue si la cabecera ya salió al socket: antes de eso todavía se
/// puede responder otra cosa (500), después solo queda cerrar la conexión.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Falló la escritura de la status line o de los headers
    #[error("failed writing response head: {0}")]
    Head(#[source] io::Error),

    /// Falló la copia del body (lectura del archivo o escritura al socket)
    #[error("failed streaming response body: {0}")]
    Body(#[source] io::Error),
}

/// Representa una respuesta HTTP completa
#[derive(Debug)]
pub struct Response {
    status: StatusCode,

    /// Usamos HashMap para evitar duplicados
    headers: HashMap<String, String>,

    body: Body,
}

impl Response {
    /// Crea una nueva respuesta sin headers ni body
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Body::Bytes(Vec::new()),
        }
    }

    /// Agrega un header a la respuesta (si ya existe, se sobrescribe)
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.add_header(name, value);
        self
    }

    /// Agrega un header a una respuesta existente (versión mutable)
    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_string(), value.to_string());
    }

    /// Establece el cuerpo desde un string y calcula `Content-Length`
    pub fn with_body(self, body: &str) -> Self {
        self.with_body_bytes(body.as_bytes().to_vec())
    }

    /// Establece el cuerpo desde bytes y calcula `Content-Length`
    pub fn with_body_bytes(mut self, body: Vec<u8>) -> Self {
        self.body = Body::Bytes(body);
        self.sync_content_length();
        self
    }

    /// Establece como cuerpo un archivo ya abierto de `len` bytes
    ///
    /// El archivo no se lee aquí; se copia por bloques en `write_to`.
    pub fn with_file(mut self, file: File, len: u64) -> Self {
        self.body = Body::File { file, len };
        self.sync_content_length();
        self
    }

    /// Crea una respuesta de error con mensaje JSON
    ///
    /// Formato del JSON: `{"error": "mensaje"}`
    ///
    /// # Ejemplo
    /// ```
    /// use pocket_host::http::{Response, StatusCode};
    ///
    /// let response = Response::error(StatusCode::NotFound, "File not found: \"x\"");
    /// assert_eq!(response.status(), StatusCode::NotFound);
    /// ```
    pub fn error(status: StatusCode, message: &str) -> Self {
        let body = serde_json::json!({ "error": message }).to_string();
        Self::new(status)
            .with_header("Content-Type", "application/json")
            .with_body(&body)
    }

    fn sync_content_length(&mut self) {
        self.headers
            .insert("Content-Length".to_string(), self.body.len().to_string());
    }

    /// Serializa la status line y los headers
    fn head_bytes(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {}\r\n", self.status);
        for (name, value) in &self.headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");
        head.into_bytes()
    }

    /// Escribe la respuesta completa en `out`
    ///
    /// Con `include_body = false` (HEAD) solo se escriben la status line y
    /// los headers. Si el archivo entrega menos bytes que los anunciados en
    /// `Content-Length` (por ejemplo porque se truncó mientras se leía) la
    /// copia falla con `UnexpectedEof`.
    pub fn write_to<W: Write>(self, out: &mut W, include_body: bool) -> Result<u64, WriteError> {
        let head = self.head_bytes();
        out.write_all(&head).map_err(WriteError::Head)?;

        let mut written = head.len() as u64;

        if include_body {
            written += match self.body {
                Body::Bytes(bytes) => {
                    out.write_all(&bytes).map_err(WriteError::Body)?;
                    bytes.len() as u64
                }
                Body::File { file, len } => stream_file(file, len, out).map_err(WriteError::Body)?,
            };
        }

        out.flush().map_err(WriteError::Body)?;
        Ok(written)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|s| s.as_str())
    }

    pub fn body(&self) -> &Body {
        &self.body
    }
}

/// Copia exactamente `len` bytes del archivo al socket
fn stream_file<W: Write>(file: File, len: u64, out: &mut W) -> io::Result<u64> {
    let mut reader = file.take(len);
    let mut buffer = vec![0u8; STREAM_CHUNK];
    let mut copied = 0u64;

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        out.write_all(&buffer[..n])?;
        copied += n as u64;
    }

    if copied < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("file shrank while streaming: sent {} of {} bytes", copied, len),
        ));
    }

    Ok(copied)
}
