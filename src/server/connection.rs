//! # Manejo de una Conexión
//! src/server/connection.rs
//!
//! Cada conexión aceptada se atiende en su propio thread:
//!
//! ```text
//! leer cabecera → t0 → parse → resolver + responder → escribir → t1 → sink.record(t0, t1) → cerrar
//! ```
//!
//! Ningún error sale de aquí: parsing, routing y escritura se convierten en
//! una respuesta (400/403/404/500) o, si la cabecera ya se envió, en el
//! cierre de la conexión.

use crate::http::request::find_head_end;
use crate::http::{Request, Response, StatusCode, WriteError};
use crate::metrics::MetricsSink;
use crate::responder;
use std::io::{self, Read};
use std::net::{Shutdown, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error, info, warn};

/// Tamaño máximo de la cabecera de un request
pub const MAX_HEAD_BYTES: usize = 8 * 1024;

/// Máximo que se espera al cliente al cerrar la conexión
const LINGER_TIMEOUT: Duration = Duration::from_secs(2);

/// Máximo de bytes sobrantes que se descartan al cerrar
const MAX_DRAIN_BYTES: u64 = 64 * 1024 * 1024;

/// Valor del header `Server`
pub const SERVER_NAME: &str = concat!("PocketHost/", env!("CARGO_PKG_VERSION"));

/// Lo que un handler necesita compartir con el resto del servidor
pub struct ConnectionContext {
    pub storage_root: PathBuf,
    pub sink: Arc<dyn MetricsSink>,

    /// Timeout de lectura y escritura del socket
    pub io_timeout: Duration,
}

/// Atiende un request y cierra la conexión
///
/// Retorna el status enviado, o `None` si el peer cerró sin mandar nada
/// (eso no cuenta como request y no genera métrica).
pub fn handle_connection(mut stream: TcpStream, ctx: &ConnectionContext) -> Option<StatusCode> {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    if let Err(e) = configure(&stream, ctx.io_timeout) {
        debug!(%peer, error = %e, "no se pudieron fijar los timeouts");
    }

    let head = read_head(&mut stream);
    if head.is_empty() {
        debug!(%peer, "conexión cerrada sin request");
        return None;
    }

    let start = SystemTime::now();
    let clock = Instant::now();

    let (response, include_body, label) = build_response(&head, ctx);
    let status = response.status();

    let delivered = match response.write_to(&mut stream, include_body) {
        Ok(bytes) => {
            debug!(%peer, bytes, "respuesta enviada");
            true
        }
        Err(WriteError::Head(e)) => {
            warn!(%peer, error = %e, "el cliente se fue antes de la respuesta");
            false
        }
        Err(WriteError::Body(e)) => {
            // La cabecera ya salió: solo queda cortar la conexión
            warn!(%peer, request = %label, error = %e, "envío del archivo abortado");
            false
        }
    };

    let end = SystemTime::now();
    ctx.sink.record(start, end);

    info!(
        %peer,
        request = %label,
        status = status.as_u16(),
        latency_ms = clock.elapsed().as_secs_f64() * 1000.0,
        "request atendido"
    );

    if delivered {
        linger_close(stream, &peer);
    }

    Some(status)
}

/// Cierra enviando FIN y descarta lo que el cliente siga mandando
///
/// Cerrar con bytes sin leer en el buffer de recepción hace que el kernel
/// mande RST, y el cliente puede perder la respuesta (p. ej. el body de un
/// POST). El descarte termina con EOF, `LINGER_TIMEOUT` o `MAX_DRAIN_BYTES`.
fn linger_close(mut stream: TcpStream, peer: &str) {
    if let Err(e) = stream.shutdown(Shutdown::Write) {
        debug!(%peer, error = %e, "no se pudo cerrar la escritura");
        return;
    }

    let deadline = Instant::now() + LINGER_TIMEOUT;
    let mut buffer = [0u8; 16 * 1024];
    let mut drained: u64 = 0;

    while drained < MAX_DRAIN_BYTES {
        let now = Instant::now();
        if now >= deadline || stream.set_read_timeout(Some(deadline - now)).is_err() {
            break;
        }
        match stream.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => drained += n as u64,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }

    if drained > 0 {
        debug!(%peer, drained, "bytes sobrantes del request descartados");
    }
}

fn configure(stream: &TcpStream, timeout: Duration) -> io::Result<()> {
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    Ok(())
}

/// Parsea y resuelve; un pánico en el camino se convierte en 500
fn build_response(head: &[u8], ctx: &ConnectionContext) -> (Response, bool, String) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match Request::parse(head) {
        Ok(request) => {
            let label = format!("{} {}", request.method().as_str(), request.path());
            let response = responder::serve(&ctx.storage_root, request.path());
            (response, request.method().expects_body(), label)
        }
        Err(e) => {
            warn!(error = %e, "request malformado");
            let response = Response::error(StatusCode::BadRequest, &format!("Invalid: {}", e));
            (response, true, "<malformed>".to_string())
        }
    }));

    let (mut response, include_body, label) = outcome.unwrap_or_else(|_| {
        error!("pánico al generar la respuesta");
        (
            Response::error(StatusCode::InternalServerError, "Internal server error"),
            true,
            "<panic>".to_string(),
        )
    });

    add_common_headers(&mut response);
    (response, include_body, label)
}

/// Headers comunes a todas las respuestas
fn add_common_headers(response: &mut Response) {
    response.add_header("Server", SERVER_NAME);
    response.add_header("Connection", "close");
}

/// Lee hasta el fin de la cabecera, EOF, error o `MAX_HEAD_BYTES`
///
/// Un error después de haber recibido algo no descarta lo leído: el parser
/// decide si alcanza para un request.
fn read_head(stream: &mut TcpStream) -> Vec<u8> {
    let mut head = Vec::with_capacity(1024);
    let mut buffer = [0u8; 4096];

    while head.len() < MAX_HEAD_BYTES {
        match stream.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                head.extend_from_slice(&buffer[..n]);
                if find_head_end(&head).is_some() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(error = %e, read = head.len(), "lectura interrumpida");
                break;
            }
        }
    }

    head
}
