//! # Sondeo de Puertos
//! src/server/probe.rs
//!
//! Verifica si un puerto está libre haciendo un bind transitorio.

use std::net::TcpListener;
use tracing::debug;

/// Retorna `true` si se puede hacer bind en `host:port`
///
/// El listener de prueba se cierra antes de retornar. Entre el sondeo y el
/// bind real otro proceso puede tomar el puerto; `Server::start` trata ese
/// caso como `PortUnavailable`.
///
/// # Ejemplo
/// ```
/// use pocket_host::server::probe::is_available;
/// use std::net::TcpListener;
///
/// let busy = TcpListener::bind("127.0.0.1:0").unwrap();
/// let port = busy.local_addr().unwrap().port();
/// assert!(!is_available("127.0.0.1", port));
/// ```
pub fn is_available(host: &str, port: u16) -> bool {
    match TcpListener::bind((host, port)) {
        Ok(listener) => {
            drop(listener);
            true
        }
        Err(e) => {
            debug!(host, port, error = %e, "puerto no disponible");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_port_is_available() {
        // Pedir un puerto efímero, liberarlo y sondearlo
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        assert!(is_available("127.0.0.1", port));
    }

    #[test]
    fn test_bound_port_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(!is_available("127.0.0.1", port));
        drop(listener);
    }

    #[test]
    fn test_probe_leaves_port_free() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        assert!(is_available("127.0.0.1", port));
        // El sondeo no debe dejar el puerto tomado
        assert!(TcpListener::bind(("127.0.0.1", port)).is_ok());
    }
}
