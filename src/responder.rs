//! # Respuestas de Archivos Estáticos
//! src/responder.rs
//!
//! Convierte el resultado del router en una `Response`:
//!
//! ```text
//! Ok(ResolvedTarget) → 200 + Content-Type + Content-Length + archivo en streaming
//! Err(RouteError)    → 403 / 404 con {"error": ...}
//! falla al abrir     → 404 (borrado entre resolve y open) o 500
//! ```
//!
//! El archivo se abre aquí, antes de escribir nada al socket, así una falla
//! al abrir todavía puede convertirse en un 500.

use crate::http::{mime, Response, StatusCode};
use crate::router::{self, ResolvedTarget, RouteError};
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Resuelve y responde el path de un request contra `storage_root`
pub fn serve(storage_root: &Path, raw_path: &str) -> Response {
    match router::resolve(storage_root, raw_path) {
        Ok(target) => respond(&target),
        Err(err) => {
            if let RouteError::Forbidden(_) = err {
                warn!(path = raw_path, "intento de salir del proyecto");
            }
            error_response(&err)
        }
    }
}

/// Genera la respuesta para un archivo ya validado por el router
pub fn respond(target: &ResolvedTarget) -> Response {
    if !target.exists || !target.is_regular_file {
        return error_response(&RouteError::FileNotFound(
            target.absolute_path.display().to_string(),
        ));
    }

    let path = &target.absolute_path;

    let (file, len) = match open_regular(path) {
        Ok(opened) => opened,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            // Se borró entre la resolución y la apertura
            debug!(path = %path.display(), "archivo desaparecido antes de abrir");
            return error_response(&RouteError::FileNotFound(file_name(path)));
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "no se pudo abrir el archivo");
            return Response::error(StatusCode::InternalServerError, "Error reading file");
        }
    };

    Response::new(StatusCode::Ok)
        .with_header("Content-Type", mime::content_type_for(path))
        .with_file(file, len)
}

/// Respuesta para un error de ruta
pub fn error_response(err: &RouteError) -> Response {
    Response::error(err.status(), &err.to_string())
}

/// Abre el archivo y obtiene su tamaño del mismo descriptor
fn open_regular(path: &Path) -> io::Result<(File, u64)> {
    let file = File::open(path)?;
    let metadata = file.metadata()?;
    if !metadata.is_file() {
        return Err(io::Error::new(io::ErrorKind::NotFound, "not a regular file"));
    }
    Ok((file, metadata.len()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
