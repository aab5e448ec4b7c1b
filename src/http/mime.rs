//! # Tipos MIME
//! src/http/mime.rs
//!
//! Tabla extensión → `Content-Type` para los assets típicos de un sitio
//! estático. Lo desconocido se sirve como texto plano.

use std::path::Path;

/// Content-Type usado cuando la extensión no está en la tabla
pub const FALLBACK: &str = "text/plain; charset=utf-8";

/// Obtiene el Content-Type de un archivo según su extensión
///
/// La comparación no distingue mayúsculas (`LOGO.PNG` es `image/png`).
///
/// # Ejemplo
/// ```
/// use pocket_host::http::mime::content_type_for;
/// use std::path::Path;
///
/// assert_eq!(content_type_for(Path::new("site/index.html")), "text/html; charset=utf-8");
/// assert_eq!(content_type_for(Path::new("img/logo.PNG")), "image/png");
/// assert_eq!(content_type_for(Path::new("README")), "text/plain; charset=utf-8");
/// ```
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.to_ascii_lowercase(),
        None => return FALLBACK,
    };

    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        _ => FALLBACK,
    }
}
