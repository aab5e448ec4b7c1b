//! # Parsing de Requests HTTP
//! src/http/request.rs
//!
//! Parser mínimo de la cabecera de un request HTTP/1.x.
//!
//! ## Formato
//!
//! ```text
//! GET /mi-proyecto/css/app.css?v=3 HTTP/1.1\r\n
//! Host: 192.168.0.10:8080\r\n
//! User-Agent: curl/8.5.0\r\n
//! \r\n
//! ```
//!
//! Solo interesan la request line y los headers. El body se ignora: el
//! servidor sirve contenido estático y cualquier método se trata como GET
//! sobre el path (HEAD omite el body de la respuesta).

use std::collections::HashMap;
use thiserror::Error;

/// Métodos HTTP reconocidos
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// GET - Obtener un archivo
    GET,

    /// HEAD - Como GET pero solo retorna headers
    HEAD,

    /// POST - Aceptado, pero servido como GET
    POST,

    /// Cualquier otro token válido (PUT, DELETE, OPTIONS, ...)
    Extension(String),
}

impl Method {
    /// Parsea un método HTTP desde el primer token de la request line
    ///
    /// # Errores
    ///
    /// Retorna error si el token está vacío o contiene algo distinto
    /// de letras ASCII mayúsculas.
    fn from_token(s: &str) -> Result<Self, ParseError> {
        match s {
            "GET" => Ok(Method::GET),
            "HEAD" => Ok(Method::HEAD),
            "POST" => Ok(Method::POST),
            other if !other.is_empty() && other.bytes().all(|b| b.is_ascii_uppercase()) => {
                Ok(Method::Extension(other.to_string()))
            }
            other => Err(ParseError::InvalidMethod(other.to_string())),
        }
    }

    /// Convierte el método a string
    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
            Method::Extension(name) => name,
        }
    }

    /// Indica si la respuesta debe llevar body
    pub fn expects_body(&self) -> bool {
        !matches!(self, Method::HEAD)
    }
}

/// Representa la cabecera de un request HTTP parseada
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,

    /// Path ya decodificado (sin query ni fragmento), siempre empieza con '/'
    path: String,

    /// Headers con el nombre en minúsculas
    headers: HashMap<String, String>,

    /// "HTTP/1.0" o "HTTP/1.1"
    version: String,
}

/// Errores que pueden ocurrir durante el parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Request vacío
    #[error("Empty request")]
    EmptyRequest,

    /// Bytes que no son UTF-8 en la cabecera
    #[error("Request head is not valid UTF-8")]
    InvalidEncoding,

    /// Formato inválido de la request line
    #[error("Invalid request line format")]
    InvalidRequestLine,

    /// Token de método inválido
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Versión HTTP no soportada
    #[error("Invalid HTTP version: {0}")]
    InvalidHttpVersion(String),

    /// El target no es un path absoluto ni una URL absoluta
    #[error("Invalid request target: {0}")]
    InvalidTarget(String),

    /// Percent-encoding que no produce UTF-8 o contiene NUL
    #[error("Invalid percent-encoding in path: {0}")]
    InvalidPathEncoding(String),

    /// Header malformado
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

impl Request {
    /// Parsea la cabecera de un request desde bytes
    ///
    /// El buffer puede contener (o no) el `\r\n\r\n` final y cualquier
    /// cantidad de body detrás; todo lo que sigue a la línea vacía se ignora.
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use pocket_host::http::Request;
    ///
    /// let raw = b"GET /blog/about%20me.html?x=1 HTTP/1.1\r\nHost: local\r\n\r\n";
    /// let request = Request::parse(raw).unwrap();
    ///
    /// assert_eq!(request.path(), "/blog/about me.html");
    /// assert_eq!(request.header("host"), Some("local"));
    /// ```
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        let head = match find_head_end(buffer) {
            Some(end) => &buffer[..end],
            None => buffer,
        };

        let request_str = std::str::from_utf8(head).map_err(|_| ParseError::InvalidEncoding)?;

        if request_str.trim().is_empty() {
            return Err(ParseError::EmptyRequest);
        }

        let mut lines = request_str.split("\r\n");
        let request_line = lines.next().ok_or(ParseError::EmptyRequest)?;

        let (method, path, version) = Self::parse_request_line(request_line)?;
        let headers = Self::parse_headers(lines)?;

        Ok(Request {
            method,
            path,
            headers,
            version,
        })
    }

    /// Formato: `GET /path?query HTTP/1.1`
    fn parse_request_line(line: &str) -> Result<(Method, String, String), ParseError> {
        let parts: Vec<&str> = line.split_whitespace().collect();

        if parts.len() != 3 {
            return Err(ParseError::InvalidRequestLine);
        }

        let method = Method::from_token(parts[0])?;
        let path = Self::parse_target(parts[1])?;

        let version = parts[2].to_string();
        if version != "HTTP/1.0" && version != "HTTP/1.1" {
            return Err(ParseError::InvalidHttpVersion(version));
        }

        Ok((method, path, version))
    }

    /// Extrae y decodifica el path del request target
    ///
    /// Acepta origin-form (`/a/b`) y absolute-form (`http://host/a/b`).
    /// La query y el fragmento se descartan.
    fn parse_target(target: &str) -> Result<String, ParseError> {
        let origin = if let Some(rest) = target
            .strip_prefix("http://")
            .or_else(|| target.strip_prefix("https://"))
        {
            // Saltar la autoridad (host:puerto)
            match rest.find('/') {
                Some(slash) => &rest[slash..],
                None => "/",
            }
        } else if target.starts_with('/') {
            target
        } else {
            return Err(ParseError::InvalidTarget(target.to_string()));
        };

        let raw_path = match origin.find(|c: char| c == '?' || c == '#') {
            Some(cut) => &origin[..cut],
            None => origin,
        };

        let decoded = urlencoding::decode(raw_path)
            .map_err(|_| ParseError::InvalidPathEncoding(raw_path.to_string()))?;

        if decoded.contains('\0') {
            return Err(ParseError::InvalidPathEncoding(raw_path.to_string()));
        }

        Ok(decoded.into_owned())
    }

    /// Cada header tiene formato "Name: Value"
    fn parse_headers<'a>(
        lines: impl Iterator<Item = &'a str>,
    ) -> Result<HashMap<String, String>, ParseError> {
        let mut headers = HashMap::new();

        for line in lines {
            // La línea vacía marca el fin de los headers
            if line.trim().is_empty() {
                break;
            }

            match line.split_once(':') {
                Some((name, value)) if !name.trim().is_empty() => {
                    headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
                }
                _ => return Err(ParseError::InvalidHeader(line.to_string())),
            }
        }

        Ok(headers)
    }

    // === Métodos públicos para acceder a los campos ===

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Obtiene un header (sin distinguir mayúsculas en el nombre)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|s| s.as_str())
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

/// Posición donde termina la cabecera (inicio de `\r\n\r\n`), si ya llegó
pub fn find_head_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}
