//! # Resolución de Rutas
//! src/router/mod.rs
//!
//! Traduce el path de un request a un archivo dentro de un proyecto.
//!
//! ```text
//! /<proyecto>/<path relativo>
//!      │             │
//!      │             └─ vacío o terminado en '/' → index.html
//!      └─ nombre del directorio bajo storage_root (en minúsculas)
//! ```
//!
//! La verificación de contención se hace sobre el path canónico (symlinks
//! resueltos), no sobre el léxico: un symlink dentro del proyecto que apunta
//! afuera se rechaza igual que un `..`.

use crate::http::StatusCode;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Documento servido cuando el path nombra un directorio
pub const DEFAULT_DOCUMENT: &str = "index.html";

/// Errores de resolución; cada uno se traduce a un status HTTP
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// Request a `/` sin proyecto
    #[error("No project selected")]
    NoProject,

    /// No existe el directorio del proyecto
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    /// El path sale del directorio del proyecto
    #[error("Path escapes project directory: {0}")]
    Forbidden(String),

    /// El archivo no existe o no es un archivo regular
    #[error("File not found: {0}")]
    FileNotFound(String),
}

impl RouteError {
    /// Status HTTP asociado
    pub fn status(&self) -> StatusCode {
        match self {
            RouteError::Forbidden(_) => StatusCode::Forbidden,
            RouteError::NoProject
            | RouteError::ProjectNotFound(_)
            | RouteError::FileNotFound(_) => StatusCode::NotFound,
        }
    }
}

/// Ruta derivada del path del request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Nombre del proyecto, ya en minúsculas
    pub project_name: String,

    /// Path dentro del proyecto, con el documento por defecto aplicado
    pub relative_path: String,
}

impl Route {
    /// Parsea el path de un request
    ///
    /// # Ejemplo
    /// ```
    /// use pocket_host::router::Route;
    ///
    /// let route = Route::parse("/Portfolio/").unwrap();
    /// assert_eq!(route.project_name, "portfolio");
    /// assert_eq!(route.relative_path, "index.html");
    ///
    /// let route = Route::parse("/portfolio/css/app.css").unwrap();
    /// assert_eq!(route.relative_path, "css/app.css");
    /// ```
    pub fn parse(raw_path: &str) -> Result<Self, RouteError> {
        let trimmed = raw_path.strip_prefix('/').unwrap_or(raw_path);

        let (project, rest) = match trimmed.split_once('/') {
            Some((project, rest)) => (project, rest),
            None => (trimmed, ""),
        };

        if project.is_empty() {
            return Err(RouteError::NoProject);
        }

        let project_name = project.to_lowercase();

        let relative_path = if rest.is_empty() || rest.ends_with('/') {
            format!("{}{}", rest, DEFAULT_DOCUMENT)
        } else {
            rest.to_string()
        };

        Ok(Self {
            project_name,
            relative_path,
        })
    }
}

/// Resultado de unir `storage_root/proyecto/path` de forma segura
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Path canónico (si existe) o léxico dentro del proyecto canónico
    pub absolute_path: PathBuf,
    pub exists: bool,
    pub is_regular_file: bool,
}

/// Resuelve el path de un request a un archivo servible
///
/// Orden de verificación:
/// 1. Proyecto vacío → `NoProject`
/// 2. Componentes `..`, absolutos o nombres de proyecto especiales → `Forbidden`
/// 3. Directorio del proyecto inexistente → `ProjectNotFound`
/// 4. Path canónico fuera del proyecto (symlinks) → `Forbidden`
/// 5. Inexistente o no regular → `FileNotFound`
pub fn resolve(storage_root: &Path, raw_path: &str) -> Result<ResolvedTarget, RouteError> {
    let route = Route::parse(raw_path)?;
    let target = resolve_route(storage_root, &route)?;

    if !target.exists || !target.is_regular_file {
        return Err(RouteError::FileNotFound(route.relative_path));
    }

    Ok(target)
}

/// Resuelve una ruta ya parseada sin exigir que el archivo exista
pub fn resolve_route(storage_root: &Path, route: &Route) -> Result<ResolvedTarget, RouteError> {
    if !is_plain_segment(&route.project_name) {
        return Err(RouteError::Forbidden(route.project_name.clone()));
    }
    if !is_contained_lexically(&route.relative_path) {
        return Err(RouteError::Forbidden(route.relative_path.clone()));
    }

    let root = fs::canonicalize(storage_root)
        .map_err(|_| RouteError::ProjectNotFound(route.project_name.clone()))?;

    let project_dir = match fs::canonicalize(root.join(&route.project_name)) {
        Ok(dir) => dir,
        Err(_) => return Err(RouteError::ProjectNotFound(route.project_name.clone())),
    };

    // El proyecto puede ser un symlink; igual debe quedar bajo la raíz
    if !project_dir.starts_with(&root) || project_dir == root {
        return Err(RouteError::Forbidden(route.project_name.clone()));
    }
    if !project_dir.is_dir() {
        return Err(RouteError::ProjectNotFound(route.project_name.clone()));
    }

    let joined = project_dir.join(&route.relative_path);

    match fs::canonicalize(&joined) {
        Ok(canonical) => {
            if !canonical.starts_with(&project_dir) {
                return Err(RouteError::Forbidden(route.relative_path.clone()));
            }
            let is_regular_file = fs::metadata(&canonical)
                .map(|m| m.is_file())
                .unwrap_or(false);
            Ok(ResolvedTarget {
                absolute_path: canonical,
                exists: true,
                is_regular_file,
            })
        }
        Err(e) if is_missing(&e) => Ok(ResolvedTarget {
            absolute_path: joined,
            exists: false,
            is_regular_file: false,
        }),
        Err(_) => Err(RouteError::FileNotFound(route.relative_path.clone())),
    }
}

/// Un nombre de proyecto es un único segmento normal (ni `.`, ni `..`, sin separadores)
pub(crate) fn is_plain_segment(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(segment)), None) if segment == name
    )
}

/// Ningún componente sube de nivel ni reinicia desde la raíz
pub(crate) fn is_contained_lexically(relative: &str) -> bool {
    if relative.contains('\\') {
        return false;
    }
    Path::new(relative)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn is_missing(e: &io::Error) -> bool {
    // ENOTDIR ("index.html/x") se trata igual que un archivo inexistente
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}
