//! # Proyectos
//! src/projects.rs
//!
//! Cada subdirectorio directo de la raíz de almacenamiento es un proyecto y
//! se sirve bajo `/<nombre>/`. Este módulo los lista, los crea, los borra,
//! importa archivos y carpetas dentro de ellos y busca su ícono.
//!
//! Todo lo que se escribe queda dentro del proyecto: los subdirectorios de
//! destino pasan por las mismas reglas de contención que el router. El
//! servidor puede estar atendiendo requests mientras tanto; un request que
//! choca con una importación o un borrado ve un 404 o una respuesta cortada,
//! nunca un estado roto.

use crate::router;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Nombres de ícono buscados, en orden de preferencia
pub const FAVICON_CANDIDATES: [&str; 6] = [
    "favicon.png",
    "icon.png",
    "favicon.jpg",
    "icon.jpg",
    "favicon.jpeg",
    "favicon.webp",
];

/// Un proyecto encontrado en la raíz
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectInfo {
    pub name: String,
    pub path: PathBuf,
    pub favicon: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Invalid project name: {0:?}")]
    InvalidName(String),

    /// Subdirectorio de destino fuera del proyecto o mal formado
    #[error("Invalid path inside project: {0:?}")]
    InvalidPath(String),

    #[error("Project not found: {0}")]
    NotFound(String),

    /// El origen de una importación no es un archivo o directorio legible
    #[error("Invalid import source: {0}")]
    InvalidSource(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Una entrada dentro de un proyecto
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
}

/// Lista los proyectos ordenados por nombre
///
/// Una raíz inexistente no es un error: simplemente no hay proyectos.
pub fn list_projects(storage_root: &Path) -> Result<Vec<ProjectInfo>, ProjectError> {
    let entries = match fs::read_dir(storage_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut projects = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }

        let path = entry.path();
        projects.push(ProjectInfo {
            name: entry.file_name().to_string_lossy().into_owned(),
            favicon: find_favicon(&path),
            path,
        });
    }

    projects.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(projects)
}

/// Busca el ícono del proyecto en todo su árbol
///
/// Gana el primer candidato de `FAVICON_CANDIDATES` que exista; si un mismo
/// nombre aparece en varios lugares se toma el primero de un recorrido en
/// profundidad con las entradas en orden alfabético.
pub fn find_favicon(project_dir: &Path) -> Option<PathBuf> {
    FAVICON_CANDIDATES
        .iter()
        .find_map(|candidate| find_file(project_dir, candidate))
}

fn find_file(dir: &Path, file_name: &str) -> Option<PathBuf> {
    let mut entries: Vec<_> = match fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(Result::ok).collect(),
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "no se pudo leer el directorio");
            return None;
        }
    };
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        // file_type no sigue symlinks: no se recorre fuera del proyecto
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_file() && entry.file_name() == file_name {
            return Some(entry.path());
        }
        if file_type.is_dir() {
            if let Some(found) = find_file(&entry.path(), file_name) {
                return Some(found);
            }
        }
    }

    None
}

/// Crea el directorio de un proyecto (nombre en minúsculas)
///
/// Si ya existe no hace nada. Retorna la ruta del proyecto.
pub fn create_project(storage_root: &Path, name: &str) -> Result<PathBuf, ProjectError> {
    let name = name.trim().to_lowercase();
    if !is_valid_name(&name) {
        return Err(ProjectError::InvalidName(name));
    }

    let path = storage_root.join(&name);
    if !path.is_dir() {
        fs::create_dir_all(&path)?;
        info!(project = %name, path = %path.display(), "proyecto creado");
    }
    Ok(path)
}

/// Borra un proyecto con todo su contenido
///
/// Retorna `false` si no existía.
pub fn delete_project(storage_root: &Path, name: &str) -> Result<bool, ProjectError> {
    let (name, path) = project_path(storage_root, name)?;

    match fs::symlink_metadata(&path) {
        Ok(metadata) if metadata.is_dir() => {
            fs::remove_dir_all(&path)?;
            info!(project = %name, "proyecto borrado");
            Ok(true)
        }
        Ok(_) => Err(ProjectError::NotFound(name)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Contenido de un directorio del proyecto (`sub_dir` vacío = raíz)
///
/// Carpetas primero, después archivos, cada grupo por nombre.
pub fn list_subdirectories(
    storage_root: &Path,
    project: &str,
    sub_dir: &str,
) -> Result<Vec<ProjectEntry>, ProjectError> {
    let (name, project_dir) = project_path(storage_root, project)?;
    if !project_dir.is_dir() {
        return Err(ProjectError::NotFound(name));
    }
    let dir = contained_dir(&project_dir, sub_dir, false)?;

    let mut entries = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            // Borrado mientras se listaba
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        entries.push(ProjectEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: metadata.is_dir(),
            size: if metadata.is_dir() { 0 } else { metadata.len() },
        });
    }

    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
    Ok(entries)
}

/// Copia un archivo a `<proyecto>/<sub_dir>/`
///
/// Crea el proyecto y el subdirectorio si faltan. El archivo aparece
/// completo o no aparece: se escribe con otro nombre y se renombra al final.
pub fn import_file(
    storage_root: &Path,
    project: &str,
    sub_dir: &str,
    source: &Path,
) -> Result<PathBuf, ProjectError> {
    let file_name = source_name(source)?;
    if !source.is_file() {
        return Err(ProjectError::InvalidSource(source.display().to_string()));
    }

    let project_dir = create_project(storage_root, project)?;
    let dest_dir = contained_dir(&project_dir, sub_dir, true)?;
    let dest = dest_dir.join(&file_name);

    copy_atomic(source, &dest)?;
    info!(source = %source.display(), dest = %dest.display(), "archivo importado");
    Ok(dest)
}

/// Copia una carpeta completa a `<proyecto>/<sub_dir>/<nombre de la carpeta>/`
///
/// Retorna cuántos archivos se copiaron. Los symlinks del origen se ignoran.
pub fn import_dir(
    storage_root: &Path,
    project: &str,
    sub_dir: &str,
    source: &Path,
) -> Result<usize, ProjectError> {
    let folder_name = source_name(source)?;
    if !source.is_dir() {
        return Err(ProjectError::InvalidSource(source.display().to_string()));
    }

    let project_dir = create_project(storage_root, project)?;
    let dest_dir = contained_dir(&project_dir, sub_dir, true)?.join(folder_name);

    let copied = copy_tree(source, &dest_dir)?;
    info!(source = %source.display(), dest = %dest_dir.display(), files = copied, "carpeta importada");
    Ok(copied)
}

fn copy_tree(source: &Path, dest: &Path) -> io::Result<usize> {
    fs::create_dir_all(dest)?;
    let mut copied = 0;

    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let target = dest.join(entry.file_name());

        if file_type.is_dir() {
            copied += copy_tree(&entry.path(), &target)?;
        } else if file_type.is_file() {
            copy_atomic(&entry.path(), &target)?;
            copied += 1;
        } else {
            debug!(path = %entry.path().display(), "entrada ignorada al importar");
        }
    }

    Ok(copied)
}

/// Copia a un archivo temporal junto al destino y lo renombra
fn copy_atomic(source: &Path, dest: &Path) -> io::Result<()> {
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = dest.with_file_name(format!(".{}.part", file_name));

    if let Err(e) = fs::copy(source, &temp).and_then(|_| fs::rename(&temp, dest)) {
        let _ = fs::remove_file(&temp); // Limpiar
        return Err(e);
    }
    Ok(())
}

/// Nombre del proyecto normalizado y su ruta
fn project_path(storage_root: &Path, name: &str) -> Result<(String, PathBuf), ProjectError> {
    let name = name.trim().to_lowercase();
    if !is_valid_name(&name) {
        return Err(ProjectError::InvalidName(name));
    }
    let path = storage_root.join(&name);
    Ok((name, path))
}

/// Resuelve `sub_dir` dentro del proyecto, opcionalmente creándolo
///
/// Rechaza `..`, rutas absolutas y barras invertidas antes de tocar el
/// disco. Después baja componente por componente sin seguir symlinks, así
/// nada se crea ni se escribe fuera del proyecto.
fn contained_dir(project_dir: &Path, sub_dir: &str, create: bool) -> Result<PathBuf, ProjectError> {
    let sub_dir = sub_dir.trim_matches('/');
    if !router::is_contained_lexically(sub_dir) {
        return Err(ProjectError::InvalidPath(sub_dir.to_string()));
    }
    if !is_real_dir(project_dir)? {
        return Err(ProjectError::InvalidPath(project_dir.display().to_string()));
    }

    let mut dir = project_dir.to_path_buf();
    for component in Path::new(sub_dir).components() {
        let Component::Normal(segment) = component else {
            continue;
        };
        dir.push(segment);

        match fs::symlink_metadata(&dir) {
            Ok(_) if is_real_dir(&dir)? => {}
            Ok(_) => return Err(ProjectError::InvalidPath(sub_dir.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound && create => match fs::create_dir(&dir) {
                Ok(()) => {}
                // Otro import lo creó al mismo tiempo
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && is_real_dir(&dir)? => {}
                Err(e) => return Err(e.into()),
            },
            Err(e) => return Err(e.into()),
        }
    }

    Ok(dir)
}

/// `true` si es un directorio y no un symlink
fn is_real_dir(path: &Path) -> io::Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(metadata) => Ok(metadata.file_type().is_dir()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn source_name(source: &Path) -> Result<String, ProjectError> {
    source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| router::is_plain_segment(n))
        .ok_or_else(|| ProjectError::InvalidSource(source.display().to_string()))
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// URL pública de un proyecto
pub fn project_url(host: &str, port: u16, name: &str) -> String {
    format!("http://{}:{}/{}/", host, port, name)
}
