//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración del servidor de proyectos con soporte para argumentos CLI y
//! variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./pocket_host --port 8080 --storage-root ./projects --grace-period-ms 2000
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! POCKET_HOST_PORT=9090 POCKET_HOST_ROOT=/srv/sites ./pocket_host
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Configuración del servidor
///
/// Una instancia no cambia durante la vida de un servidor: `Server::start`
/// guarda su propia copia.
#[derive(Debug, Clone, Parser)]
#[command(name = "pocket_host")]
#[command(about = "Sirve varios proyectos web estáticos en un solo puerto, uno por prefijo de URL")]
#[command(version)]
pub struct ServerConfig {
    /// Puerto en el que escucha el servidor (0 = efímero)
    #[arg(short, long, default_value = "8080", env = "POCKET_HOST_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "0.0.0.0", env = "POCKET_HOST_HOST")]
    pub host: String,

    /// Directorio que contiene un subdirectorio por proyecto
    #[arg(short = 'r', long, default_value = "./projects", env = "POCKET_HOST_ROOT")]
    pub storage_root: PathBuf,

    /// Tiempo que `stop` espera a los requests en curso antes de cortarlos
    #[arg(long = "grace-period-ms", default_value = "2000", env = "POCKET_HOST_GRACE_MS")]
    pub grace_period_ms: u64,

    /// Timeout de lectura/escritura de cada conexión
    #[arg(long = "read-timeout-ms", default_value = "5000", env = "POCKET_HOST_READ_TIMEOUT_MS")]
    pub read_timeout_ms: u64,

    /// Nivel de log cuando `RUST_LOG` no está definido
    #[arg(long = "log-level", default_value = "info")]
    pub log_level: String,

    /// Proyectos a crear (si no existen) antes de arrancar
    #[arg(long = "init-project", value_name = "NAME")]
    pub init_projects: Vec<String>,
}

impl ServerConfig {
    /// Crea una configuración con el puerto y la raíz dados y el resto por defecto
    ///
    /// # Ejemplo
    /// ```rust
    /// use pocket_host::config::ServerConfig;
    ///
    /// let config = ServerConfig::new(3000, "/srv/sites");
    /// assert_eq!(config.address(), "0.0.0.0:3000");
    /// ```
    pub fn new(port: u16, storage_root: impl Into<PathBuf>) -> Self {
        Self {
            port,
            storage_root: storage_root.into(),
            ..Self::default()
        }
    }

    /// Igual que `new` pero escuchando solo en loopback
    pub fn local(port: u16, storage_root: impl Into<PathBuf>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            ..Self::new(port, storage_root)
        }
    }

    /// Obtiene la dirección completa para bind (host:port)
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Valida la configuración
    ///
    /// Retorna errores si hay valores inválidos
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("Host must not be empty".to_string());
        }
        if self.storage_root.as_os_str().is_empty() {
            return Err("Storage root must not be empty".to_string());
        }
        if self.grace_period_ms == 0 {
            return Err("Grace period must be > 0".to_string());
        }
        if self.read_timeout_ms == 0 {
            return Err("Read timeout must be > 0".to_string());
        }
        Ok(())
    }

    /// Registra un resumen de la configuración
    pub fn print_summary(&self) {
        info!(
            address = %self.address(),
            storage_root = %self.storage_root.display(),
            grace_period_ms = self.grace_period_ms,
            read_timeout_ms = self.read_timeout_ms,
            "configuración efectiva"
        );
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
            storage_root: PathBuf::from("./projects"),
            grace_period_ms: 2_000,
            read_timeout_ms: 5_000,
            log_level: "info".to_string(),
            init_projects: Vec::new(),
        }
    }
}
