//! # Pocket Host
//! src/lib.rs
//!
//! Servidor HTTP que hospeda varios sitios estáticos en un solo puerto. Cada
//! subdirectorio de la raíz de almacenamiento es un proyecto y se sirve bajo
//! `/<proyecto>/`; ningún request puede leer fuera de su proyecto.
//!
//! ## Arquitectura
//!
//! - `http`: parsing de requests, status, MIME y escritura de respuestas
//! - `router`: resolución segura de `/<proyecto>/<ruta>` a un archivo
//! - `responder`: archivo resuelto → respuesta HTTP
//! - `server`: ciclo de vida, accept loop y manejo de conexiones
//! - `metrics`: sink de métricas por request y estadísticas agregadas
//! - `projects`: listado, creación e íconos de proyectos
//! - `config` / `error`: configuración CLI/entorno y errores de arranque
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use pocket_host::config::ServerConfig;
//! use pocket_host::metrics::RequestStats;
//! use pocket_host::server::Server;
//! use std::sync::Arc;
//!
//! let stats = Arc::new(RequestStats::new());
//! let server = Server::new(stats.clone());
//!
//! server.start(&ServerConfig::new(8080, "./projects")).expect("no se pudo iniciar");
//! // ... atender requests ...
//! server.stop().expect("no se pudo detener");
//! println!("{}", stats.to_json());
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod projects;
pub mod responder;
pub mod router;
pub mod server;
