//! # Pocket Host - Entry Point
//! src/main.rs
//!
//! Arranca el servidor con la configuración de CLI/entorno y lo detiene al
//! presionar Enter (o al cerrarse stdin).

use clap::Parser;
use pocket_host::config::ServerConfig;
use pocket_host::metrics::RequestStats;
use pocket_host::projects;
use pocket_host::server::Server;
use std::io::{self, BufRead};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    let config = ServerConfig::parse();

    // RUST_LOG tiene prioridad sobre --log-level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=================================");
    info!("  Pocket Host {}", env!("CARGO_PKG_VERSION"));
    info!("=================================");
    config.print_summary();

    for name in &config.init_projects {
        if let Err(e) = projects::create_project(&config.storage_root, name) {
            warn!(project = %name, error = %e, "no se pudo crear el proyecto");
        }
    }

    let stats = Arc::new(RequestStats::new());
    let server = Server::new(stats.clone());

    if let Err(e) = server.start(&config) {
        error!(error = %e, "error fatal al iniciar");
        std::process::exit(1);
    }
    stats.mark_started();

    let port = server.local_addr().map(|a| a.port()).unwrap_or(config.port);
    match projects::list_projects(&config.storage_root) {
        Ok(list) if list.is_empty() => warn!("no hay proyectos en la raíz de almacenamiento"),
        Ok(list) => {
            for project in list {
                info!(
                    project = %project.name,
                    url = %projects::project_url(&config.host, port, &project.name),
                    favicon = project.favicon.is_some(),
                    "proyecto disponible"
                );
            }
        }
        Err(e) => warn!(error = %e, "no se pudieron listar los proyectos"),
    }

    info!("presione Enter para detener el servidor");
    let mut line = String::new();
    if let Err(e) = io::stdin().lock().read_line(&mut line) {
        warn!(error = %e, "error leyendo stdin, deteniendo");
    }

    if let Err(e) = server.stop() {
        error!(error = %e, "el servidor no se detuvo limpiamente");
    }

    info!(uptime = %stats.uptime_display(), total_requests = stats.total_requests(), "resumen final");
    info!("{}", stats.to_json());
    stats.mark_stopped();
}
