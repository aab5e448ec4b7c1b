//! # Ciclo de Vida del Servidor
//! src/server/lifecycle.rs
//!
//! El `Server` es dueño del socket de escucha, del thread del accept loop y
//! del registro de conexiones. Sus estados:
//!
//! ```text
//! Stopped → Starting → Running → Stopping → Stopped
//! ```
//!
//! `start` y `stop` se serializan con un mutex de control: nunca hay dos
//! transiciones a la vez, y un `stop` concurrente con un `start` en curso
//! espera a que este termine antes de liberar el puerto. `state()` sí puede
//! verse en `Starting` o `Stopping` desde otro thread; las consultas
//! (`local_addr`, `config`, `active_connections`) usan su propio lock y no
//! esperan a que termine la transición.

use super::connection::{handle_connection, ConnectionContext};
use super::probe;
use super::tracker::ConnectionTracker;
use crate::config::ServerConfig;
use crate::error::{ServerError, StartError, StartResult};
use crate::metrics::MetricsSink;
use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Cuánto espera `stop` al conectar al propio listener para despertarlo
const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Estado del servidor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServerState::Stopped => "stopped",
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Servidor de proyectos estáticos
///
/// # Ejemplo
/// ```no_run
/// use pocket_host::config::ServerConfig;
/// use pocket_host::metrics::RequestStats;
/// use pocket_host::server::Server;
/// use std::sync::Arc;
///
/// let stats = Arc::new(RequestStats::new());
/// let server = Server::new(stats.clone());
///
/// server.start(&ServerConfig::new(8080, "./projects")).unwrap();
/// // ...
/// server.stop().unwrap();
/// ```
pub struct Server {
    sink: Arc<dyn MetricsSink>,
    state: Mutex<ServerState>,

    /// Serializa `start` y `stop`; se mantiene durante toda la transición
    control: Mutex<Option<RunningServer>>,

    /// Lo que se puede consultar sin esperar a una transición en curso
    listening: Mutex<Option<Listening>>,
}

/// Datos públicos de la instancia activa
#[derive(Clone)]
struct Listening {
    config: ServerConfig,
    local_addr: SocketAddr,
    tracker: Arc<ConnectionTracker>,
}

/// Recursos de una instancia en `Running`
struct RunningServer {
    listening: Listening,
    shutdown: Arc<AtomicBool>,
    accept_thread: JoinHandle<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Server {
    /// Crea un servidor detenido que reportará cada request a `sink`
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            sink,
            state: Mutex::new(ServerState::Stopped),
            control: Mutex::new(None),
            listening: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ServerState {
        *lock(&self.state)
    }

    pub fn is_running(&self) -> bool {
        self.state() == ServerState::Running
    }

    fn set_state(&self, next: ServerState) {
        let mut state = lock(&self.state);
        let previous = *state;
        debug!(from = %previous, to = %next, "transición de estado");
        *state = next;
    }

    /// Dirección real del listener (útil con puerto 0)
    ///
    /// Sigue disponible mientras `stop` espera a las conexiones.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        lock(&self.listening).as_ref().map(|l| l.local_addr)
    }

    /// Configuración con la que está corriendo
    pub fn config(&self) -> Option<ServerConfig> {
        lock(&self.listening).as_ref().map(|l| l.config.clone())
    }

    /// Conexiones que se están atendiendo ahora mismo
    pub fn active_connections(&self) -> usize {
        lock(&self.listening)
            .as_ref()
            .map(|l| l.tracker.active())
            .unwrap_or(0)
    }

    /// Arranca el servidor
    ///
    /// Solo tiene efecto desde `Stopped`; en cualquier otro estado retorna
    /// el estado actual sin volver a hacer bind. Si falla, el servidor queda
    /// en `Stopped` y nada queda abierto.
    pub fn start(&self, config: &ServerConfig) -> StartResult<ServerState> {
        let mut control = lock(&self.control);

        let current = self.state();
        if current != ServerState::Stopped {
            info!(state = %current, "start ignorado: el servidor no está detenido");
            return Ok(current);
        }

        config.validate().map_err(StartError::InvalidConfig)?;

        self.set_state(ServerState::Starting);
        info!(address = %config.address(), "iniciando servidor");

        match self.launch(config) {
            Ok(running) => {
                info!(
                    address = %running.listening.local_addr,
                    storage_root = %config.storage_root.display(),
                    "servidor escuchando (un thread por conexión)"
                );
                *lock(&self.listening) = Some(running.listening.clone());
                *control = Some(running);
                self.set_state(ServerState::Running);
                Ok(ServerState::Running)
            }
            Err(e) => {
                warn!(error = %e, "no se pudo iniciar el servidor");
                self.set_state(ServerState::Stopped);
                Err(e)
            }
        }
    }

    fn launch(&self, config: &ServerConfig) -> StartResult<RunningServer> {
        fs::create_dir_all(&config.storage_root)?;

        let address = config.address();
        if !probe::is_available(&config.host, config.port) {
            return Err(StartError::PortUnavailable {
                address,
                source: io::Error::new(io::ErrorKind::AddrInUse, "port probe failed"),
            });
        }

        // Otro proceso puede haber tomado el puerto después del sondeo
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .map_err(|e| StartError::from_bind(&address, e))?;
        let local_addr = listener.local_addr()?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let tracker = Arc::new(ConnectionTracker::new());
        let ctx = Arc::new(ConnectionContext {
            storage_root: config.storage_root.clone(),
            sink: Arc::clone(&self.sink),
            io_timeout: config.read_timeout(),
        });

        let accept_thread = {
            let shutdown = Arc::clone(&shutdown);
            let tracker = Arc::clone(&tracker);
            thread::Builder::new()
                .name("pocket-host-accept".to_string())
                .spawn(move || accept_loop(listener, shutdown, tracker, ctx))?
        };

        Ok(RunningServer {
            listening: Listening {
                config: config.clone(),
                local_addr,
                tracker,
            },
            shutdown,
            accept_thread,
        })
    }

    /// Detiene el servidor
    ///
    /// Sin efecto salvo en `Running`. Cierra el listener, espera a los
    /// requests en curso hasta el período de gracia y corta los que sigan
    /// vivos. Al retornar el puerto ya está libre.
    pub fn stop(&self) -> Result<(), ServerError> {
        let mut control = lock(&self.control);

        if self.state() != ServerState::Running {
            return Ok(());
        }
        let running = match control.take() {
            Some(running) => running,
            None => {
                self.set_state(ServerState::Stopped);
                return Ok(());
            }
        };

        let RunningServer {
            listening,
            shutdown,
            accept_thread,
        } = running;

        self.set_state(ServerState::Stopping);
        info!(address = %listening.local_addr, "deteniendo servidor");

        shutdown.store(true, Ordering::SeqCst);
        wake_listener(listening.local_addr);

        // El listener se cierra cuando el accept loop termina
        let joined = accept_thread.join();

        let tracker = &listening.tracker;
        let grace = listening.config.grace_period();
        if !tracker.wait_idle(grace) {
            let cut = tracker.shutdown_all();
            warn!(
                connections = cut,
                grace_ms = grace.as_millis() as u64,
                "período de gracia vencido, cortando conexiones"
            );
            if !tracker.wait_idle(grace) {
                error!(
                    remaining = tracker.active(),
                    "conexiones que no terminaron tras el corte"
                );
            }
        }

        *lock(&self.listening) = None;
        self.set_state(ServerState::Stopped);

        match joined {
            Ok(()) => {
                info!("servidor detenido");
                Ok(())
            }
            Err(_) => Err(ServerError::Shutdown(
                "accept thread panicked".to_string(),
            )),
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!(error = %e, "error al detener el servidor en drop");
        }
    }
}

/// Acepta conexiones hasta que se pida el cierre
fn accept_loop(
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
    tracker: Arc<ConnectionTracker>,
    ctx: Arc<ConnectionContext>,
) {
    for stream in listener.incoming() {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        match stream {
            Ok(stream) => {
                let guard = tracker.register(&stream);
                let ctx = Arc::clone(&ctx);

                let spawned = thread::Builder::new()
                    .name("pocket-host-conn".to_string())
                    .spawn(move || {
                        let _guard = guard;
                        handle_connection(stream, &ctx);
                    });

                if let Err(e) = spawned {
                    error!(error = %e, "no se pudo crear el thread de la conexión");
                }
            }
            Err(e) => {
                warn!(error = %e, "error al aceptar conexión");
                // Evita girar en vacío si el error persiste (p. ej. EMFILE)
                thread::sleep(Duration::from_millis(10));
            }
        }
    }

    debug!("accept loop terminado, cerrando listener");
}

/// Conecta al propio listener para que `accept` retorne y vea el flag
fn wake_listener(addr: SocketAddr) {
    let target = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => (Ipv4Addr::LOCALHOST, addr.port()).into(),
        IpAddr::V6(ip) if ip.is_unspecified() => (Ipv6Addr::LOCALHOST, addr.port()).into(),
        _ => addr,
    };

    if let Err(e) = TcpStream::connect_timeout(&target, WAKE_TIMEOUT) {
        error!(address = %target, error = %e, "no se pudo despertar al accept loop");
    }
}
