//! Tests de integración del servidor
//! tests/integration_test.rs
//!
//! Cada test levanta un `Server` real en un puerto efímero de loopback, con
//! una raíz de almacenamiento temporal, y le habla por TCP.

use pocket_host::config::ServerConfig;
use pocket_host::error::StartError;
use pocket_host::metrics::{MetricsSink, RequestStats};
use pocket_host::projects;
use pocket_host::server::{Server, ServerState};
use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant, SystemTime};
use tempfile::TempDir;

/// Sink que guarda cada par de timestamps
#[derive(Default)]
struct Recorder {
    records: Mutex<Vec<(SystemTime, SystemTime)>>,
}

impl MetricsSink for Recorder {
    fn record(&self, start: SystemTime, end: SystemTime) {
        self.records.lock().unwrap().push((start, end));
    }
}

impl Recorder {
    fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

struct Fixture {
    dir: TempDir,
    recorder: Arc<Recorder>,
    server: Server,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join("blog/css")).unwrap();
        fs::write(root.join("blog/index.html"), "<h1>blog</h1>").unwrap();
        fs::write(root.join("blog/css/site.css"), "body{}").unwrap();
        fs::write(root.join("blog/my page.html"), "espacios").unwrap();
        fs::write(root.join("blog/data.unknownext"), "??").unwrap();

        fs::create_dir_all(root.join("shop")).unwrap();
        fs::write(root.join("shop/index.html"), "<h1>shop</h1>").unwrap();

        fs::write(root.join("secret.txt"), "root secret").unwrap();

        let recorder = Arc::new(Recorder::default());
        let server = Server::new(recorder.clone());
        Self {
            dir,
            recorder,
            server,
        }
    }

    fn config(&self) -> ServerConfig {
        ServerConfig::local(0, self.dir.path())
    }

    fn start(self) -> Self {
        self.server.start(&self.config()).unwrap();
        self
    }

    fn addr(&self) -> SocketAddr {
        self.server.local_addr().unwrap()
    }

    fn wait_for_connections(&self, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.server.active_connections() < n {
            assert!(Instant::now() < deadline, "las conexiones nunca llegaron");
            thread::sleep(Duration::from_millis(10));
        }
    }
}

/// Respuesta cruda separada en status, cabecera y body
struct Reply {
    status: u16,
    head: String,
    body: Vec<u8>,
}

fn send_raw(addr: SocketAddr, raw: &[u8]) -> Reply {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    stream.write_all(raw).unwrap();

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).unwrap();
    parse_reply(&buf)
}

fn get(addr: SocketAddr, path: &str) -> Reply {
    send_raw(addr, format!("GET {} HTTP/1.1\r\nHost: test\r\n\r\n", path).as_bytes())
}

fn parse_reply(buf: &[u8]) -> Reply {
    let split = buf
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("respuesta sin fin de cabecera");
    let head = String::from_utf8_lossy(&buf[..split]).into_owned();
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap();

    Reply {
        status,
        head,
        body: buf[split + 4..].to_vec(),
    }
}

#[test]
fn test_serves_each_project() {
    let fx = Fixture::new().start();

    let blog = get(fx.addr(), "/blog/");
    assert_eq!(blog.status, 200);
    assert_eq!(blog.body, b"<h1>blog</h1>");
    assert!(blog.head.contains("Content-Type: text/html; charset=utf-8"));

    let shop = get(fx.addr(), "/shop/index.html");
    assert_eq!(shop.status, 200);
    assert_eq!(shop.body, b"<h1>shop</h1>");

    let css = get(fx.addr(), "/blog/css/site.css");
    assert_eq!(css.status, 200);
    assert!(css.head.contains("Content-Type: text/css"));
    assert!(css.head.contains("Content-Length: 6"));
}

#[test]
fn test_index_equivalence() {
    let fx = Fixture::new().start();

    let with_slash = get(fx.addr(), "/blog/");
    let bare = get(fx.addr(), "/blog");
    let explicit = get(fx.addr(), "/blog/index.html");

    assert_eq!(with_slash.body, explicit.body);
    assert_eq!(bare.body, explicit.body);
}

#[test]
fn test_project_name_is_case_insensitive() {
    let fx = Fixture::new().start();
    let reply = get(fx.addr(), "/BLOG/index.html");
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, b"<h1>blog</h1>");
}

#[test]
fn test_not_found_cases() {
    let fx = Fixture::new().start();

    assert_eq!(get(fx.addr(), "/").status, 404);
    assert_eq!(get(fx.addr(), "/nope/").status, 404);
    assert_eq!(get(fx.addr(), "/blog/missing.html").status, 404);
    // Directorio sin barra final
    assert_eq!(get(fx.addr(), "/blog/css").status, 404);

    let reply = get(fx.addr(), "/nope/");
    let body: serde_json::Value = serde_json::from_slice(&reply.body).unwrap();
    assert!(body["error"].is_string());
}

#[test]
fn test_traversal_never_escapes_project() {
    let fx = Fixture::new().start();

    for path in [
        "/blog/../secret.txt",
        "/blog/../shop/index.html",
        "/blog/%2e%2e/secret.txt",
        "/blog/..%2Fsecret.txt",
        "/blog/css/../../secret.txt",
        "/../secret.txt",
    ] {
        let reply = get(fx.addr(), path);
        assert_eq!(reply.status, 403, "{} devolvió {}", path, reply.status);
        assert!(!String::from_utf8_lossy(&reply.body).contains("root secret"));
        assert_ne!(reply.body, b"<h1>shop</h1>");
    }
}

#[test]
fn test_percent_encoded_and_query() {
    let fx = Fixture::new().start();

    let reply = get(fx.addr(), "/blog/my%20page.html");
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, b"espacios");

    let reply = get(fx.addr(), "/blog/index.html?v=3#top");
    assert_eq!(reply.status, 200);
}

#[test]
fn test_unknown_extension_fallback_type() {
    let fx = Fixture::new().start();
    let reply = get(fx.addr(), "/blog/data.unknownext");
    assert_eq!(reply.status, 200);
    assert!(reply.head.contains("Content-Type: text/plain; charset=utf-8"));
}

#[test]
fn test_head_request() {
    let fx = Fixture::new().start();
    let reply = send_raw(fx.addr(), b"HEAD /blog/ HTTP/1.1\r\n\r\n");

    assert_eq!(reply.status, 200);
    assert!(reply.head.contains("Content-Length: 13"));
    assert!(reply.body.is_empty());
}

#[test]
fn test_malformed_request() {
    let fx = Fixture::new().start();
    let reply = send_raw(fx.addr(), b"NOT A REQUEST\r\n\r\n");
    assert_eq!(reply.status, 400);
}

#[test]
fn test_one_record_per_request() {
    let fx = Fixture::new().start();

    get(fx.addr(), "/blog/");
    get(fx.addr(), "/missing/");
    get(fx.addr(), "/blog/../secret.txt");
    send_raw(fx.addr(), b"garbage\r\n\r\n");

    fx.server.stop().unwrap();
    assert_eq!(fx.recorder.count(), 4);

    for (start, end) in fx.recorder.records.lock().unwrap().iter() {
        assert!(start <= end);
    }
}

#[test]
fn test_concurrent_clients() {
    let fx = Fixture::new().start();
    let addr = fx.addr();

    let handles: Vec<_> = (0..32)
        .map(|i| {
            thread::spawn(move || {
                let (path, expected): (&str, &[u8]) = if i % 2 == 0 {
                    ("/blog/", b"<h1>blog</h1>")
                } else {
                    ("/shop/", b"<h1>shop</h1>")
                };
                let reply = get(addr, path);
                assert_eq!(reply.status, 200);
                assert_eq!(reply.body, expected);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    fx.server.stop().unwrap();
    assert_eq!(fx.recorder.count(), 32);
}

#[test]
fn test_large_file_exact_bytes() {
    let fx = Fixture::new();
    let data: Vec<u8> = (0..3_000_000u32).map(|i| (i % 251) as u8).collect();
    fs::write(fx.dir.path().join("blog/big.bin"), &data).unwrap();
    let fx = fx.start();

    let reply = get(fx.addr(), "/blog/big.bin");
    assert_eq!(reply.status, 200);
    assert!(reply.head.contains("Content-Length: 3000000"));
    assert_eq!(reply.body, data);
}

#[test]
fn test_stop_releases_port_and_refuses_connections() {
    let fx = Fixture::new().start();
    let addr = fx.addr();

    fx.server.stop().unwrap();
    assert_eq!(fx.server.state(), ServerState::Stopped);

    assert!(TcpStream::connect_timeout(&addr, Duration::from_millis(500)).is_err());
    assert!(TcpListener::bind(addr).is_ok());
}

#[test]
fn test_restart_on_same_port() {
    let fx = Fixture::new().start();
    let port = fx.addr().port();
    fx.server.stop().unwrap();

    fx.server
        .start(&ServerConfig::local(port, fx.dir.path()))
        .unwrap();
    assert_eq!(get(fx.addr(), "/shop/").status, 200);
}

#[test]
fn test_start_on_busy_port() {
    let fx = Fixture::new();
    let busy = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = busy.local_addr().unwrap().port();

    let result = fx.server.start(&ServerConfig::local(port, fx.dir.path()));
    assert!(matches!(result, Err(StartError::PortUnavailable { .. })));
    assert_eq!(fx.server.state(), ServerState::Stopped);

    // Un puerto libre sigue funcionando después del fallo
    fx.server.start(&fx.config()).unwrap();
    assert!(fx.server.is_running());
}

#[test]
fn test_in_flight_request_completes_within_grace() {
    let fx = Fixture::new();
    let data = vec![7u8; 24 * 1024 * 1024];
    fs::write(fx.dir.path().join("blog/big.bin"), &data).unwrap();
    let fx = fx.start();
    let addr = fx.addr();

    let client = thread::spawn(move || {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(b"GET /blog/big.bin HTTP/1.1\r\n\r\n").unwrap();
        // Dejar que stop empiece mientras la respuesta está en curso
        thread::sleep(Duration::from_millis(500));
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).unwrap();
        parse_reply(&buf)
    });

    fx.wait_for_connections(1);
    fx.server.stop().unwrap();

    let reply = client.join().unwrap();
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body.len(), data.len());
    assert_eq!(fx.recorder.count(), 1);
}

#[test]
fn test_stalled_client_is_cut_after_grace() {
    let fx = Fixture::new();
    fs::write(fx.dir.path().join("blog/huge.bin"), vec![1u8; 32 * 1024 * 1024]).unwrap();

    let mut config = fx.config();
    config.grace_period_ms = 200;
    config.read_timeout_ms = 30_000;
    fx.server.start(&config).unwrap();

    // Pide un archivo grande y nunca lee: el handler queda bloqueado escribiendo
    let mut stalled = TcpStream::connect(fx.addr()).unwrap();
    stalled.write_all(b"GET /blog/huge.bin HTTP/1.1\r\n\r\n").unwrap();
    fx.wait_for_connections(1);
    thread::sleep(Duration::from_millis(100));

    let started = Instant::now();
    fx.server.stop().unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(fx.server.state(), ServerState::Stopped);
    assert_eq!(fx.server.active_connections(), 0);
    // El request cortado también cuenta
    assert_eq!(fx.recorder.count(), 1);
    drop(stalled);
}

#[test]
fn test_idle_connection_does_not_block_stop() {
    let fx = Fixture::new();
    let mut config = fx.config();
    config.grace_period_ms = 100;
    config.read_timeout_ms = 30_000;
    fx.server.start(&config).unwrap();

    // Conecta y no manda nada
    let _idle = TcpStream::connect(fx.addr()).unwrap();
    fx.wait_for_connections(1);

    let started = Instant::now();
    fx.server.stop().unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    // Sin bytes no hay request ni métrica
    assert_eq!(fx.recorder.count(), 0);
}

#[test]
fn test_request_stats_as_sink() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("site")).unwrap();
    fs::write(dir.path().join("site/index.html"), "hola").unwrap();

    let stats = Arc::new(RequestStats::new());
    let server = Server::new(stats.clone());
    server.start(&ServerConfig::local(0, dir.path())).unwrap();
    stats.mark_started();

    let addr = server.local_addr().unwrap();
    for _ in 0..5 {
        assert_eq!(get(addr, "/site/").status, 200);
    }
    server.stop().unwrap();

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.total_requests, 5);
    assert_eq!(snapshot.samples, 5);
    assert!(snapshot.running);

    stats.mark_stopped();
    assert_eq!(stats.uptime_display(), "00m:00s");
}

#[test]
fn test_request_body_does_not_reset_connection() {
    let fx = Fixture::new().start();
    let body = vec![b'p'; 256 * 1024];

    for _ in 0..20 {
        let mut raw = format!(
            "POST /blog/ HTTP/1.1\r\nHost: test\r\nContent-Length: {}\r\n\r\n",
            body.len()
        )
        .into_bytes();
        raw.extend_from_slice(&body);

        let reply = send_raw(fx.addr(), &raw);
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, b"<h1>blog</h1>");
    }

    fx.server.stop().unwrap();
    assert_eq!(fx.recorder.count(), 20);
}

#[test]
fn test_stop_with_mixed_in_flight_requests() {
    let fx = Fixture::new();
    let data = vec![3u8; 32 * 1024 * 1024];
    fs::write(fx.dir.path().join("blog/big.bin"), &data).unwrap();

    let mut config = fx.config();
    config.grace_period_ms = 3_000;
    config.read_timeout_ms = 30_000;
    fx.server.start(&config).unwrap();
    let addr = fx.addr();

    // Tres clientes que leen completo después de que stop empiece
    let readers: Vec<_> = (0..3)
        .map(|_| {
            thread::spawn(move || {
                let mut stream = TcpStream::connect(addr).unwrap();
                stream.write_all(b"GET /blog/big.bin HTTP/1.1\r\n\r\n").unwrap();
                thread::sleep(Duration::from_millis(300));
                let mut buf = Vec::new();
                stream.read_to_end(&mut buf).unwrap();
                parse_reply(&buf)
            })
        })
        .collect();

    // Dos clientes que nunca leen: se cortan al vencer la gracia
    let stalled: Vec<_> = (0..2)
        .map(|_| {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream.write_all(b"GET /blog/big.bin HTTP/1.1\r\n\r\n").unwrap();
            stream
        })
        .collect();

    fx.wait_for_connections(5);
    fx.server.stop().unwrap();

    for reader in readers {
        let reply = reader.join().unwrap();
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body.len(), data.len());
    }
    assert_eq!(fx.recorder.count(), 5);
    assert!(TcpListener::bind(addr).is_ok());
    drop(stalled);
}

#[test]
fn test_stop_racing_start_leaves_port_free() {
    let dir = TempDir::new().unwrap();

    for _ in 0..20 {
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let server = Arc::new(Server::new(Arc::new(Recorder::default())));

        let starter = {
            let server = Arc::clone(&server);
            let config = ServerConfig::local(port, dir.path());
            thread::spawn(move || {
                let _ = server.start(&config);
            })
        };
        let stopper = {
            let server = Arc::clone(&server);
            thread::spawn(move || server.stop())
        };

        starter.join().unwrap();
        stopper.join().unwrap().unwrap();
        server.stop().unwrap();

        assert_eq!(server.state(), ServerState::Stopped);
        assert!(
            TcpListener::bind(("127.0.0.1", port)).is_ok(),
            "puerto {} quedó tomado",
            port
        );
    }
}

/// GET que tolera respuestas cortadas; retorna solo el status
fn try_status(addr: SocketAddr, path: &str) -> Option<u16> {
    let mut stream = TcpStream::connect(addr).ok()?;
    stream.set_read_timeout(Some(Duration::from_secs(10))).ok()?;
    stream
        .write_all(format!("GET {} HTTP/1.1\r\n\r\n", path).as_bytes())
        .ok()?;

    let mut buf = Vec::new();
    let _ = stream.read_to_end(&mut buf);
    let line = String::from_utf8_lossy(buf.get(..12)?).into_owned();
    line.split_whitespace().nth(1)?.parse().ok()
}

#[test]
fn test_requests_during_import_and_delete() {
    let fx = Fixture::new().start();
    let addr = fx.addr();
    let root = fx.dir.path().to_path_buf();

    let src = TempDir::new().unwrap();
    fs::create_dir(src.path().join("site")).unwrap();
    let page = vec![b'a'; 64 * 1024];
    fs::write(src.path().join("site/index.html"), &page).unwrap();
    let source = src.path().join("site");

    let mutator = thread::spawn(move || {
        for _ in 0..50 {
            projects::import_dir(&root, "live", "", &source).unwrap();
            projects::delete_project(&root, "live").unwrap();
        }
    });

    let clients: Vec<_> = (0..4)
        .map(|_| {
            thread::spawn(move || {
                for _ in 0..50 {
                    let status = try_status(addr, "/live/site/index.html");
                    assert!(
                        matches!(status, Some(200 | 404 | 500)),
                        "status inesperado: {:?}",
                        status
                    );
                }
            })
        })
        .collect();

    mutator.join().unwrap();
    for client in clients {
        client.join().unwrap();
    }

    // El servidor sigue sano
    projects::import_dir(fx.dir.path(), "live", "", &src.path().join("site")).unwrap();
    let reply = get(addr, "/live/site/index.html");
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, page);
    assert_eq!(get(addr, "/blog/").status, 200);
}
