use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;

use parking_lot::RwLock;

use crate::config::ServerConfig;
use crate::error::{HttpError, Result};
use crate::router::Router;
use crate::transport::tcp;

/// Listening front end: binds, accepts, and hands each socket to its own
/// connection thread running the request loop against a shared [`Router`].
///
/// ```no_run
/// use svchttp::{Router, Server};
///
/// let mut router = Router::new();
/// router.register_literal("/ping", |conn, _| {
///     conn.reply_mut().extend_from_slice(b"pong");
///     conn.output_content("text/plain").into()
/// });
///
/// let mut server = Server::new("0.0.0.0:8080", router);
/// server.start()?;
/// # server.stop();
/// # Ok::<(), svchttp::HttpError>(())
/// ```
pub struct Server {
    bind_addr: String,
    local_addr: Option<SocketAddr>,
    router: Arc<Router>,
    config: Arc<ServerConfig>,
    tracker: ConnectionTracker,
    running: Arc<AtomicBool>,
}

impl Server {
    pub fn new(bind_addr: &str, router: Router) -> Self {
        Self::with_config(bind_addr, router, ServerConfig::default())
    }

    pub fn with_config(bind_addr: &str, router: Router, config: ServerConfig) -> Self {
        Self {
            bind_addr: bind_addr.to_string(),
            local_addr: None,
            router: Arc::new(router),
            config: Arc::new(config),
            tracker: ConnectionTracker::default(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(HttpError::AlreadyRunning);
        }

        let listener = TcpListener::bind(&self.bind_addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        self.running.store(true, Ordering::SeqCst);

        let router = self.router.clone();
        let config = self.config.clone();
        let tracker = self.tracker.clone();
        let running = self.running.clone();

        tracing::info!(
            addr = %local_addr,
            literal_routes = router.literal_count(),
            pattern_routes = router.pattern_count(),
            "server listening"
        );

        thread::spawn(move || {
            tcp::accept_loop(listener, router, config, tracker, running);
        });

        Ok(())
    }

    /// Stop accepting. Open connections finish their current request.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("server stopping");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Address actually bound, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Shared settings. The trace toggle may be flipped while running.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Snapshot of currently open connections, oldest first.
    pub fn connections(&self) -> Vec<ClientInfo> {
        self.tracker.snapshot()
    }
}

/// Information about an open client connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub id: u64,
    pub peer_addr: SocketAddr,
    pub local_addr: SocketAddr,
    pub requests: u64,
}

struct Tracked {
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
    requests: Arc<AtomicU64>,
}

/// Registry of live connections shared between the server and its
/// connection threads.
#[derive(Clone, Default)]
pub(crate) struct ConnectionTracker {
    entries: Arc<RwLock<HashMap<u64, Tracked>>>,
    next_id: Arc<AtomicU64>,
}

impl ConnectionTracker {
    /// Record a new connection. Returns its id and the counter the
    /// connection should bump per request.
    pub(crate) fn register(&self, peer_addr: SocketAddr, local_addr: SocketAddr) -> (u64, Arc<AtomicU64>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let requests = Arc::new(AtomicU64::new(0));
        self.entries.write().insert(
            id,
            Tracked {
                peer_addr,
                local_addr,
                requests: requests.clone(),
            },
        );
        (id, requests)
    }

    pub(crate) fn remove(&self, id: u64) {
        self.entries.write().remove(&id);
    }

    pub(crate) fn snapshot(&self) -> Vec<ClientInfo> {
        let mut list: Vec<ClientInfo> = self
            .entries
            .read()
            .iter()
            .map(|(&id, t)| ClientInfo {
                id,
                peer_addr: t.peer_addr,
                local_addr: t.local_addr,
                requests: t.requests.load(Ordering::Relaxed),
            })
            .collect();
        list.sort_by_key(|c| c.id);
        list
    }
}
