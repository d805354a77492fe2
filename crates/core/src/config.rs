use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Server identification string sent in the `Server:` header of every reply.
pub const SERVER_AGENT: &str = "svc-http/0.1";

/// Largest request body accepted before the connection is dropped (1 GiB).
pub const DEFAULT_MAX_BODY_SIZE: u64 = 1024 * 1024 * 1024;

/// Bound on a single command or header line, terminator excluded.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024;

/// Server-level settings read by the connection loop and response writer.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Value of the `Server:` reply header.
    pub server_name: String,
    /// Realm advertised in `WWW-Authenticate` on 401 replies.
    pub auth_realm: String,
    /// Longest command or header line accepted.
    pub max_line_length: usize,
    /// Largest `Content-Length` accepted on POST/PUT.
    pub max_body_size: u64,
    /// Applied to accepted sockets. `None` blocks indefinitely.
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    /// Raw request-line logging. Shared, so flipping it on one clone
    /// affects every connection on its next request.
    trace_requests: Arc<AtomicBool>,
}

impl ServerConfig {
    /// Whether raw command and header lines should be logged.
    pub fn trace_requests(&self) -> bool {
        self.trace_requests.load(Ordering::Relaxed)
    }

    /// Toggle raw request logging at runtime.
    pub fn set_trace_requests(&self, enabled: bool) {
        self.trace_requests.store(enabled, Ordering::Relaxed);
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_name: SERVER_AGENT.to_string(),
            auth_realm: "svc-http".to_string(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            read_timeout: None,
            write_timeout: None,
            trace_requests: Arc::new(AtomicBool::new(false)),
        }
    }
}
