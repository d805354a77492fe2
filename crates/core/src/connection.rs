//! Per-connection request loop.
//!
//! One [`Connection`] drives a single accepted stream through as many
//! requests as keep-alive allows, strictly one after another:
//!
//! ```text
//! read command -> read headers -> keep-alive policy -> credentials
//!   -> dispatch by method
//!        GET/DELETE/RTSP ........................ resolve
//!        HEAD ...................... (no body) .. resolve
//!        POST/PUT -> [100-continue] -> read body -> parse body -> resolve
//!   -> cleanup -> (next request | close)
//! ```
//!
//! Framing violations (bad command line, missing or oversized
//! `Content-Length`, short body) end the connection without a reply. Other
//! failures are answered with an error page and the loop continues if
//! keep-alive allows.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde_json::Value;

use crate::args::ArgList;
use crate::config::ServerConfig;
use crate::error::Result;
use crate::protocol::{
    Credentials, Method, ReplyHead, RequestLine, Version, continue_line, error_page,
    parse_header_line, redirect_page,
};
use crate::router::{Outcome, Router};
use crate::transport::Transport;
use crate::util::tokenize;

/// Log target for raw request lines when tracing is switched on.
const TRACE_TARGET: &str = "svchttp::trace";

/// Result of one request iteration. `Err` carries the reason the connection
/// must be dropped.
type Step = std::result::Result<(), &'static str>;

/// State of one client connection.
///
/// Handlers receive `&mut Connection` and use it both to inspect the request
/// (path, headers, query arguments, body) and to produce the reply, either by
/// filling [`reply_mut`](Self::reply_mut) and calling one of the `output_*` /
/// [`send_reply`](Self::send_reply) methods, or by writing headers and data
/// directly with [`send_header`](Self::send_header) and
/// [`write_raw`](Self::write_raw).
pub struct Connection<'a> {
    transport: &'a mut dyn Transport,
    config: &'a ServerConfig,
    peer: SocketAddr,
    local: SocketAddr,

    version: Version,
    method: Method,
    path: String,

    headers: ArgList,
    query: ArgList,
    response_headers: ArgList,

    /// Request body plus one trailing NUL.
    body: Option<Vec<u8>>,
    json: Option<Value>,
    content_type: Option<String>,
    credentials: Option<Credentials>,

    reply: Vec<u8>,
    keep_alive: bool,
    no_output: bool,

    requests: u64,
    request_counter: Option<Arc<AtomicU64>>,
    running: Option<Arc<AtomicBool>>,
}

impl<'a> Connection<'a> {
    pub fn new(
        transport: &'a mut dyn Transport,
        config: &'a ServerConfig,
        peer: SocketAddr,
        local: SocketAddr,
    ) -> Self {
        Self {
            transport,
            config,
            peer,
            local,
            version: Version::Http11,
            method: Method::Get,
            path: String::new(),
            headers: ArgList::new(),
            query: ArgList::new(),
            response_headers: ArgList::new(),
            body: None,
            json: None,
            content_type: None,
            credentials: None,
            reply: Vec::new(),
            keep_alive: false,
            no_output: false,
            requests: 0,
            request_counter: None,
            running: None,
        }
    }

    /// Mirror the number of requests served into a shared counter.
    pub fn with_request_counter(mut self, counter: Arc<AtomicU64>) -> Self {
        self.request_counter = Some(counter);
        self
    }

    /// Stop between requests once `running` is cleared.
    pub fn with_shutdown_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = Some(running);
        self
    }

    /// Run the request loop until the peer leaves, keep-alive ends, or a
    /// framing violation occurs. Returns the reason for stopping.
    ///
    /// The transport is left open; closing it is the caller's job.
    pub fn serve(&mut self, router: &Router) -> &'static str {
        loop {
            if self.running.as_ref().is_some_and(|r| !r.load(Ordering::SeqCst)) {
                return "server shutting down";
            }

            let step = self.process_request(router);
            self.cleanup();

            if let Err(reason) = step {
                return reason;
            }
            if !self.keep_alive {
                return "keep-alive not negotiated";
            }
        }
    }

    fn process_request(&mut self, router: &Router) -> Step {
        self.no_output = false;
        let trace = self.config.trace_requests();

        let line = match self.transport.read_line(self.config.max_line_length) {
            Ok(Some(line)) => line,
            Ok(None) => return Err("connection closed by client"),
            Err(e) => {
                tracing::debug!(peer = %self.peer, error = %e, "command read failed");
                return Err("read error");
            }
        };

        if trace {
            tracing::debug!(target: TRACE_TARGET, peer = %self.peer, "{}", line);
        }

        let request = match RequestLine::parse(&line) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(peer = %self.peer, error = %e, "malformed command line");
                return Err("malformed command line");
            }
        };

        self.read_headers(trace)?;

        self.method = request.method;
        self.version = request.version;
        let (path, query) = request.path_and_query();
        self.path = path.to_string();
        if let Some(query) = query {
            self.query.parse_query(query);
        }

        self.keep_alive = self.version.keep_alive(self.headers.get("Connection"));
        self.credentials = self
            .headers
            .get("Authorization")
            .and_then(Credentials::from_authorization);

        self.requests += 1;
        if let Some(counter) = &self.request_counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }

        tracing::debug!(
            peer = %self.peer,
            method = %self.method,
            path = %self.path,
            version = %self.version,
            keep_alive = self.keep_alive,
            "request"
        );

        self.dispatch(router)
    }

    fn read_headers(&mut self, trace: bool) -> Step {
        loop {
            let line = match self.transport.read_line(self.config.max_line_length) {
                Ok(Some(line)) => line,
                Ok(None) => return Err("connection closed in headers"),
                Err(e) => {
                    tracing::debug!(peer = %self.peer, error = %e, "header read failed");
                    return Err("read error");
                }
            };

            if trace {
                tracing::debug!(target: TRACE_TARGET, peer = %self.peer, "{}", line);
            }

            if line.is_empty() {
                return Ok(());
            }

            match parse_header_line(&line) {
                Some((key, value)) => self.headers.set(key, value),
                None => tracing::trace!(peer = %self.peer, line = %line, "skipping header without colon"),
            }
        }
    }

    fn dispatch(&mut self, router: &Router) -> Step {
        if self.method.is_rtsp() != self.version.is_rtsp() {
            tracing::debug!(method = %self.method, version = %self.version, "method not valid for protocol");
            // The body stays unread, so the stream cannot be reused.
            if self.method.has_body() {
                self.keep_alive = false;
            }
            return self.reply_error(400, None);
        }

        match self.method {
            m if m.has_body() => self.process_body(router),
            Method::Head => {
                self.no_output = true;
                self.resolve(router)
            }
            _ => self.resolve(router),
        }
    }

    fn process_body(&mut self, router: &Router) -> Step {
        let Some(declared) = self.headers.get("Content-Length") else {
            tracing::warn!(peer = %self.peer, method = %self.method, "body without Content-Length");
            return Err("missing Content-Length");
        };
        let Ok(len) = declared.trim().parse::<u64>() else {
            tracing::warn!(peer = %self.peer, declared, "unparsable Content-Length");
            return Err("invalid Content-Length");
        };
        if len > self.config.max_body_size {
            tracing::warn!(peer = %self.peer, len, limit = self.config.max_body_size, "request body too large");
            self.keep_alive = false;
            return Err("request body too large");
        }
        let Ok(len) = usize::try_from(len) else {
            return Err("request body too large");
        };

        let expects_continue = self
            .headers
            .get("Expect")
            .is_some_and(|v| v.eq_ignore_ascii_case("100-continue"));

        if expects_continue {
            match router.resolve(self, true) {
                Outcome::SendContinue => {
                    self.send_continue().map_err(|_| "write error")?;
                }
                Outcome::Handled => {}
                Outcome::Disconnect => return Err("handler requested disconnect"),
                Outcome::Error(status) => return self.reply_error(status, None),
            }
        }

        let mut buf = vec![0u8; len + 1];
        if let Err(e) = self.transport.read_exact(&mut buf[..len]) {
            tracing::warn!(peer = %self.peer, len, error = %e, "short request body");
            return Err("short body read");
        }
        self.body = Some(buf);

        let content_type = self
            .headers
            .get("Content-Type")
            .and_then(|v| tokenize(v, 1, Some(';')).first().map(|t| t.to_string()));
        let Some(content_type) = content_type else {
            return self.reply_error(400, Some("Missing Content-Type"));
        };

        if let Some(body) = &self.body {
            let body = &body[..len];
            if content_type.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
                self.query.parse_query(&String::from_utf8_lossy(body));
            } else if content_type.eq_ignore_ascii_case("application/json") {
                match serde_json::from_slice::<Value>(body) {
                    Ok(value) => self.json = Some(value),
                    Err(e) => {
                        tracing::debug!(peer = %self.peer, error = %e, "invalid JSON body");
                        let detail = e.to_string();
                        self.content_type = Some(content_type);
                        return self.reply_error(400, Some(&detail));
                    }
                }
            }
        }

        self.content_type = Some(content_type);
        self.resolve(router)
    }

    fn resolve(&mut self, router: &Router) -> Step {
        match router.resolve(self, false) {
            Outcome::Handled => Ok(()),
            Outcome::Disconnect => Err("handler requested disconnect"),
            Outcome::Error(status) => self.reply_error(status, None),
            Outcome::SendContinue => {
                tracing::error!(path = %self.path, "continue requested outside pre-resolve");
                self.reply_error(500, None)
            }
        }
    }

    fn reply_error(&mut self, status: u16, detail: Option<&str>) -> Step {
        self.err(status, detail).map_err(|_| "write error")
    }

    /// Release everything owned by the request just served.
    fn cleanup(&mut self) {
        self.body = None;
        self.json = None;
        self.content_type = None;
        self.credentials = None;
        self.headers.flush();
        self.query.flush();
        self.response_headers.flush();
        self.reply.clear();
    }

    // ---- response writer ----

    /// Write the status line and header block.
    ///
    /// A zero content length switches keep-alive off for this connection.
    pub fn send_header(&mut self, head: &ReplyHead<'_>) -> Result<()> {
        let text = head.render(
            self.version,
            &mut self.keep_alive,
            &self.response_headers,
            &self.config.server_name,
            &self.config.auth_realm,
        );
        self.transport.write_all(text.as_bytes())
    }

    /// Send the buffered reply body with the given status and metadata.
    ///
    /// The body is skipped (headers still describe it) for `HEAD` requests.
    pub fn send_reply(
        &mut self,
        status: u16,
        content_type: Option<&str>,
        encoding: Option<&str>,
        location: Option<&str>,
        max_age: u32,
    ) -> Result<()> {
        let mut head = ReplyHead::new(status)
            .content_length(self.reply.len() as u64)
            .max_age(max_age);
        head.content_type = content_type;
        head.encoding = encoding;
        head.location = location;

        self.send_header(&head)?;

        if self.no_output || self.reply.is_empty() {
            return Ok(());
        }
        let body = std::mem::take(&mut self.reply);
        let written = self.transport.write_all(&body);
        self.reply = body;
        written
    }

    /// Replace the reply with an HTML error page and send it.
    pub fn err(&mut self, status: u16, detail: Option<&str>) -> Result<()> {
        tracing::debug!(peer = %self.peer, path = %self.path, status, "error reply");
        self.reply.clear();
        self.reply
            .extend_from_slice(error_page(status, detail).as_bytes());
        self.send_reply(status, Some("text/html"), None, None, 0)
    }

    /// [`err`](Self::err) without detail text.
    pub fn error(&mut self, status: u16) -> Result<()> {
        self.err(status, None)
    }

    /// Replace the reply with a link page and send it with `Location` set.
    pub fn redirect(&mut self, location: &str, status: u16) -> Result<()> {
        self.reply.clear();
        self.reply
            .extend_from_slice(redirect_page(location).as_bytes());
        self.send_reply(status, Some("text/html"), None, Some(location), 0)
    }

    /// Emit the interim `100 Continue` status line.
    pub fn send_continue(&mut self) -> Result<()> {
        let line = continue_line(self.version);
        self.transport.write_all(line.as_bytes())
    }

    /// Send the buffered reply as `200 OK` HTML.
    pub fn output_html(&mut self) -> Result<()> {
        self.send_reply(200, Some("text/html; charset=UTF-8"), None, None, 0)
    }

    /// Send the buffered reply as `200 OK` with the given content type.
    pub fn output_content(&mut self, content_type: &str) -> Result<()> {
        self.send_reply(200, Some(content_type), None, None, 0)
    }

    /// Write bytes straight to the transport, after [`send_header`](Self::send_header).
    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.transport.write_all(data)
    }

    // ---- request accessors ----

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Request path with the query string removed.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn set_path(&mut self, path: &str) {
        self.path = path.to_string();
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn headers(&self) -> &ArgList {
        &self.headers
    }

    /// Query arguments, plus form fields from a urlencoded body.
    pub fn query(&self) -> &ArgList {
        &self.query
    }

    pub fn query_arg(&self, name: &str) -> Option<&str> {
        self.query.get(name)
    }

    /// Extra headers appended verbatim to the next reply.
    pub fn response_headers_mut(&mut self) -> &mut ArgList {
        &mut self.response_headers
    }

    /// Raw request body, without the trailing terminator.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref().map(|b| &b[..b.len() - 1])
    }

    /// Body parsed from `application/json`.
    pub fn json(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    /// First `;`-separated token of the request's `Content-Type`.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.username.as_str())
    }

    pub fn password(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.password.as_str())
    }

    /// Who is making the request: the authenticated user, else the peer IP.
    pub fn representative(&self) -> String {
        match self.username() {
            Some(user) => user.to_string(),
            None => self.peer.ip().to_string(),
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn peer_ip(&self) -> IpAddr {
        self.peer.ip()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Reply body under construction.
    pub fn reply_mut(&mut self) -> &mut Vec<u8> {
        &mut self.reply
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Requests processed on this connection so far.
    pub fn requests_served(&self) -> u64 {
        self.requests
    }
}
