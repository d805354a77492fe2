use std::io::{BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::Result;
use crate::router::Router;
use crate::server::ConnectionTracker;
use crate::transport::{Transport, read_bounded_line};

/// [`Transport`] over a connected TCP socket.
///
/// Reads go through a buffered clone of the stream, writes go straight to
/// the stream itself.
pub struct TcpTransport {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Result<Self> {
        let reader = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(reader),
            writer: stream,
        })
    }

    /// Apply socket timeouts. `None` means block indefinitely.
    pub fn set_timeouts(&self, read: Option<Duration>, write: Option<Duration>) -> Result<()> {
        self.writer.set_read_timeout(read)?;
        self.writer.set_write_timeout(write)?;
        Ok(())
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.writer.peer_addr()?)
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.writer.local_addr()?)
    }

    /// The underlying socket.
    pub fn stream(&self) -> &TcpStream {
        &self.writer
    }
}

impl Transport for TcpTransport {
    fn read_line(&mut self, max: usize) -> Result<Option<String>> {
        read_bounded_line(&mut self.reader, max)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        Read::read_exact(&mut self.reader, buf)?;
        Ok(())
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        Write::write_all(&mut self.writer, data)?;
        self.writer.flush()?;
        Ok(())
    }

    fn close(&mut self) {
        let _ = self.writer.flush();
        let _ = self.writer.shutdown(Shutdown::Both);
    }
}

/// Non-blocking TCP accept loop.
///
/// Checks the `running` flag between accepts with a 50ms poll interval
/// so that [`crate::server::Server::stop`] can terminate it promptly.
pub(crate) fn accept_loop(
    listener: TcpListener,
    router: Arc<Router>,
    config: Arc<ServerConfig>,
    tracker: ConnectionTracker,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                let router = router.clone();
                let config = config.clone();
                let tracker = tracker.clone();
                let running = running.clone();
                thread::spawn(move || {
                    handle(stream, &router, &config, &tracker, running);
                });
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            }
        }
    }
    tracing::debug!("accept loop exited");
}

/// Entry point for one accepted socket: run its request loop, then close.
fn handle(
    stream: TcpStream,
    router: &Router,
    config: &ServerConfig,
    tracker: &ConnectionTracker,
    running: Arc<AtomicBool>,
) {
    let (peer_addr, local_addr) = match (stream.peer_addr(), stream.local_addr()) {
        (Ok(peer), Ok(local)) => (peer, local),
        _ => return,
    };

    tracing::info!(%peer_addr, "client connected");

    let mut transport = match TcpTransport::new(stream) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(%peer_addr, error = %e, "failed to set up connection");
            return;
        }
    };
    if let Err(e) = transport.set_timeouts(config.read_timeout, config.write_timeout) {
        tracing::warn!(%peer_addr, error = %e, "failed to apply socket timeouts");
    }

    let (id, requests) = tracker.register(peer_addr, local_addr);

    let reason = Connection::new(&mut transport, config, peer_addr, local_addr)
        .with_request_counter(requests)
        .with_shutdown_flag(running)
        .serve(router);

    transport.close();
    tracker.remove(id);

    tracing::info!(%peer_addr, reason, "client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};

    #[test]
    fn tcp_transport_reads_lines_and_writes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let client = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream.write_all(b"hello\r\nbody").unwrap();
            let mut reply = String::new();
            BufReader::new(stream).read_line(&mut reply).unwrap();
            reply
        });

        let (stream, _) = listener.accept().unwrap();
        let mut transport = TcpTransport::new(stream).unwrap();
        assert_eq!(transport.read_line(64).unwrap().as_deref(), Some("hello"));
        let mut body = [0u8; 4];
        Transport::read_exact(&mut transport, &mut body).unwrap();
        assert_eq!(&body, b"body");
        Transport::write_all(&mut transport, b"ok\r\n").unwrap();
        transport.close();

        assert_eq!(client.join().unwrap(), "ok\r\n");
    }
}
