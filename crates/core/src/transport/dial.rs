//! Outbound connections.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{DialError, Result};
use crate::transport::TcpTransport;

/// Open a TCP connection to `host:port`, giving up after `timeout`.
///
/// `"localhost"` always means the IPv4 loopback. Any other name is resolved
/// and the first address returned is used, whatever its family.
///
/// ```no_run
/// use std::time::Duration;
/// use svchttp::transport::dial::dial;
///
/// let transport = dial("example.com", 80, Duration::from_secs(5))?;
/// # Ok::<(), svchttp::HttpError>(())
/// ```
pub fn dial(host: &str, port: u16, timeout: Duration) -> Result<TcpTransport> {
    let addr = resolve(host, port)?;

    tracing::debug!(host, %addr, ?timeout, "dialing");

    let stream = TcpStream::connect_timeout(&addr, timeout).map_err(|e| match e.kind() {
        io::ErrorKind::TimedOut => DialError::TimedOut(addr.to_string()),
        _ => DialError::Connect(e),
    })?;
    stream.set_nodelay(true)?;

    TcpTransport::new(stream)
}

fn resolve(host: &str, port: u16) -> std::result::Result<SocketAddr, DialError> {
    if host.eq_ignore_ascii_case("localhost") {
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port));
    }

    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|_| DialError::HostNotFound(host.to_string()))?;
    addrs
        .next()
        .ok_or_else(|| DialError::NoAddress(host.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;
    use crate::transport::Transport;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn localhost_is_ipv4_loopback() {
        let addr = resolve("localhost", 8080).unwrap();
        assert_eq!(addr, "127.0.0.1:8080".parse().unwrap());
    }

    #[test]
    fn literal_addresses_resolve_in_their_family() {
        assert!(resolve("127.0.0.1", 1).unwrap().is_ipv4());
        assert!(resolve("::1", 1).unwrap().is_ipv6());
    }

    #[test]
    fn dial_connects_and_talks() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"greeting\r\n").unwrap();
        });

        let mut transport = dial("localhost", port, Duration::from_secs(2)).unwrap();
        assert!(transport.stream().nodelay().unwrap());
        assert_eq!(transport.read_line(64).unwrap().as_deref(), Some("greeting"));
        server.join().unwrap();
    }

    #[test]
    fn refused_connect_is_a_dial_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = dial("127.0.0.1", port, Duration::from_secs(2)).err().unwrap();
        assert!(matches!(err, HttpError::Dial(_)));
    }
}
