//! Integration tests: a real server on fixed loopback ports, driven with raw
//! HTTP and RTSP over TCP.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use svchttp::{Outcome, RouteFlags, Router, Server};

fn request(stream: &mut TcpStream, request: &str) -> std::io::Result<String> {
    stream.write_all(request.as_bytes())?;
    stream.flush()?;
    read_response(stream)
}

fn read_response(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut reader = BufReader::new(stream);
    let mut response = String::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        response.push_str(&line);
        if line == "\r\n" || line == "\n" {
            break;
        }
    }

    // Parse Content-Length and read body if present
    if let Some(len) = response
        .lines()
        .find(|l| l.to_lowercase().starts_with("content-length:"))
        .and_then(|l| l.split(':').nth(1))
        .and_then(|v| v.trim().parse::<usize>().ok())
    {
        if len > 0 {
            let mut body = vec![0u8; len];
            reader.read_exact(&mut body)?;
            response.push_str(&String::from_utf8_lossy(&body));
        }
    }

    Ok(response)
}

fn connect(bind: &str) -> TcpStream {
    let addr = bind.to_socket_addrs().unwrap().next().unwrap();
    let stream = TcpStream::connect_timeout(&addr, Duration::from_secs(2)).expect("connect to server");
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    stream.set_write_timeout(Some(Duration::from_secs(2))).unwrap();
    stream
}

fn demo_router() -> Router {
    let mut router = Router::new();

    router.register_literal("/hello", |conn, remain| {
        let who = remain.unwrap_or("world").to_string();
        conn.reply_mut().extend_from_slice(format!("hello {who}").as_bytes());
        conn.output_content("text/plain").into()
    });

    router.register_pattern(
        "/items/([0-9]+)",
        |conn, caps, _| {
            let body = format!("item {}", caps[1]);
            conn.reply_mut().extend_from_slice(body.as_bytes());
            conn.output_content("text/plain").into()
        },
        RouteFlags::NONE,
    );

    router.register_pattern(
        "/echo",
        |conn, _, _| {
            let body = conn.body().unwrap_or_default().to_vec();
            conn.reply_mut().extend_from_slice(&body);
            conn.output_content("application/octet-stream").into()
        },
        RouteFlags::NONE,
    );

    router.register_pattern(
        "/private",
        |conn, _, _| {
            if conn.username() != Some("alice") {
                return Outcome::Error(401);
            }
            conn.reply_mut().extend_from_slice(b"welcome");
            conn.output_html().into()
        },
        RouteFlags::NONE,
    );

    router.register_pattern(
        "rtsp://[^/]+/(.+)",
        |conn, caps, _| {
            let cseq = conn.header("CSeq").unwrap_or("0").to_string();
            conn.response_headers_mut().set("CSeq", &cseq);
            conn.reply_mut().extend_from_slice(caps[1].as_bytes());
            conn.output_content("text/plain").into()
        },
        RouteFlags::NONE,
    );

    router
}

#[test]
fn keep_alive_serves_several_requests_on_one_socket() {
    const BIND: &str = "127.0.0.1:18081";
    let mut server = Server::new(BIND, demo_router());
    server.start().expect("server start");

    let mut stream = connect(BIND);

    let resp = request(&mut stream, "GET /hello HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
    assert!(resp.starts_with("HTTP/1.1 200 OK\r\n"), "got: {resp}");
    assert!(resp.contains("Connection: Keep-Alive\r\n"));
    assert!(resp.ends_with("hello world"));

    let resp = request(&mut stream, "GET /hello/bob HTTP/1.1\r\n\r\n").unwrap();
    assert!(resp.ends_with("hello bob"));

    let resp = request(&mut stream, "GET /items/42 HTTP/1.1\r\n\r\n").unwrap();
    assert!(resp.ends_with("item 42"));

    assert_eq!(server.connections().len(), 1);
    assert_eq!(server.connections()[0].requests, 3);

    let resp = request(&mut stream, "GET /missing HTTP/1.1\r\nConnection: close\r\n\r\n").unwrap();
    assert!(resp.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(resp.contains("Connection: Close\r\n"));

    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).unwrap();
    assert!(rest.is_empty());

    server.stop();
}

#[test]
fn post_body_and_expect_continue() {
    const BIND: &str = "127.0.0.1:18082";
    let mut server = Server::new(BIND, demo_router());
    server.start().expect("server start");

    let mut stream = connect(BIND);

    let resp = request(
        &mut stream,
        "POST /echo HTTP/1.1\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nabcde",
    )
    .unwrap();
    assert!(resp.ends_with("abcde"), "got: {resp}");

    let interim = request(
        &mut stream,
        "PUT /echo HTTP/1.1\r\nExpect: 100-continue\r\nContent-Type: text/plain\r\n\
         Content-Length: 3\r\n\r\n",
    )
    .unwrap();
    assert_eq!(interim, "HTTP/1.1 100 Continue\r\n\r\n");

    let resp = request(&mut stream, "xyz").unwrap();
    assert!(resp.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(resp.ends_with("xyz"));

    server.stop();
}

#[test]
fn basic_auth_challenge_and_success() {
    const BIND: &str = "127.0.0.1:18083";
    let mut server = Server::new(BIND, demo_router());
    server.start().expect("server start");

    let mut stream = connect(BIND);
    let resp = request(&mut stream, "GET /private HTTP/1.1\r\n\r\n").unwrap();
    assert!(resp.starts_with("HTTP/1.1 401 Unauthorized\r\n"));
    assert!(resp.contains("WWW-Authenticate: Basic realm=\"svc-http\"\r\n"));

    let resp = request(
        &mut stream,
        "GET /private HTTP/1.1\r\nAuthorization: Basic YWxpY2U6c2VjcmV0\r\n\r\n",
    )
    .unwrap();
    assert!(resp.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(resp.contains("Content-Type: text/html; charset=UTF-8\r\n"));
    assert!(resp.ends_with("welcome"));

    server.stop();
}

#[test]
fn rtsp_requests_share_the_router() {
    const BIND: &str = "127.0.0.1:18084";
    let mut server = Server::new(BIND, demo_router());
    server.start().expect("server start");

    let mut stream = connect(BIND);
    for cseq in 1..=2 {
        let req = format!("OPTIONS rtsp://127.0.0.1:18084/stream RTSP/1.0\r\nCSeq: {cseq}\r\n\r\n");
        let resp = request(&mut stream, &req).unwrap();
        assert!(resp.starts_with("RTSP/1.0 200 OK\r\n"), "got: {resp}");
        assert!(resp.contains(&format!("CSeq: {cseq}\r\n")));
        assert!(resp.ends_with("stream"));
    }

    server.stop();
}

#[test]
fn malformed_request_closes_without_reply() {
    const BIND: &str = "127.0.0.1:18085";
    let mut server = Server::new(BIND, demo_router());
    server.start().expect("server start");

    let mut stream = connect(BIND);
    stream.write_all(b"NONSENSE\r\n\r\n").unwrap();
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).unwrap();
    assert!(rest.is_empty());

    server.stop();
}

#[test]
fn concurrent_clients_are_served_independently() {
    const BIND: &str = "127.0.0.1:18086";
    let mut server = Server::new(BIND, demo_router());
    server.start().expect("server start");

    let results = Arc::new(Mutex::new(Vec::new()));
    let clients: Vec<_> = (0..4)
        .map(|i| {
            let results = results.clone();
            thread::spawn(move || {
                let mut stream = connect(BIND);
                let resp = request(&mut stream, &format!("GET /items/{i} HTTP/1.0\r\n\r\n")).unwrap();
                results.lock().push(resp.ends_with(&format!("item {i}")));
            })
        })
        .collect();
    for client in clients {
        client.join().unwrap();
    }

    assert_eq!(*results.lock(), vec![true; 4]);
    server.stop();
}
