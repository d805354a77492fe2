use clap::Parser;
use std::io;
use std::time::Duration;
use svchttp::{Outcome, RouteFlags, Router, Server, ServerConfig};

#[derive(Parser)]
#[command(
    name = "svc-http-server",
    about = "Standalone HTTP/RTSP server with a few demo routes"
)]
struct Args {
    /// Bind address (host:port)
    #[arg(long, short, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Value of the Server: reply header
    #[arg(long)]
    server_name: Option<String>,

    /// Log raw request lines
    #[arg(long)]
    trace: bool,

    /// Per-socket read timeout in seconds (0 blocks forever)
    #[arg(long, default_value_t = 0)]
    read_timeout: u64,
}

fn demo_routes() -> Router {
    let mut router = Router::new();

    router.register_literal("/hello", |conn, remain| {
        let who = remain.unwrap_or("world").to_string();
        conn.reply_mut()
            .extend_from_slice(format!("<p>Hello, {who}!</p>\n").as_bytes());
        conn.output_html().into()
    });

    router.register_literal("/whoami", |conn, _| {
        let who = conn.representative();
        conn.reply_mut().extend_from_slice(who.as_bytes());
        conn.output_content("text/plain").into()
    });

    router.register_pattern(
        "/echo",
        |conn, _, _| {
            let reply = match conn.json() {
                Some(value) => value.to_string(),
                None => String::from_utf8_lossy(conn.body().unwrap_or_default()).into_owned(),
            };
            conn.reply_mut().extend_from_slice(reply.as_bytes());
            conn.output_content("text/plain").into()
        },
        RouteFlags::NONE,
    );

    router.register_pattern(
        "/old/(.*)",
        |conn, caps, _| {
            let target = format!("/hello/{}", caps[1]);
            conn.redirect(&target, 301).into()
        },
        RouteFlags::NONE,
    );

    router.register_pattern(
        "rtsp://[^/]+/(.*)",
        |conn, _, _| {
            let cseq = conn.header("CSeq").unwrap_or("0").to_string();
            conn.response_headers_mut().set("CSeq", &cseq);
            if conn.method() == svchttp::Method::Options {
                conn.response_headers_mut().set("Public", "DESCRIBE, OPTIONS");
            }
            Outcome::from(conn.output_content("text/plain"))
        },
        RouteFlags::NONE,
    );

    router
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut config = ServerConfig::default();
    if let Some(name) = args.server_name {
        config.server_name = name;
    }
    if args.read_timeout > 0 {
        config.read_timeout = Some(Duration::from_secs(args.read_timeout));
    }
    config.set_trace_requests(args.trace);

    let mut server = Server::with_config(&args.bind, demo_routes(), config);

    if let Err(e) = server.start() {
        eprintln!("Failed to start server: {}", e);
        return;
    }

    println!("Serving on {}, press Enter to stop", args.bind);
    let mut input = String::new();
    let _ = io::stdin().read_line(&mut input);

    let open = server.connections().len();
    tracing::info!(open, "shutting down");
    server.stop();
}
