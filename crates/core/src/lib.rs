//! Embeddable HTTP/1.x and RTSP/1.0 request router.
//!
//! Register handlers on a [`Router`], hand it to a [`Server`], and every
//! accepted connection runs the request loop in [`Connection`] on its own
//! thread.

pub mod args;
pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod router;
pub mod server;
pub mod transport;
pub mod util;

pub use args::ArgList;
pub use config::ServerConfig;
pub use connection::Connection;
pub use error::{DialError, HttpError, Result};
pub use protocol::{Method, Version};
pub use router::{Outcome, RouteFlags, Router};
pub use server::{ClientInfo, Server};
