//! Wire format for HTTP/1.x and RTSP/1.0 requests and replies.
//!
//! Both protocols share the same text framing (RFC 7230 §3, RFC 2326 §4):
//!
//! ```text
//! POST /api/upload?x=1 HTTP/1.1\r\n
//! Content-Type: application/json\r\n
//! Content-Length: 13\r\n
//! \r\n
//! {"ok": true}
//! ```
//!
//! Only the method set and the version token differ. The connection loop
//! reads the command line and header lines itself; this module turns those
//! lines into typed values and renders the outbound status line and header
//! block.
//!
//! ## Accepted tokens
//!
//! | Kind | Values |
//! |------|--------|
//! | HTTP methods | GET, HEAD, POST, PUT, DELETE |
//! | RTSP methods | DESCRIBE, OPTIONS, SETUP, PLAY, TEARDOWN, PAUSE |
//! | Versions | HTTP/1.0, HTTP/1.1, RTSP/1.0 |

pub mod request;
pub mod response;

pub use request::{Credentials, Method, RequestLine, Version, parse_header_line};
pub use response::{ReplyHead, continue_line, error_page, reason_phrase, redirect_page};
