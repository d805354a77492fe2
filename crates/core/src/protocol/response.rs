use std::fmt::Write as _;
use std::time::{Duration, SystemTime};

use crate::args::ArgList;
use crate::protocol::Version;

/// Reason phrase for a status code.
///
/// Codes outside the table render as `"Unknown Status"`, never as an error.
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        411 => "Length Required",
        413 => "Payload Too Large",
        415 => "Unsupported Media Type",
        454 => "Session Not Found",
        461 => "Unsupported Transport",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        _ => "Unknown Status",
    }
}

/// Everything the status line and header block of a reply may carry.
///
/// Built with chained setters and rendered by [`render`](Self::render):
///
/// ```
/// use svchttp::protocol::{ReplyHead, Version};
/// use svchttp::ArgList;
///
/// let mut keep_alive = true;
/// let head = ReplyHead::new(200).content_type("text/plain").content_length(5);
/// let text = head.render(Version::Http11, &mut keep_alive, &ArgList::new(), "svc", "realm");
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Connection: Keep-Alive\r\n"));
/// ```
#[must_use]
#[derive(Debug, Clone, Default)]
pub struct ReplyHead<'a> {
    pub status: u16,
    pub content_type: Option<&'a str>,
    /// Body length; zero means "not known", which forces the connection to close.
    pub content_length: u64,
    pub encoding: Option<&'a str>,
    pub location: Option<&'a str>,
    /// Cache lifetime in seconds; zero emits `Cache-Control: no-cache`.
    pub max_age: u32,
    pub range: Option<&'a str>,
    pub disposition: Option<&'a str>,
    pub transfer_encoding: Option<&'a str>,
}

impl<'a> ReplyHead<'a> {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn content_type(mut self, value: &'a str) -> Self {
        self.content_type = Some(value);
        self
    }

    pub fn content_length(mut self, len: u64) -> Self {
        self.content_length = len;
        self
    }

    pub fn encoding(mut self, value: &'a str) -> Self {
        self.encoding = Some(value);
        self
    }

    pub fn location(mut self, value: &'a str) -> Self {
        self.location = Some(value);
        self
    }

    pub fn max_age(mut self, secs: u32) -> Self {
        self.max_age = secs;
        self
    }

    pub fn range(mut self, value: &'a str) -> Self {
        self.range = Some(value);
        self
    }

    pub fn disposition(mut self, value: &'a str) -> Self {
        self.disposition = Some(value);
        self
    }

    pub fn transfer_encoding(mut self, value: &'a str) -> Self {
        self.transfer_encoding = Some(value);
        self
    }

    /// Render using the current wall clock for cache headers.
    pub fn render(
        &self,
        version: Version,
        keep_alive: &mut bool,
        extra: &ArgList,
        server_name: &str,
        realm: &str,
    ) -> String {
        self.render_at(SystemTime::now(), version, keep_alive, extra, server_name, realm)
    }

    /// Render the status line and header block, ending with the blank line.
    ///
    /// A zero `content_length` clears `keep_alive`: without a length the
    /// client can only find the end of the body by the connection closing.
    pub fn render_at(
        &self,
        now: SystemTime,
        version: Version,
        keep_alive: &mut bool,
        extra: &ArgList,
        server_name: &str,
        realm: &str,
    ) -> String {
        let mut out = String::with_capacity(256);

        let _ = write!(
            out,
            "{} {} {}\r\n",
            version,
            self.status,
            reason_phrase(self.status)
        );
        let _ = write!(out, "Server: {}\r\n", server_name);

        if self.max_age == 0 {
            out.push_str("Cache-Control: no-cache\r\n");
        } else {
            let expires = now + Duration::from_secs(u64::from(self.max_age));
            let _ = write!(out, "Last-Modified: {}\r\n", httpdate::fmt_http_date(now));
            let _ = write!(out, "Expires: {}\r\n", httpdate::fmt_http_date(expires));
            let _ = write!(out, "Cache-Control: max-age={}\r\n", self.max_age);
        }

        if self.status == 401 {
            let _ = write!(out, "WWW-Authenticate: Basic realm=\"{}\"\r\n", realm);
        }

        if self.content_length > 0 {
            let _ = write!(out, "Content-Length: {}\r\n", self.content_length);
        } else {
            *keep_alive = false;
        }

        let _ = write!(
            out,
            "Connection: {}\r\n",
            if *keep_alive { "Keep-Alive" } else { "Close" }
        );

        let optional = [
            ("Content-Encoding", self.encoding),
            ("Transfer-Encoding", self.transfer_encoding),
            ("Location", self.location),
            ("Content-Type", self.content_type),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                let _ = write!(out, "{}: {}\r\n", name, value);
            }
        }

        if let Some(range) = self.range {
            out.push_str("Accept-Ranges: bytes\r\n");
            let _ = write!(out, "Content-Range: {}\r\n", range);
        }

        if let Some(disposition) = self.disposition {
            let _ = write!(out, "Content-Disposition: {}\r\n", disposition);
        }

        for (name, value) in extra.iter() {
            let _ = write!(out, "{}: {}\r\n", name, value);
        }

        out.push_str("\r\n");
        out
    }
}

/// Interim `100 Continue` status line. No headers follow it.
pub fn continue_line(version: Version) -> String {
    format!("{} 100 Continue\r\n\r\n", version)
}

/// Minimal HTML page for an error status, with optional detail paragraph.
pub fn error_page(status: u16, detail: Option<&str>) -> String {
    let reason = reason_phrase(status);
    let mut page = format!(
        "<!DOCTYPE HTML PUBLIC \"-//IETF//DTD HTML 2.0//EN\">\r\n\
         <HTML><HEAD>\r\n\
         <TITLE>{status} {reason}</TITLE>\r\n\
         </HEAD><BODY>\r\n\
         <H1>{status} {reason}</H1>\r\n"
    );
    if let Some(detail) = detail {
        let _ = write!(page, "<p>{}</p>\r\n", detail);
    }
    page.push_str("</BODY></HTML>\r\n");
    page
}

/// Minimal HTML page pointing at `location`.
pub fn redirect_page(location: &str) -> String {
    format!(
        "<!DOCTYPE HTML PUBLIC \"-//IETF//DTD HTML 2.0//EN\">\r\n\
         <HTML><HEAD>\r\n\
         <TITLE>Redirect</TITLE>\r\n\
         </HEAD><BODY>\r\n\
         Please follow <a href=\"{location}\">{location}</a>\r\n\
         </BODY></HTML>\r\n"
    )
}
