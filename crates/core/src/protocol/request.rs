use std::fmt;

use crate::error::{HttpError, ParseErrorKind};
use crate::util::{base64_decode, tokenize};

/// Request methods accepted on the command line.
///
/// The HTTP set is dispatched per RFC 7231; the RTSP set (RFC 2326 §10) is
/// routed like `GET` when it arrives with an `RTSP/1.0` version token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Describe,
    Options,
    Setup,
    Play,
    Teardown,
    Pause,
}

impl Method {
    /// Look up a method token. Matching is exact (methods are case-sensitive).
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "GET" => Self::Get,
            "HEAD" => Self::Head,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "DESCRIBE" => Self::Describe,
            "OPTIONS" => Self::Options,
            "SETUP" => Self::Setup,
            "PLAY" => Self::Play,
            "TEARDOWN" => Self::Teardown,
            "PAUSE" => Self::Pause,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Describe => "DESCRIBE",
            Self::Options => "OPTIONS",
            Self::Setup => "SETUP",
            Self::Play => "PLAY",
            Self::Teardown => "TEARDOWN",
            Self::Pause => "PAUSE",
        }
    }

    /// Whether this method belongs to the RTSP method set.
    pub fn is_rtsp(&self) -> bool {
        matches!(
            self,
            Self::Describe | Self::Options | Self::Setup | Self::Play | Self::Teardown | Self::Pause
        )
    }

    /// Whether this method carries a request body (`POST`, `PUT`).
    pub fn has_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol version negotiated by the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
    Rtsp10,
}

impl Version {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "HTTP/1.0" => Some(Self::Http10),
            "HTTP/1.1" => Some(Self::Http11),
            "RTSP/1.0" => Some(Self::Rtsp10),
            _ => None,
        }
    }

    /// Token echoed back on the status line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http10 => "HTTP/1.0",
            Self::Http11 => "HTTP/1.1",
            Self::Rtsp10 => "RTSP/1.0",
        }
    }

    pub fn is_rtsp(&self) -> bool {
        matches!(self, Self::Rtsp10)
    }

    /// Keep-alive policy given the request's `Connection` header.
    ///
    /// | version  | rule                                         |
    /// |----------|----------------------------------------------|
    /// | RTSP/1.0 | always keep-alive                            |
    /// | HTTP/1.0 | keep-alive iff `Connection: keep-alive`      |
    /// | HTTP/1.1 | keep-alive unless `Connection: close`        |
    pub fn keep_alive(&self, connection: Option<&str>) -> bool {
        match self {
            Self::Rtsp10 => true,
            Self::Http10 => connection.is_some_and(|v| v.eq_ignore_ascii_case("keep-alive")),
            Self::Http11 => !connection.is_some_and(|v| v.eq_ignore_ascii_case("close")),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed command line: `METHOD SP target SP VERSION`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: Method,
    /// Path with the query string still attached.
    pub target: String,
    pub version: Version,
}

impl RequestLine {
    /// Parse a command line. Exactly three whitespace-separated tokens are
    /// required, and both the method and version must be known.
    pub fn parse(line: &str) -> crate::error::Result<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();

        if parts.is_empty() {
            return Err(HttpError::Parse {
                kind: ParseErrorKind::EmptyRequest,
            });
        }
        if parts.len() != 3 {
            return Err(HttpError::Parse {
                kind: ParseErrorKind::InvalidRequestLine,
            });
        }

        let method = Method::from_token(parts[0]).ok_or(HttpError::Parse {
            kind: ParseErrorKind::UnknownMethod,
        })?;
        let version = Version::from_token(parts[2]).ok_or(HttpError::Parse {
            kind: ParseErrorKind::UnknownVersion,
        })?;

        Ok(RequestLine {
            method,
            target: parts[1].to_string(),
            version,
        })
    }

    /// Split the target into path and optional query string.
    pub fn path_and_query(&self) -> (&str, Option<&str>) {
        match self.target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (&self.target, None),
        }
    }
}

/// Split a header line at the first colon into a trimmed `(key, value)`.
///
/// Returns `None` for lines without a colon; callers skip those.
pub fn parse_header_line(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    Some((key.trim(), value.trim()))
}

/// Username and password carried by an `Authorization: Basic` header.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Decode an `Authorization` header value.
    ///
    /// Only the `Basic` scheme (case-insensitive) is understood. Any parse
    /// failure yields `None`; a bad header never fails the request.
    pub fn from_authorization(value: &str) -> Option<Self> {
        let fields = tokenize(value, 2, None);
        let [scheme, encoded] = fields.as_slice() else {
            return None;
        };
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }

        let decoded = String::from_utf8(base64_decode(encoded)?).ok()?;
        let (username, password) = decoded.split_once(':')?;

        Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_get_request_line() {
        let line = RequestLine::parse("GET /index.html?x=1 HTTP/1.1").unwrap();
        assert_eq!(line.method, Method::Get);
        assert_eq!(line.version, Version::Http11);
        assert_eq!(line.path_and_query(), ("/index.html", Some("x=1")));
    }

    #[test]
    fn parse_rtsp_request_line() {
        let line = RequestLine::parse("DESCRIBE rtsp://localhost/stream RTSP/1.0").unwrap();
        assert_eq!(line.method, Method::Describe);
        assert!(line.method.is_rtsp());
        assert!(line.version.is_rtsp());
        assert_eq!(line.path_and_query(), ("rtsp://localhost/stream", None));
    }

    #[test]
    fn reject_wrong_token_count() {
        assert!(matches!(
            RequestLine::parse("GET /"),
            Err(HttpError::Parse {
                kind: ParseErrorKind::InvalidRequestLine
            })
        ));
        assert!(RequestLine::parse("GET / HTTP/1.1 extra").is_err());
        assert!(matches!(
            RequestLine::parse("   "),
            Err(HttpError::Parse {
                kind: ParseErrorKind::EmptyRequest
            })
        ));
    }

    #[test]
    fn reject_unknown_method_and_version() {
        assert!(matches!(
            RequestLine::parse("BREW /pot HTTP/1.1"),
            Err(HttpError::Parse {
                kind: ParseErrorKind::UnknownMethod
            })
        ));
        assert!(matches!(
            RequestLine::parse("GET / HTTP/2.0"),
            Err(HttpError::Parse {
                kind: ParseErrorKind::UnknownVersion
            })
        ));
        assert!(RequestLine::parse("get / HTTP/1.1").is_err());
    }

    #[test]
    fn keep_alive_policy_table() {
        assert!(!Version::Http10.keep_alive(None));
        assert!(Version::Http10.keep_alive(Some("keep-alive")));
        assert!(Version::Http10.keep_alive(Some("Keep-Alive")));
        assert!(Version::Http11.keep_alive(None));
        assert!(!Version::Http11.keep_alive(Some("close")));
        assert!(!Version::Http11.keep_alive(Some("CLOSE")));
        assert!(Version::Rtsp10.keep_alive(Some("close")));
        assert!(Version::Rtsp10.keep_alive(None));
    }

    #[test]
    fn header_line_split_at_first_colon() {
        assert_eq!(
            parse_header_line("Host:  example.com:8080 "),
            Some(("Host", "example.com:8080"))
        );
        assert_eq!(parse_header_line("Empty:"), Some(("Empty", "")));
        assert_eq!(parse_header_line("no colon here"), None);
    }

    #[test]
    fn basic_credentials_decode() {
        // base64("alice:secret")
        let creds = Credentials::from_authorization("Basic YWxpY2U6c2VjcmV0").unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "secret");

        let creds = Credentials::from_authorization("basic YWxpY2U6c2VjcmV0").unwrap();
        assert_eq!(creds.username, "alice");
    }

    #[test]
    fn password_may_contain_colons() {
        // base64("bob:a:b")
        let creds = Credentials::from_authorization("Basic Ym9iOmE6Yg==").unwrap();
        assert_eq!(creds.username, "bob");
        assert_eq!(creds.password, "a:b");
    }

    #[test]
    fn malformed_authorization_is_none() {
        assert!(Credentials::from_authorization("Basic").is_none());
        assert!(Credentials::from_authorization("Bearer YWxpY2U6c2VjcmV0").is_none());
        assert!(Credentials::from_authorization("Basic !!!notbase64").is_none());
        // base64("nocolon")
        assert!(Credentials::from_authorization("Basic bm9jb2xvbg==").is_none());
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::from_authorization("Basic YWxpY2U6c2VjcmV0").unwrap();
        let dbg = format!("{:?}", creds);
        assert!(dbg.contains("alice"));
        assert!(!dbg.contains("secret"));
    }
}
