//! Route registries and path resolution.
//!
//! Two kinds of routes are supported:
//!
//! - **Literal routes** match a path prefix on a segment boundary: `/api`
//!   matches `/api`, `/api/x` and `/api?q`, but not `/apix`. The most
//!   recently registered literal route is tried first.
//! - **Pattern routes** match a case-insensitive regular expression anchored
//!   at the start of the path. They are ordered by depth (number of `/` in
//!   the pattern source), deepest first, so `/a/b/(.*)` wins over `/a/(.*)`
//!   regardless of registration order. Equal depths keep registration order.
//!
//! Pattern routes are consulted before literal routes.
//!
//! A [`Router`] is filled once at start-up and then handed to the
//! [`Server`](crate::Server), which shares it immutably with every
//! connection thread.

use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::connection::Connection;
use crate::error::{HttpError, Result};

/// Maximum number of capture groups passed to a pattern handler, including
/// the whole match at index 0.
pub const MAX_ROUTE_MATCHES: usize = 32;

/// What the connection loop should do after resolving a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The handler already produced its reply.
    Handled,
    /// Close the connection without (further) reply.
    Disconnect,
    /// Continuation pre-resolve only: send `100 Continue`, then read the body
    /// and resolve again.
    SendContinue,
    /// Render the generic error page with this status.
    Error(u16),
}

impl From<Result<()>> for Outcome {
    /// A reply that was written is handled; a failed write ends the connection.
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Outcome::Handled,
            Err(_) => Outcome::Disconnect,
        }
    }
}

/// Behaviour flags for pattern routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteFlags(u32);

impl RouteFlags {
    pub const NONE: RouteFlags = RouteFlags(0);
    /// The handler wants to see `Expect: 100-continue` requests before the
    /// body is read, and sends `100 Continue` itself if it accepts them.
    pub const HANDLE_100_CONTINUE: RouteFlags = RouteFlags(1);

    pub fn contains(self, other: RouteFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for RouteFlags {
    type Output = RouteFlags;

    fn bitor(self, rhs: RouteFlags) -> RouteFlags {
        RouteFlags(self.0 | rhs.0)
    }
}

/// Handler for a literal route.
///
/// `remain` is the part of the path after the prefix and its `/`, or `None`
/// when nothing follows.
pub trait PathHandler: Send + Sync {
    fn handle(&self, conn: &mut Connection<'_>, remain: Option<&str>) -> Outcome;
}

impl<F> PathHandler for F
where
    F: Fn(&mut Connection<'_>, Option<&str>) -> Outcome + Send + Sync,
{
    fn handle(&self, conn: &mut Connection<'_>, remain: Option<&str>) -> Outcome {
        self(conn, remain)
    }
}

/// Handler for a pattern route.
///
/// `captures[0]` is the whole matched text, followed by each participating
/// group in order. `continuation` is set when the request is being
/// pre-resolved for `Expect: 100-continue` and the body has not been read.
pub trait RouteHandler: Send + Sync {
    fn handle(&self, conn: &mut Connection<'_>, captures: &[&str], continuation: bool) -> Outcome;
}

impl<F> RouteHandler for F
where
    F: Fn(&mut Connection<'_>, &[&str], bool) -> Outcome + Send + Sync,
{
    fn handle(&self, conn: &mut Connection<'_>, captures: &[&str], continuation: bool) -> Outcome {
        self(conn, captures, continuation)
    }
}

struct LiteralRoute {
    prefix: String,
    handler: Box<dyn PathHandler>,
}

struct PatternRoute {
    source: String,
    regex: Regex,
    depth: usize,
    flags: RouteFlags,
    handler: Box<dyn RouteHandler>,
}

/// The two route registries.
#[derive(Default)]
pub struct Router {
    literals: Vec<LiteralRoute>,
    patterns: Vec<PatternRoute>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a literal path prefix. Newer registrations are tried first.
    ///
    /// Any state the handler needs is captured by the closure.
    pub fn try_register_literal<F>(&mut self, prefix: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut Connection<'_>, Option<&str>) -> Outcome + Send + Sync + 'static,
    {
        if prefix.is_empty() {
            return Err(HttpError::EmptyPrefix);
        }
        self.literals.insert(
            0,
            LiteralRoute {
                prefix: prefix.to_string(),
                handler: Box::new(handler),
            },
        );
        tracing::debug!(prefix, "literal route registered");
        Ok(())
    }

    /// Register a literal path prefix.
    ///
    /// # Panics
    ///
    /// Panics if `prefix` is empty. Routes are a start-up contract.
    pub fn register_literal<F>(&mut self, prefix: &str, handler: F)
    where
        F: Fn(&mut Connection<'_>, Option<&str>) -> Outcome + Send + Sync + 'static,
    {
        if let Err(e) = self.try_register_literal(prefix, handler) {
            panic!("cannot register literal route: {e}");
        }
    }

    /// Register a regular-expression route, reporting compile errors.
    pub fn try_register_pattern<F>(&mut self, pattern: &str, handler: F, flags: RouteFlags) -> Result<()>
    where
        F: Fn(&mut Connection<'_>, &[&str], bool) -> Outcome + Send + Sync + 'static,
    {
        let regex = RegexBuilder::new(&format!("^(?:{pattern})"))
            .case_insensitive(true)
            .build()
            .map_err(|source| HttpError::InvalidRoute {
                pattern: pattern.to_string(),
                source,
            })?;
        let depth = pattern.matches('/').count();

        // Deepest first; an equal depth goes after its peers.
        let pos = self.patterns.partition_point(|r| r.depth >= depth);
        self.patterns.insert(
            pos,
            PatternRoute {
                source: pattern.to_string(),
                regex,
                depth,
                flags,
                handler: Box::new(handler),
            },
        );
        tracing::debug!(pattern, depth, "pattern route registered");
        Ok(())
    }

    /// Register a regular-expression route.
    ///
    /// # Panics
    ///
    /// Panics if the pattern does not compile. A bad pattern is a programming
    /// error that must stop the process before it serves anything.
    pub fn register_pattern<F>(&mut self, pattern: &str, handler: F, flags: RouteFlags)
    where
        F: Fn(&mut Connection<'_>, &[&str], bool) -> Outcome + Send + Sync + 'static,
    {
        if let Err(e) = self.try_register_pattern(pattern, handler, flags) {
            tracing::error!(error = %e, "failed to compile route");
            panic!("{e}");
        }
    }

    /// Resolve the connection's current path and invoke the winning handler.
    ///
    /// With `continuation` set the body has not been read yet: a pattern
    /// route without [`RouteFlags::HANDLE_100_CONTINUE`] and every literal
    /// route yield [`Outcome::SendContinue`] instead of being invoked.
    pub fn resolve(&self, conn: &mut Connection<'_>, continuation: bool) -> Outcome {
        // Captures borrow this copy, leaving `conn` free for the handler.
        let path = conn.path().to_owned();

        if let Some((route, caps)) = self
            .patterns
            .iter()
            .find_map(|r| r.regex.captures(&path).map(|c| (r, c)))
        {
            tracing::trace!(path = %path, pattern = %route.source, "pattern route matched");

            if continuation && !route.flags.contains(RouteFlags::HANDLE_100_CONTINUE) {
                return Outcome::SendContinue;
            }

            let mut slots = [""; MAX_ROUTE_MATCHES];
            let mut argc = 0;
            for group in caps.iter().take(MAX_ROUTE_MATCHES) {
                let Some(m) = group else { break };
                slots[argc] = m.as_str();
                argc += 1;
            }

            return route.handler.handle(conn, &slots[..argc], continuation);
        }

        let Some((route, remain)) = self.match_literal(&path) else {
            tracing::trace!(path = %path, "no route matched");
            return Outcome::Error(404);
        };

        // Literal routes never see a bodiless pre-resolve; they always get `100 Continue`.
        if continuation {
            return Outcome::SendContinue;
        }

        tracing::trace!(path = %path, prefix = %route.prefix, "literal route matched");
        route.handler.handle(conn, remain)
    }

    fn match_literal<'p>(&self, path: &'p str) -> Option<(&LiteralRoute, Option<&'p str>)> {
        self.literals.iter().find_map(|route| {
            let rest = path.strip_prefix(route.prefix.as_str())?;
            match rest.as_bytes().first() {
                None | Some(b'?') => Some((route, None)),
                Some(b'/') => {
                    let remain = &rest[1..];
                    Some((route, (!remain.is_empty()).then_some(remain)))
                }
                Some(_) => None,
            }
        })
    }

    pub fn literal_count(&self) -> usize {
        self.literals.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field(
                "literals",
                &self.literals.iter().map(|r| r.prefix.as_str()).collect::<Vec<_>>(),
            )
            .field(
                "patterns",
                &self.patterns.iter().map(|r| (r.source.as_str(), r.depth)).collect::<Vec<_>>(),
            )
            .finish()
    }
}
