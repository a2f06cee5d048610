//! Mount-prefix-aware path and URI resolution.
//!
//! The gateway may be deployed at the web root or behind a reverse proxy at a
//! sub-path. Every link or redirect the gateway echoes back to a client goes
//! through [`PathResolver`] so it carries the correct prefix, and absolute
//! URIs are rebuilt from the inbound request's host header via
//! [`RequestOrigin`].

use std::collections::HashMap;

/// Canonicalizes request-relative paths against a configured mount root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    /// Mount root with any trailing slash stripped. Empty when mounted at `/`.
    root: String,
}

impl PathResolver {
    /// Build a resolver for the given mount root. A trailing slash is
    /// stripped before any concatenation, so `/app/` and `/app` are
    /// equivalent and `/` means no prefix at all.
    pub fn new(root: &str) -> Self {
        let root = root.strip_suffix('/').unwrap_or(root).to_string();
        Self { root }
    }

    /// Prefix an absolute path with the mount root. Full URLs and relative
    /// paths pass through unchanged.
    pub fn resolve(&self, path: &str) -> String {
        if self.root.is_empty() || !path.starts_with('/') || path.contains("://") {
            return path.to_string();
        }
        format!("{}{}", self.root, path)
    }

    /// Element-wise [`resolve`](Self::resolve) over a list of paths.
    pub fn resolve_all<'a, I>(&self, paths: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        paths.into_iter().map(|p| self.resolve(p)).collect()
    }

    /// The canonical root path of the gateway (`/` resolved).
    pub fn root_path(&self) -> String {
        self.resolve("/")
    }
}

/// Scheme, host and port of the inbound request, as derived from the
/// request's `Host` header and transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
}

impl RequestOrigin {
    /// Split a `Host` header value (`host[:port]`) into its parts.
    ///
    /// A colon only introduces a port when the remaining host part carries
    /// no colon of its own (or is a bracketed IPv6 literal), so a bare
    /// literal like `::1` stays intact.
    pub fn from_host_header(scheme: &str, host_header: &str) -> Self {
        let (host, port) = match host_header.rsplit_once(':') {
            Some((h, p)) if !h.contains(':') || h.ends_with(']') => match p.parse::<u16>() {
                Ok(port) => (h.to_string(), Some(port)),
                Err(_) => (host_header.to_string(), None),
            },
            _ => (host_header.to_string(), None),
        };
        Self {
            scheme: scheme.to_string(),
            host,
            port,
        }
    }

    /// True when the port matches the scheme's standard port and must be
    /// suppressed from reconstructed URIs.
    fn is_default_port(&self, port: u16) -> bool {
        matches!(
            (self.scheme.as_str(), port),
            ("http", 80) | ("https", 443)
        )
    }

    /// Reconstruct an absolute URI for this origin.
    ///
    /// The port is appended only when present and different from the
    /// scheme's standard port. With `noproto` set the scheme is omitted
    /// entirely, yielding a protocol-relative URI (`//host/...`) for
    /// socket/transport endpoints that must not hard-pin a scheme. When a
    /// path is given it is first canonicalized through `resolver`.
    pub fn uri(&self, resolver: &PathResolver, path: Option<&str>, noproto: bool) -> String {
        let mut uri = if noproto {
            format!("//{}", self.host)
        } else {
            format!("{}://{}", self.scheme, self.host)
        };
        if let Some(port) = self.port {
            if !self.is_default_port(port) {
                uri.push_str(&format!(":{}", port));
            }
        }
        if let Some(path) = path {
            uri.push_str(&resolver.resolve(path));
        }
        uri
    }
}

/// Failure resolving a named route.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("unable to find controller {0}")]
    ControllerNotFound(String),
    #[error("route name must be specified in parameters")]
    RouteNameMissing,
    #[error("controller {0} has no route named {1}")]
    RouteNotFound(String, String),
}

/// Statically-declared table of named routes, grouped by controller name.
///
/// Built once at startup; replaces any runtime discovery of handlers. Route
/// patterns use `{param}` placeholders matching the router's own syntax.
#[derive(Debug, Default)]
pub struct RouteTable {
    controllers: HashMap<String, HashMap<String, String>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named route under a controller.
    pub fn register(&mut self, controller: &str, route: &str, pattern: &str) {
        self.controllers
            .entry(controller.to_string())
            .or_default()
            .insert(route.to_string(), pattern.to_string());
    }

    /// Resolve a named route. `params` must carry the route name under the
    /// `name` key; every other entry substitutes a `{key}` placeholder in
    /// the registered pattern.
    pub fn resolve(
        &self,
        controller: &str,
        params: &HashMap<String, String>,
    ) -> Result<String, RouteError> {
        let routes = self
            .controllers
            .get(controller)
            .ok_or_else(|| RouteError::ControllerNotFound(controller.to_string()))?;
        let name = params
            .get("name")
            .ok_or(RouteError::RouteNameMissing)?;
        let pattern = routes.get(name).ok_or_else(|| {
            RouteError::RouteNotFound(controller.to_string(), name.clone())
        })?;
        let mut path = pattern.clone();
        for (key, value) in params {
            if key == "name" {
                continue;
            }
            path = path.replace(&format!("{{{}}}", key), value);
        }
        Ok(path)
    }
}
