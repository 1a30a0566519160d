//! # Router
//!
//! Radix-trie routing with `matchit`, one trie per HTTP method.
//!
//! ## Features
//!
//! - Path parameters (`/api/vehicles/{id}`)
//! - Typed parameters (`/api/vehicles/{id:int}`); a segment that fails to
//!   convert is treated as no match
//! - 405 detection when the path exists under another method

use crate::error::{Error, Result};
use crate::route::RouteInfo;
use crate::types::{convert_param, ParamValue};
use matchit::Router as MatchitRouter;
use std::collections::HashMap;

/// HTTP methods supported by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP DELETE
    Delete,
    /// HTTP OPTIONS, answered by the server as a CORS preflight
    Options,
}

impl Method {
    /// Map a hyper method; `None` for methods the router never serves
    #[must_use]
    pub fn from_http(method: &hyper::Method) -> Option<Self> {
        Some(match *method {
            hyper::Method::GET => Self::Get,
            hyper::Method::POST => Self::Post,
            hyper::Method::PUT => Self::Put,
            hyper::Method::DELETE => Self::Delete,
            hyper::Method::OPTIONS => Self::Options,
            _ => return None,
        })
    }

    /// Upper-case method name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route handler identifier
pub type HandlerId = usize;

/// Matched route with converted parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// The handler ID for this route
    pub handler_id: HandlerId,
    /// Path parameters, converted to their declared types
    pub params: HashMap<String, ParamValue>,
    /// Whether a bearer token is required
    pub auth_required: bool,
}

impl RouteMatch {
    /// Get a parameter as i64
    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.params.get(name).and_then(ParamValue::as_int)
    }
}

/// Per-method storage for routes
#[derive(Clone)]
struct MethodRoutes {
    router: MatchitRouter<HandlerId>,
    routes: HashMap<HandlerId, RouteInfo>,
}

impl MethodRoutes {
    fn new() -> Self {
        Self {
            router: MatchitRouter::new(),
            routes: HashMap::new(),
        }
    }
}

/// HTTP router using one radix trie per method
#[derive(Clone, Default)]
pub struct Router {
    method_routes: HashMap<Method, MethodRoutes>,
    next_handler_id: HandlerId,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut patterns: Vec<String> = self
            .method_routes
            .iter()
            .flat_map(|(method, routes)| {
                routes
                    .routes
                    .values()
                    .map(move |r| format!("{method} {}", r.path_pattern))
            })
            .collect();
        patterns.sort();
        f.debug_struct("Router").field("routes", &patterns).finish()
    }
}

impl Router {
    /// Create a new empty router
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route and return its handler ID
    ///
    /// Handler IDs are assigned sequentially across all methods, starting at 0.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the pattern is malformed or
    /// conflicts with an existing route for the same method.
    pub fn add_route(&mut self, method: Method, path: &str, auth_required: bool) -> Result<HandlerId> {
        let handler_id = self.next_handler_id;
        let info = RouteInfo::new(handler_id, path, auth_required)?;

        let method_routes = self
            .method_routes
            .entry(method)
            .or_insert_with(MethodRoutes::new);

        method_routes
            .router
            .insert(info.match_pattern.clone(), handler_id)
            .map_err(|e| Error::InvalidRoutePattern {
                pattern: path.to_string(),
                reason: e.to_string(),
            })?;
        method_routes.routes.insert(handler_id, info);

        self.next_handler_id += 1;
        Ok(handler_id)
    }

    /// Match a request against the registered routes
    ///
    /// # Errors
    ///
    /// - `Error::MethodNotAllowed` if the path matches under another method only
    /// - `Error::RouteNotFound` otherwise
    pub fn match_route(&self, method: Method, path: &str) -> Result<RouteMatch> {
        if let Some(found) = self.lookup(method, path) {
            return Ok(found);
        }

        let elsewhere = self
            .method_routes
            .keys()
            .any(|&other| other != method && self.lookup(other, path).is_some());
        if elsewhere {
            Err(Error::MethodNotAllowed {
                method: method.to_string(),
                path: path.to_string(),
            })
        } else {
            Err(Error::RouteNotFound {
                path: path.to_string(),
            })
        }
    }

    /// Methods under which `path` is routable
    #[must_use]
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let mut methods: Vec<Method> = self
            .method_routes
            .keys()
            .copied()
            .filter(|&m| self.lookup(m, path).is_some())
            .collect();
        methods.sort_by_key(|m| m.as_str());
        methods
    }

    fn lookup(&self, method: Method, path: &str) -> Option<RouteMatch> {
        let method_routes = self.method_routes.get(&method)?;
        let matched = method_routes.router.at(path).ok()?;
        let info = method_routes.routes.get(matched.value)?;

        let mut params = HashMap::new();
        for (name, raw) in matched.params.iter() {
            let value = convert_param(raw, info.param_type(name)).ok()?;
            params.insert(name.to_string(), value);
        }

        Some(RouteMatch {
            handler_id: info.handler_id,
            params,
            auth_required: info.auth_required,
        })
    }
}
