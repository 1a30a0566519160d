//! # Middleware
//!
//! Request/response interception around handlers.
//!
//! `before_request` runs in registration order and may short-circuit with a
//! response; `after_response` runs in reverse order on every response,
//! short-circuited or not.

use crate::request::ApiRequest;
use crate::response::ApiResponse;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Middleware trait for request/response interception
pub trait Middleware: Send + Sync {
    /// Called before the request handler
    fn before_request(&self, _req: &ApiRequest) -> MiddlewareResult {
        MiddlewareResult::Continue
    }

    /// Called after the request handler
    fn after_response(&self, _req: &ApiRequest, _res: &mut ApiResponse) {}

    /// Middleware name for logging
    fn name(&self) -> &'static str;
}

/// Result of middleware execution
#[derive(Debug)]
pub enum MiddlewareResult {
    /// Continue to next middleware/handler
    Continue,
    /// Short-circuit with this response (skip handler)
    Respond(ApiResponse),
}

/// Ordered middleware chain
#[derive(Default, Clone)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.middlewares.iter().map(|m| m.name()).collect();
        f.debug_struct("MiddlewareChain").field("middlewares", &names).finish()
    }
}

impl MiddlewareChain {
    /// Create a new empty middleware chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware to the chain
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Arc::new(middleware));
    }

    /// Execute `before_request` until one responds
    pub fn run_before(&self, req: &ApiRequest) -> MiddlewareResult {
        for mw in &self.middlewares {
            if let MiddlewareResult::Respond(resp) = mw.before_request(req) {
                debug!(middleware = mw.name(), "Request short-circuited");
                return MiddlewareResult::Respond(resp);
            }
        }
        MiddlewareResult::Continue
    }

    /// Execute `after_response` for all middlewares (in reverse order)
    pub fn run_after(&self, req: &ApiRequest, res: &mut ApiResponse) {
        for mw in self.middlewares.iter().rev() {
            mw.after_response(req, res);
        }
    }

    /// Get the number of middlewares
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Check if chain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

/// Structured access log, one line per request and response
#[derive(Debug, Default)]
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn before_request(&self, req: &ApiRequest) -> MiddlewareResult {
        info!(
            method = %req.method,
            path = %req.path,
            request_id = req.header("x-request-id").unwrap_or("-"),
            "Request received"
        );
        MiddlewareResult::Continue
    }

    fn after_response(&self, req: &ApiRequest, res: &mut ApiResponse) {
        info!(
            method = %req.method,
            path = %req.path,
            status = res.status,
            request_id = req.header("x-request-id").unwrap_or("-"),
            "Response sent"
        );
    }

    fn name(&self) -> &'static str {
        "access-log"
    }
}

/// Header carrying the request start instant, set by the server
pub(crate) const STARTED_HEADER: &str = "x-started-nanos";

/// Debug-level request duration
///
/// Reads the start time the server stamps on each request, so concurrent
/// requests to the same path never share state.
#[derive(Debug)]
pub struct TimingMiddleware {
    epoch: Instant,
}

impl Default for TimingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingMiddleware {
    /// Create a new timing middleware
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: crate::server::process_epoch(),
        }
    }
}

impl Middleware for TimingMiddleware {
    fn after_response(&self, req: &ApiRequest, res: &mut ApiResponse) {
        let Some(started) = req
            .header(STARTED_HEADER)
            .and_then(|v| v.parse::<u128>().ok())
        else {
            return;
        };
        let elapsed_us = self.epoch.elapsed().as_nanos().saturating_sub(started) / 1_000;
        debug!(
            method = %req.method,
            path = %req.path,
            status = res.status,
            duration_us = %elapsed_us,
            "Request timing"
        );
    }

    fn name(&self) -> &'static str {
        "timing"
    }
}

/// CORS response headers
///
/// Browsers only let scripts read response headers listed in
/// `Access-Control-Expose-Headers`, so the alert headers must be named there.
#[derive(Debug, Clone)]
pub struct CorsMiddleware {
    allow_origin: String,
    allow_methods: String,
    allow_headers: String,
    expose_headers: Option<String>,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: "GET, POST, PUT, DELETE, OPTIONS".to_string(),
            allow_headers: "Content-Type, Authorization, X-Request-Id".to_string(),
            expose_headers: None,
        }
    }
}

impl CorsMiddleware {
    /// Permissive defaults: any origin, the registry's methods
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict `Access-Control-Allow-Origin`
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allow_origin = origin.into();
        self
    }

    /// Headers scripts may read from responses
    #[must_use]
    pub fn expose<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = headers
            .into_iter()
            .map(|h| h.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        self.expose_headers = (!joined.is_empty()).then_some(joined);
        self
    }

    /// Configured origin
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.allow_origin
    }
}

impl Middleware for CorsMiddleware {
    fn after_response(&self, _req: &ApiRequest, res: &mut ApiResponse) {
        res.set_header("Access-Control-Allow-Origin", &self.allow_origin);
        res.set_header("Access-Control-Allow-Methods", &self.allow_methods);
        res.set_header("Access-Control-Allow-Headers", &self.allow_headers);
        if let Some(expose) = &self.expose_headers {
            res.set_header("Access-Control-Expose-Headers", expose);
        }
    }

    fn name(&self) -> &'static str {
        "cors"
    }
}
