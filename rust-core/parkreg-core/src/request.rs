//! # HTTP Request
//!
//! Owned request wrapper handed to handlers: method, path, headers, collected
//! body, converted path parameters and (when authenticated) JWT claims.

use crate::error::{Error, Result};
use crate::json::parse_body;
use crate::router::Method;
use crate::types::ParamValue;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH};
use hyper::{HeaderMap, Request};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

/// Request as seen by handlers and middleware
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Request path (without query string)
    pub path: String,
    /// Path parameters of the matched route
    pub params: HashMap<String, ParamValue>,
    /// Validated JWT claims
    pub claims: Option<Value>,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl ApiRequest {
    /// Build a request by hand (tests and in-process calls)
    ///
    /// Any query string on `path` is dropped.
    pub fn new(
        method: Method,
        path: impl Into<String>,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Self {
        let mut path = path.into();
        if let Some(idx) = path.find('?') {
            path.truncate(idx);
        }

        let mut req = Self {
            method,
            path,
            params: HashMap::new(),
            claims: None,
            headers: HeaderMap::new(),
            body,
        };
        for (k, v) in &headers {
            req.set_header(k, v);
        }
        req
    }

    /// Collect a hyper request, enforcing a body size limit
    ///
    /// # Errors
    ///
    /// - `Error::PayloadTooLarge` if `Content-Length` or the streamed body exceeds the limit
    /// - `Error::MethodNotAllowed` for methods the router never serves
    /// - `Error::Http` if the body stream fails
    pub async fn from_hyper(req: Request<hyper::body::Incoming>, max_body_size: usize) -> Result<Self> {
        let method = Method::from_http(req.method()).ok_or_else(|| Error::MethodNotAllowed {
            method: req.method().to_string(),
            path: req.uri().path().to_string(),
        })?;
        let path = req.uri().path().to_string();
        let headers = req.headers().clone();

        let declared = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if let Some(declared) = declared.filter(|&len| len > max_body_size) {
            return Err(Error::PayloadTooLarge {
                limit: max_body_size,
                actual: declared,
            });
        }

        // Chunked bodies carry no Content-Length; stop reading at the limit.
        let bytes = Limited::new(req.into_body(), max_body_size)
            .collect()
            .await
            .map_err(|e| body_error(e, max_body_size))?
            .to_bytes();

        Ok(Self {
            method,
            path,
            params: HashMap::new(),
            claims: None,
            headers,
            body: (!bytes.is_empty()).then_some(bytes),
        })
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set or override a header; invalid names or values are ignored
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(n, v);
        }
    }

    /// Bearer token from the `Authorization` header
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.header("authorization")
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Integer path parameter
    #[must_use]
    pub fn param_int(&self, name: &str) -> Option<i64> {
        self.params.get(name).and_then(ParamValue::as_int)
    }

    /// Untyped path parameter
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(ParamValue::as_str)
    }

    /// Raw request body
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Decode the body as JSON
    ///
    /// # Errors
    ///
    /// Returns `Error::Decode` if the body is missing or malformed.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        parse_body(self.body_bytes().unwrap_or_default())
    }
}

fn body_error(err: Box<dyn std::error::Error + Send + Sync>, limit: usize) -> Error {
    if err.is::<LengthLimitError>() {
        // Reading stopped one byte past the limit.
        return Error::PayloadTooLarge {
            limit,
            actual: limit.saturating_add(1),
        };
    }
    match err.downcast::<hyper::Error>() {
        Ok(e) => Error::Http(*e),
        Err(e) => Error::Decode {
            reason: e.to_string(),
        },
    }
}
