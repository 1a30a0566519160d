//! # HTTP Response
//!
//! Handler output: status, body, content type and extra headers.

use crate::json::to_json;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::error;

/// Response produced by handlers and middleware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
    /// Content type
    pub content_type: String,
    /// Extra headers, in insertion order
    pub headers: Vec<(String, String)>,
}

impl Default for ApiResponse {
    fn default() -> Self {
        Self {
            status: 200,
            body: String::new(),
            content_type: "application/json".to_string(),
            headers: Vec::new(),
        }
    }
}

impl ApiResponse {
    /// Serialize `value` as a JSON response with the given status
    ///
    /// Falls back to a 500 if serialization fails.
    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match to_json(value) {
            Ok(body) => Self {
                status,
                body,
                ..Self::default()
            },
            Err(e) => {
                error!("Failed to encode response body: {}", e);
                Self::error(500, "Internal Server Error")
            }
        }
    }

    /// `{"error": <message>}` JSON body with the given status
    pub fn error(status: u16, message: &str) -> Self {
        let body = serde_json::json!({ "error": message }).to_string();
        Self {
            status,
            body,
            ..Self::default()
        }
    }

    /// Status with an empty body
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Set status code
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Add a header (builder style)
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set or override a header
    pub fn set_header(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("content-type") {
            self.content_type = value.to_string();
            return;
        }
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((key.to_string(), value.to_string())),
        }
    }

    /// Header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        if key.eq_ignore_ascii_case("content-type") {
            return Some(&self.content_type);
        }
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Parse the body back as JSON
    ///
    /// # Errors
    ///
    /// Returns the serde error if the body is not JSON.
    pub fn json_body(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.body)
    }

    /// Convert to a hyper response
    pub(crate) fn into_hyper(self) -> Response<Full<Bytes>> {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = Response::builder().status(status);
        if !self.body.is_empty() {
            builder = builder.header("Content-Type", &self.content_type);
        }
        for (k, v) in &self.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }

        builder
            .body(Full::new(Bytes::from(self.body)))
            .unwrap_or_else(|e| {
                error!("Failed to build response: {}", e);
                let mut fallback = Response::new(Full::new(Bytes::from_static(
                    b"{\"error\":\"Internal Server Error\"}",
                )));
                *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                fallback
            })
    }
}
