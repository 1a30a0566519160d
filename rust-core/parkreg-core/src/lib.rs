//! # Parkreg Core
//!
//! Core library for the parking-lot vehicle registry.
//! Admits vehicles under per-type capacity and duplicate-plate rules, and
//! serves the registry over a small REST API.
//!
//! ## Architecture
//!
//! The [`registry::VehicleRegistry`] owns the admission rules and talks to a
//! [`store::RecordStore`] (in-memory or SQLite). The HTTP layer is a thin
//! adapter in [`api`] on top of a Hyper server with radix-trie routing.
//!
//! ## Modules
//!
//! - `vehicle` - Vehicle record and type
//! - `registry` - Admission rules and registry operations
//! - `store` - Record store trait with memory and SQLx SQLite backends
//! - `api` - REST routes, alert headers and error bodies
//! - `server` - HTTP server built on Hyper
//! - `router` - Routing using matchit (radix trie)
//! - `route` - Route metadata and information
//! - `request` / `response` - Handler-facing request and response types
//! - `middleware` - Request/response middleware system
//! - `json` - JSON parsing with simd-json
//! - `validation` - Structured validation errors
//! - `config` - TOML configuration
//! - `types` - Path parameter types and conversion
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod api;
pub mod config;
pub mod error;
pub mod json;
pub mod middleware;
pub mod registry;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod server;
pub mod store;
pub mod types;
pub mod validation;
pub mod vehicle;

pub use config::{CapacityConfig, Config, StoreConfig};
pub use error::{Error, Result};
pub use json::{parse_body, to_json};
pub use middleware::{
    CorsMiddleware, LoggingMiddleware, Middleware, MiddlewareChain, TimingMiddleware,
};
pub use registry::{AdmissionError, AdmissionResult, Occupancy, VehicleRegistry};
pub use request::ApiRequest;
pub use response::ApiResponse;
pub use route::RouteInfo;
pub use router::{Method, Router};
pub use server::Server;
pub use store::{MemoryStore, RecordStore, SqliteStore};
pub use types::{ParamType, ParamValue};
pub use validation::{FieldError, Validate, ValidationCode, ValidationErrors, ValidationResult};
pub use vehicle::{VehicleId, VehicleRecord, VehicleType};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
