//! # Route Metadata
//!
//! What the router remembers about one registered route.

use crate::error::Result;
use crate::router::HandlerId;
use crate::types::{parse_param_pattern, ParamType};
use std::collections::HashMap;

/// Route metadata containing handler and type information
#[derive(Debug, Clone)]
pub struct RouteInfo {
    /// Unique handler identifier
    pub handler_id: HandlerId,
    /// Pattern as registered (e.g., "/api/vehicles/{id:int}")
    pub path_pattern: String,
    /// Pattern handed to matchit (e.g., "/api/vehicles/{id}")
    pub match_pattern: String,
    /// Parameter name to type mapping
    pub param_types: HashMap<String, ParamType>,
    /// Whether a bearer token is required
    pub auth_required: bool,
}

impl RouteInfo {
    /// Parse a path pattern into route metadata
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` for an unknown type specifier.
    pub fn new(handler_id: HandlerId, path: &str, auth_required: bool) -> Result<Self> {
        let mut param_types = HashMap::new();
        let mut segments = Vec::new();

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            match parse_param_pattern(segment)? {
                Some((name, param_type)) => {
                    segments.push(format!("{{{name}}}"));
                    param_types.insert(name, param_type);
                }
                None => segments.push(segment.to_string()),
            }
        }

        Ok(Self {
            handler_id,
            path_pattern: path.to_string(),
            match_pattern: format!("/{}", segments.join("/")),
            param_types,
            auth_required,
        })
    }

    /// Declared type of a parameter, `String` when undeclared
    #[must_use]
    pub fn param_type(&self, name: &str) -> ParamType {
        self.param_types.get(name).copied().unwrap_or_default()
    }
}
