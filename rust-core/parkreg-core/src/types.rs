//! # Path Parameter Types
//!
//! Route patterns may declare a parameter type, e.g. `/api/vehicles/{id:int}`.
//! A segment that does not convert makes the route not match.

use crate::error::{Error, Result};
use std::fmt;

/// Declared type of a path parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParamType {
    /// Raw segment, no conversion
    #[default]
    String,
    /// Signed 64-bit integer
    Int,
}

impl ParamType {
    /// Parse type specifier from route pattern (e.g., "int" from "{id:int}")
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` for an unknown specifier.
    pub fn from_specifier(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "str" | "string" => Ok(Self::String),
            "int" | "integer" | "i64" => Ok(Self::Int),
            other => Err(Error::InvalidRoutePattern {
                pattern: s.to_string(),
                reason: format!("unknown parameter type '{other}'"),
            }),
        }
    }

    /// Get the type name for error messages
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Converted parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Unconverted segment
    String(String),
    /// Integer segment
    Int(i64),
}

impl ParamValue {
    /// Get as i64 if Int variant
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::String(_) => None,
        }
    }

    /// Get as str if String variant
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Int(_) => None,
        }
    }
}

/// Convert a raw segment to its declared type
///
/// # Errors
///
/// Returns `Error::InvalidParam` if the segment does not parse.
pub fn convert_param(raw: &str, param_type: ParamType) -> Result<ParamValue> {
    match param_type {
        ParamType::String => Ok(ParamValue::String(raw.to_string())),
        ParamType::Int => raw
            .parse::<i64>()
            .map(ParamValue::Int)
            .map_err(|_| Error::InvalidParam {
                value: raw.to_string(),
                expected: ParamType::Int.type_name(),
            }),
    }
}

/// Split a `{name}` / `{name:type}` segment into name and type
///
/// Returns `Ok(None)` for a static segment.
///
/// # Errors
///
/// Returns `Error::InvalidRoutePattern` for an unknown type specifier.
pub fn parse_param_pattern(segment: &str) -> Result<Option<(String, ParamType)>> {
    let Some(inner) = segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
    else {
        return Ok(None);
    };

    let (name, spec) = inner.split_once(':').unwrap_or((inner, ""));
    Ok(Some((name.to_string(), ParamType::from_specifier(spec)?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_type_from_specifier() {
        assert_eq!(ParamType::from_specifier("int").unwrap(), ParamType::Int);
        assert_eq!(ParamType::from_specifier("INT").unwrap(), ParamType::Int);
        assert_eq!(ParamType::from_specifier("").unwrap(), ParamType::String);
        assert!(ParamType::from_specifier("uuid").is_err());
    }

    #[test]
    fn test_convert_int() {
        assert_eq!(convert_param("42", ParamType::Int).unwrap(), ParamValue::Int(42));
        assert!(matches!(
            convert_param("abc", ParamType::Int),
            Err(Error::InvalidParam { .. })
        ));
    }

    #[test]
    fn test_convert_string() {
        let value = convert_param("AAA111", ParamType::String).unwrap();
        assert_eq!(value.as_str(), Some("AAA111"));
        assert_eq!(value.as_int(), None);
    }

    #[test]
    fn test_parse_param_pattern() {
        assert_eq!(
            parse_param_pattern("{id}").unwrap(),
            Some(("id".to_string(), ParamType::String))
        );
        assert_eq!(
            parse_param_pattern("{id:int}").unwrap(),
            Some(("id".to_string(), ParamType::Int))
        );
        assert_eq!(parse_param_pattern("vehicles").unwrap(), None);
    }
}
