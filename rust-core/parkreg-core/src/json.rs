//! # JSON Bodies
//!
//! Request bodies are decoded with simd-json; responses are encoded with
//! serde_json.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Decode a request body into a typed value
///
/// simd-json parses in place, so the bytes are copied into a scratch buffer
/// first.
///
/// # Errors
///
/// Returns `Error::Decode` if the body is empty or is not valid JSON for `T`.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::Decode {
            reason: "request body is empty".to_string(),
        });
    }

    let mut scratch = body.to_vec();
    simd_json::from_slice(&mut scratch).map_err(|e| Error::Decode {
        reason: e.to_string(),
    })
}

/// Serialize a value to a JSON string
///
/// # Errors
///
/// Returns `Error::Json` if serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}
