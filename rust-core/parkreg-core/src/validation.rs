//! # Validation Module
//!
//! Field-level checks on incoming vehicle records, reported as structured
//! errors before the registry sees the record.

use crate::vehicle::VehicleRecord;
use serde::Serialize;
use std::collections::HashMap;

/// Longest plate accepted, in characters
pub const MAX_PLATE_LEN: usize = 12;

/// Error code for categorizing validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    /// Required field is missing or blank
    Required,
    /// Value is too long
    TooLong,
    /// Value doesn't match the expected format
    InvalidFormat,
}

/// A single validation error for a specific field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name as it appears on the wire
    pub field: String,
    /// Human-readable error message
    pub message: String,
    /// Machine-readable error code
    pub code: ValidationCode,
}

impl FieldError {
    /// Create a new field error
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: ValidationCode) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code,
        }
    }

    /// Create a "required field" error
    pub fn required(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            message: format!("{field} is required"),
            field,
            code: ValidationCode::Required,
        }
    }

    /// Create a "too long" error
    pub fn too_long(field: impl Into<String>, max: usize) -> Self {
        let field = field.into();
        Self {
            message: format!("{field} must be at most {max} characters"),
            field,
            code: ValidationCode::TooLong,
        }
    }
}

/// Collection of validation errors for one request
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationErrors {
    /// List of field-level errors
    pub field_errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Create an empty error collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field error
    pub fn add(&mut self, error: FieldError) {
        self.field_errors.push(error);
    }

    /// Check if there are any errors
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.field_errors.is_empty()
    }

    /// Get the number of errors
    #[must_use]
    pub fn len(&self) -> usize {
        self.field_errors.len()
    }

    /// Group errors by field
    #[must_use]
    pub fn by_field(&self) -> HashMap<&str, Vec<&FieldError>> {
        let mut map: HashMap<&str, Vec<&FieldError>> = HashMap::new();
        for error in &self.field_errors {
            map.entry(error.field.as_str()).or_default().push(error);
        }
        map
    }

    /// `Ok` when empty, otherwise the collected errors
    ///
    /// # Errors
    ///
    /// Returns `self` if any error was collected.
    pub fn into_result(self) -> ValidationResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Result type for validation operations
pub type ValidationResult<T> = std::result::Result<T, ValidationErrors>;

/// Types that can check their own fields
pub trait Validate {
    /// Collect every field error
    ///
    /// # Errors
    ///
    /// Returns all field errors found, never an empty collection.
    fn validate(&self) -> ValidationResult<()>;
}

impl Validate for VehicleRecord {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = ValidationErrors::new();
        let plate = self.plate.trim();

        if plate.is_empty() {
            errors.add(FieldError::required("plate"));
        } else {
            if plate.chars().count() > MAX_PLATE_LEN {
                errors.add(FieldError::too_long("plate", MAX_PLATE_LEN));
            }
            if !plate.chars().all(|c| c.is_alphanumeric() || c == '-' || c == ' ') {
                errors.add(FieldError::new(
                    "plate",
                    "plate may only contain letters, digits, spaces and dashes",
                    ValidationCode::InvalidFormat,
                ));
            }
        }

        errors.into_result()
    }
}
