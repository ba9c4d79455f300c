//! Document validator
//!
//! Structural checks run synchronously inside every append. A payload must be
//! non-empty, decode as a single JSON value with finite numbers, and match
//! its document type's top-level shape. Nothing semantic is checked here;
//! that belongs to the type's transform.

use crate::domain::document::{DocumentShape, DocumentType};
use crate::domain::errors::ValidationError;
use serde_json::Value;
use std::collections::HashMap;

/// Per-type structural validator
#[derive(Debug, Clone, Default)]
pub struct DocumentValidator {
    overrides: HashMap<DocumentType, DocumentShape>,
}

impl DocumentValidator {
    /// Validator using each type's built-in shape
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the shape required for one document type
    pub fn with_shape(mut self, document_type: DocumentType, shape: DocumentShape) -> Self {
        self.overrides.insert(document_type, shape);
        self
    }

    /// Shape currently required for a document type
    pub fn shape_for(&self, document_type: DocumentType) -> DocumentShape {
        self.overrides
            .get(&document_type)
            .copied()
            .unwrap_or_else(|| document_type.shape())
    }

    /// Validate a payload and return the decoded document
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Empty`], [`ValidationError::Malformed`], or
    /// [`ValidationError::WrongShape`].
    pub fn validate(
        &self,
        document_type: DocumentType,
        payload: &str,
    ) -> Result<Value, ValidationError> {
        if payload.trim().is_empty() {
            return Err(ValidationError::Empty {
                document_type: document_type.to_string(),
            });
        }

        // serde_json refuses NaN/Infinity literals and out-of-range numbers,
        // which covers the non-finite case
        let document: Value =
            serde_json::from_str(payload).map_err(|e| ValidationError::Malformed {
                document_type: document_type.to_string(),
                reason: e.to_string(),
            })?;

        let expected = self.shape_for(document_type);
        let matches = match expected {
            DocumentShape::Object => document.is_object(),
            DocumentShape::Array => document.is_array(),
            DocumentShape::Any => true,
        };

        if !matches {
            return Err(ValidationError::WrongShape {
                document_type: document_type.to_string(),
                expected: expected.as_str().to_string(),
                found: json_kind(&document).to_string(),
            });
        }

        Ok(document)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("{\"participant\":\"abc\"}" ; "object")]
    #[test_case("  {\"a\": [1, 2.5, null]}\n" ; "surrounding whitespace")]
    #[test_case("{}" ; "empty object")]
    fn test_accepts_objects(payload: &str) {
        let validator = DocumentValidator::new();
        assert!(validator.validate(DocumentType::Enrollment, payload).is_ok());
    }

    #[test_case("" ; "empty")]
    #[test_case("   \n\t" ; "whitespace only")]
    fn test_rejects_empty(payload: &str) {
        let err = DocumentValidator::new()
            .validate(DocumentType::Fhir, payload)
            .unwrap_err();
        assert!(matches!(err, ValidationError::Empty { .. }));
    }

    #[test_case("{\"a\":" ; "truncated")]
    #[test_case("{\"a\": NaN}" ; "nan literal")]
    #[test_case("{\"a\": Infinity}" ; "infinity literal")]
    #[test_case("{\"a\": 1e400}" ; "out of range number")]
    #[test_case("{} {}" ; "trailing document")]
    fn test_rejects_malformed(payload: &str) {
        let err = DocumentValidator::new()
            .validate(DocumentType::Clinical, payload)
            .unwrap_err();
        assert!(matches!(err, ValidationError::Malformed { .. }), "{err:?}");
    }

    #[test_case("[1,2,3]", "array" ; "array")]
    #[test_case("\"text\"", "string" ; "string")]
    #[test_case("42", "number" ; "number")]
    #[test_case("null", "null" ; "null")]
    fn test_rejects_wrong_shape(payload: &str, found_kind: &str) {
        let err = DocumentValidator::new()
            .validate(DocumentType::Fhir, payload)
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::WrongShape {
                document_type: "fhir".to_string(),
                expected: "object".to_string(),
                found: found_kind.to_string(),
            }
        );
    }

    #[test]
    fn test_shape_override() {
        let validator =
            DocumentValidator::new().with_shape(DocumentType::Manifest, DocumentShape::Array);

        assert!(validator.validate(DocumentType::Manifest, "[1]").is_ok());
        assert!(validator.validate(DocumentType::Manifest, "{}").is_err());
        assert!(validator.validate(DocumentType::Kit, "{}").is_ok());
    }
}
