//! Schema Validator port - validates tool call parameters against a tool's
//! declared JSON Schema (§4.1's `validate(tool_name, params)` contract).
//!
//! The domain depends on this trait; the Tool Bridge adapter provides the
//! implementation that walks `AvailableToolInfo.parameters`.

use serde_json::Value;
use thiserror::Error;

use crate::domain::AvailableToolInfo;

/// Port for validating tool call parameters against their schema.
pub trait ToolParameterValidator: Send + Sync {
    /// Validates `params` against `tool`'s declared schema: the tool must
    /// exist (checked by the caller before invoking this), params must be a
    /// JSON object, every required property must be present, and every
    /// present property's value must match its declared JSON type.
    fn validate(&self, tool: &AvailableToolInfo, params: &Value) -> Result<(), SchemaValidationError>;
}

/// Errors surfaced during tool parameter validation.
///
/// # Security
///
/// These carry full detail for logging. When returning errors over the
/// Client Channel, use `to_client_message()` for a sanitized rendering.
#[derive(Debug, Clone, Error)]
pub enum SchemaValidationError {
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("parameters must be a JSON object, got {actual}")]
    ParametersNotObject { actual: String },

    #[error("missing required parameters for '{tool_name}': {fields:?}")]
    MissingRequiredParameters { tool_name: String, fields: Vec<(String, String)> },

    #[error("invalid type for field {field}: expected {expected}, got {actual}")]
    InvalidType { field: String, expected: String, actual: String },

    #[error("validation errors: {0:?}")]
    Multiple(Vec<SchemaValidationError>),
}

impl SchemaValidationError {
    /// Renders a client-safe message. Per §4.1 the error MUST include the
    /// full parameter schema and a concrete example call; that augmentation
    /// happens at the Tool Bridge call site (it has the schema in hand),
    /// this method only sanitizes the validation failure itself.
    pub fn to_client_message(&self) -> String {
        match self {
            SchemaValidationError::ToolNotFound(name) => format!("Tool not found: {name}"),
            SchemaValidationError::ParametersNotObject { .. } => "Parameters must be a JSON object".to_string(),
            SchemaValidationError::MissingRequiredParameters { tool_name, fields } => {
                let names: Vec<&str> = fields.iter().map(|(name, _)| name.as_str()).collect();
                let mut msg = format!("Missing required parameters for '{tool_name}': {names:?}\nRequired parameters:\n");
                for (name, ty) in fields {
                    msg.push_str(&format!("  - {name} ({ty})\n"));
                }
                msg.trim_end().to_string()
            }
            SchemaValidationError::InvalidType { field, expected, .. } => {
                format!("Invalid type for field '{field}': expected {expected}")
            }
            SchemaValidationError::Multiple(errors) => {
                errors.first().map(|e| e.to_client_message()).unwrap_or_else(|| "Validation failed".to_string())
            }
        }
    }

    pub fn error_count(&self) -> usize {
        match self {
            SchemaValidationError::Multiple(errors) => errors.len(),
            _ => 1,
        }
    }
}

impl PartialEq for SchemaValidationError {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_parameters_names_tool_and_lists_types() {
        let err = SchemaValidationError::MissingRequiredParameters {
            tool_name: "write_file".to_string(),
            fields: vec![("content".to_string(), "string".to_string())],
        };
        let msg = err.to_client_message();
        assert!(msg.contains("Missing required parameters"));
        assert!(msg.contains("write_file"));
        assert!(msg.contains("- content (string)"));
    }

    #[test]
    fn invalid_type_hides_actual_value_in_client_message() {
        let err = SchemaValidationError::InvalidType {
            field: "count".to_string(),
            expected: "integer".to_string(),
            actual: "string".to_string(),
        };
        let msg = err.to_client_message();
        assert!(msg.contains("expected integer"));
        assert!(!msg.contains("got"));
    }

    #[test]
    fn multiple_errors_returns_first_in_client_message() {
        let errors = vec![
            SchemaValidationError::MissingRequiredParameters { tool_name: "t".to_string(), fields: vec![("first".to_string(), "string".to_string())] },
            SchemaValidationError::InvalidType { field: "second".to_string(), expected: "integer".to_string(), actual: "string".to_string() },
        ];
        let err = SchemaValidationError::Multiple(errors);
        assert!(err.to_client_message().contains("Missing required parameters"));
        assert_eq!(err.error_count(), 2);
    }

    #[test]
    fn parameters_not_object_is_sanitized() {
        let err = SchemaValidationError::ParametersNotObject { actual: "array".to_string() };
        assert_eq!(err.to_client_message(), "Parameters must be a JSON object");
    }
}
