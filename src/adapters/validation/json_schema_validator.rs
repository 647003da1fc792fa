//! JSON Schema Validator - implementation of `ToolParameterValidator`.
//!
//! Validates tool call parameters against a tool's declared JSON Schema
//! object (`properties`, `required`, per-property `type`), per §4.1. No
//! external schema-validation crate is used: the shape Tool Bridge needs
//! to check is a narrow subset (object-ness, required presence, primitive
//! type match), so a manual walk keeps the dependency list unchanged.

use serde_json::Value;

use crate::domain::AvailableToolInfo;
use crate::ports::{SchemaValidationError, ToolParameterValidator};

#[derive(Debug, Default)]
pub struct JsonSchemaValidator;

impl JsonSchemaValidator {
    pub fn new() -> Self {
        Self
    }

    fn validate_type(value: &Value, expected: &str) -> bool {
        match expected {
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            _ => true, // unknown declared type: allow it
        }
    }
}

impl ToolParameterValidator for JsonSchemaValidator {
    fn validate(&self, tool: &AvailableToolInfo, params: &Value) -> Result<(), SchemaValidationError> {
        let Some(obj) = params.as_object() else {
            return Err(SchemaValidationError::ParametersNotObject { actual: json_type_name(params) });
        };

        let mut errors = Vec::new();
        let properties = tool.properties();

        let missing_fields: Vec<(String, String)> = tool
            .required_params()
            .into_iter()
            .filter(|field| !obj.contains_key(field))
            .map(|field| {
                let ty = properties.get(&field).and_then(|p| p.get("type")).and_then(Value::as_str).unwrap_or("unknown").to_string();
                (field, ty)
            })
            .collect();
        if !missing_fields.is_empty() {
            errors.push(SchemaValidationError::MissingRequiredParameters { tool_name: tool.name.clone(), fields: missing_fields });
        }

        for (field, value) in obj {
            let Some(schema) = properties.get(field) else {
                continue; // unexpected params are tolerated, not an error (§4.1)
            };
            if let Some(expected) = schema.get("type").and_then(Value::as_str) {
                if !Self::validate_type(value, expected) {
                    errors.push(SchemaValidationError::InvalidType {
                        field: field.clone(),
                        expected: expected.to_string(),
                        actual: json_type_name(value),
                    });
                }
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.into_iter().next().unwrap()),
            _ => Err(SchemaValidationError::Multiple(errors)),
        }
    }
}

fn json_type_name(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> AvailableToolInfo {
        AvailableToolInfo::new(
            "write_file",
            "filesystem-server",
            "Write a file",
            serde_json::json!({
                "properties": {
                    "path": {"type": "string"},
                    "content": {"type": "string"},
                    "overwrite": {"type": "boolean"},
                },
                "required": ["path", "content"],
            }),
        )
    }

    #[test]
    fn accepts_valid_params() {
        let validator = JsonSchemaValidator::new();
        let params = serde_json::json!({"path": "a.txt", "content": "hi"});
        assert!(validator.validate(&tool(), &params).is_ok());
    }

    #[test]
    fn rejects_non_object_params() {
        let validator = JsonSchemaValidator::new();
        let params = serde_json::json!("not an object");
        let err = validator.validate(&tool(), &params).unwrap_err();
        assert!(matches!(err, SchemaValidationError::ParametersNotObject { .. }));
    }

    #[test]
    fn reports_missing_required_fields() {
        let validator = JsonSchemaValidator::new();
        let params = serde_json::json!({"path": "a.txt"});
        let err = validator.validate(&tool(), &params).unwrap_err();
        assert_eq!(
            err,
            SchemaValidationError::MissingRequiredParameters { tool_name: "write_file".to_string(), fields: vec![("content".to_string(), "string".to_string())] }
        );
    }

    #[test]
    fn reports_type_mismatch() {
        let validator = JsonSchemaValidator::new();
        let params = serde_json::json!({"path": "a.txt", "content": "hi", "overwrite": "yes"});
        let err = validator.validate(&tool(), &params).unwrap_err();
        assert!(matches!(err, SchemaValidationError::InvalidType { field, .. } if field == "overwrite"));
    }

    #[test]
    fn collects_multiple_errors() {
        let validator = JsonSchemaValidator::new();
        let params = serde_json::json!({"overwrite": "yes"});
        let err = validator.validate(&tool(), &params).unwrap_err();
        // one combined "missing required parameters" error (path, content) plus the bad overwrite type
        assert_eq!(err.error_count(), 2);
    }

    #[test]
    fn tolerates_unexpected_extra_params() {
        let validator = JsonSchemaValidator::new();
        let params = serde_json::json!({"path": "a.txt", "content": "hi", "extra": 123});
        assert!(validator.validate(&tool(), &params).is_ok());
    }
}
