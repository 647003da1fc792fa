//! Validation Adapters - Schema validation implementations.
//!
//! Contains adapters for validating tool call parameters against a tool's
//! declared JSON Schema.

mod json_schema_validator;

pub use json_schema_validator::JsonSchemaValidator;
