//! Runtime type validation of untyped JSON values.

use crate::error::AiError;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;

/// Validates untyped JSON into a typed value.
pub trait Schema<T>: Send + Sync {
    /// Convert `value` into `T`, or fail with [`AiError::TypeValidation`]
    fn validate(&self, value: &serde_json::Value) -> Result<T, AiError>;

    /// JSON schema describing accepted values, for prompts and response formats
    fn json_schema(&self) -> serde_json::Value;
}

/// Schema derived from a Rust type: `serde` validates, `schemars` describes.
pub struct JsonSchemaOf<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonSchemaOf<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonSchemaOf<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonSchemaOf<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonSchemaOf<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsonSchemaOf<{}>", std::any::type_name::<T>())
    }
}

/// Shorthand for `JsonSchemaOf::<T>::new()`
pub fn schema_of<T>() -> JsonSchemaOf<T> {
    JsonSchemaOf::new()
}

impl<T> Schema<T> for JsonSchemaOf<T>
where
    T: DeserializeOwned + schemars::JsonSchema,
{
    fn validate(&self, value: &serde_json::Value) -> Result<T, AiError> {
        T::deserialize(value).map_err(|e| AiError::type_validation(value.clone(), e.to_string()))
    }

    fn json_schema(&self) -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(T)).unwrap_or(serde_json::Value::Null)
    }
}

/// Accepts any JSON value unchanged; carries a caller-supplied JSON schema.
#[derive(Debug, Clone, Default)]
pub struct UncheckedSchema {
    json_schema: serde_json::Value,
}

impl UncheckedSchema {
    pub fn new(json_schema: serde_json::Value) -> Self {
        Self { json_schema }
    }
}

impl Schema<serde_json::Value> for UncheckedSchema {
    fn validate(&self, value: &serde_json::Value) -> Result<serde_json::Value, AiError> {
        Ok(value.clone())
    }

    fn json_schema(&self) -> serde_json::Value {
        self.json_schema.clone()
    }
}

/// Outcome of a non-failing validation
#[derive(Debug, Clone)]
pub enum ValidationResult<T> {
    Valid(T),
    Invalid(AiError),
}

impl<T> ValidationResult<T> {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid(_))
    }

    pub fn into_result(self) -> Result<T, AiError> {
        match self {
            ValidationResult::Valid(value) => Ok(value),
            ValidationResult::Invalid(error) => Err(error),
        }
    }
}

/// Validate `value` against `schema`
pub fn validate_types<T>(value: &serde_json::Value, schema: &dyn Schema<T>) -> Result<T, AiError> {
    schema.validate(value)
}

/// Validate without failing
pub fn safe_validate_types<T>(value: &serde_json::Value, schema: &dyn Schema<T>) -> ValidationResult<T> {
    match schema.validate(value) {
        Ok(value) => ValidationResult::Valid(value),
        Err(error) => ValidationResult::Invalid(error),
    }
}

/// Parse `text` as untyped JSON
pub fn parse_json(text: &str) -> Result<serde_json::Value, AiError> {
    serde_json::from_str(text).map_err(|e| AiError::json_parse(text, e.to_string()))
}

/// Parse `text` as JSON and validate it against `schema`
pub fn parse_json_with<T>(text: &str, schema: &dyn Schema<T>) -> Result<T, AiError> {
    let value = parse_json(text)?;
    validate_types(&value, schema)
}

/// Parse and validate without failing
pub fn safe_parse_json<T>(text: &str, schema: &dyn Schema<T>) -> ValidationResult<T> {
    match parse_json(text) {
        Ok(value) => safe_validate_types(&value, schema),
        Err(error) => ValidationResult::Invalid(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, schemars::JsonSchema, PartialEq)]
    struct City {
        name: String,
        population: u64,
    }

    #[test]
    fn test_validates_matching_value() {
        let value = serde_json::json!({"name": "Lisbon", "population": 545000});
        let city = validate_types(&value, &schema_of::<City>()).unwrap();
        assert_eq!(city.name, "Lisbon");
    }

    #[test]
    fn test_reports_mismatch_with_value() {
        let value = serde_json::json!({"name": "Lisbon"});
        match validate_types(&value, &schema_of::<City>()) {
            Err(AiError::TypeValidation { value: v, message }) => {
                assert_eq!(v, value);
                assert!(message.contains("population"));
            }
            other => panic!("expected type validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_json_schema_describes_fields() {
        let schema = schema_of::<City>().json_schema();
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"].get("population").is_some());
    }

    #[test]
    fn test_parse_json_errors() {
        assert!(matches!(parse_json("{oops"), Err(AiError::JsonParse { .. })));
        assert!(!safe_parse_json("[1,2]", &schema_of::<City>()).is_valid());
        let unchecked = UncheckedSchema::new(serde_json::json!({}));
        assert_eq!(
            parse_json_with("[1,2]", &unchecked).unwrap(),
            serde_json::json!([1, 2])
        );
    }
}
