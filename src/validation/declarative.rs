//! Declarative-type validator backend.
//!
//! Validates parameters against the tool's declared `ParamDef` list. Error
//! locality is precise: every violation carries the offending field path and
//! a short rule name.

use crate::registry::ToolSpec;
use crate::types::FieldViolation;
use crate::validation::{ValidationOutcome, Validator};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Parameter type for tool inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Int,
    Float,
    Bool,
    StringList,
    ObjectList,
    Object,
    Enum(Vec<String>),
    Optional(Box<ParamType>),
}

impl ParamType {
    /// Validate a JSON value against this parameter type.
    pub fn check(&self, value: &Value) -> Result<(), (String, String)> {
        match self {
            ParamType::String => {
                if value.is_string() {
                    Ok(())
                } else {
                    Err(type_error("string", value))
                }
            }
            ParamType::Int => {
                if value.is_i64() || value.is_u64() {
                    Ok(())
                } else {
                    Err(type_error("integer", value))
                }
            }
            ParamType::Float => {
                if value.is_number() {
                    Ok(())
                } else {
                    Err(type_error("number", value))
                }
            }
            ParamType::Bool => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    Err(type_error("boolean", value))
                }
            }
            ParamType::StringList => match value.as_array() {
                Some(arr) => {
                    for (i, item) in arr.iter().enumerate() {
                        if !item.is_string() {
                            return Err((
                                "type".to_string(),
                                format!(
                                    "expected string at index {}, got {}",
                                    i,
                                    value_type_name(item)
                                ),
                            ));
                        }
                    }
                    Ok(())
                }
                None => Err(type_error("array", value)),
            },
            ParamType::ObjectList => match value.as_array() {
                Some(arr) => {
                    for (i, item) in arr.iter().enumerate() {
                        if !item.is_object() {
                            return Err((
                                "type".to_string(),
                                format!(
                                    "expected object at index {}, got {}",
                                    i,
                                    value_type_name(item)
                                ),
                            ));
                        }
                    }
                    Ok(())
                }
                None => Err(type_error("array", value)),
            },
            ParamType::Object => {
                if value.is_object() {
                    Ok(())
                } else {
                    Err(type_error("object", value))
                }
            }
            ParamType::Enum(variants) => match value.as_str() {
                Some(s) if variants.iter().any(|v| v == s) => Ok(()),
                Some(s) => Err((
                    "enum".to_string(),
                    format!(
                        "invalid value '{}', expected one of: {}",
                        s,
                        variants.join(", ")
                    ),
                )),
                None => Err(type_error("string", value)),
            },
            ParamType::Optional(inner) => {
                if value.is_null() {
                    Ok(())
                } else {
                    inner.check(value)
                }
            }
        }
    }

    /// JSON Schema fragment for this type (shared source of truth with the
    /// schema backend).
    pub fn json_schema(&self) -> Value {
        match self {
            ParamType::String => serde_json::json!({"type": "string"}),
            ParamType::Int => serde_json::json!({"type": "integer"}),
            ParamType::Float => serde_json::json!({"type": "number"}),
            ParamType::Bool => serde_json::json!({"type": "boolean"}),
            ParamType::StringList => {
                serde_json::json!({"type": "array", "items": {"type": "string"}})
            }
            ParamType::ObjectList => {
                serde_json::json!({"type": "array", "items": {"type": "object"}})
            }
            ParamType::Object => serde_json::json!({"type": "object"}),
            ParamType::Enum(variants) => serde_json::json!({"type": "string", "enum": variants}),
            ParamType::Optional(inner) => {
                serde_json::json!({"anyOf": [inner.json_schema(), {"type": "null"}]})
            }
        }
    }
}

fn type_error(expected: &str, got: &Value) -> (String, String) {
    (
        "type".to_string(),
        format!("expected {}, got {}", expected, value_type_name(got)),
    )
}

fn value_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A single parameter definition for a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

impl ParamDef {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required: true,
        }
    }

    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required: false,
        }
    }
}

/// The declarative backend.
#[derive(Debug, Default)]
pub struct DeclarativeValidator;

impl Validator for DeclarativeValidator {
    fn name(&self) -> &'static str {
        "declarative"
    }

    fn validate(&self, tool: &ToolSpec, params: &Value) -> ValidationOutcome {
        // Methods without a declared shape are accepted by default.
        if tool.params.is_empty() {
            return ValidationOutcome::ok();
        }

        let param_map = match params.as_object() {
            Some(map) => map,
            None => {
                return ValidationOutcome::fail(vec![FieldViolation::new(
                    "",
                    "type",
                    "parameters must be a JSON object",
                )]);
            }
        };

        let mut errors = Vec::new();

        for def in &tool.params {
            if def.required && !param_map.contains_key(&def.name) {
                errors.push(FieldViolation::new(
                    format!("/{}", def.name),
                    "required",
                    format!("missing required parameter: {}", def.name),
                ));
            }
        }

        let known: HashMap<&str, &ParamDef> =
            tool.params.iter().map(|p| (p.name.as_str(), p)).collect();

        for (key, value) in param_map {
            match known.get(key.as_str()) {
                Some(def) => {
                    if let Err((rule, message)) = def.param_type.check(value) {
                        errors.push(FieldViolation::new(format!("/{}", key), rule, message));
                    }
                }
                None => errors.push(FieldViolation::new(
                    format!("/{}", key),
                    "unknown",
                    format!("unknown parameter: {}", key),
                )),
            }
        }

        if errors.is_empty() {
            ValidationOutcome::ok()
        } else {
            ValidationOutcome::fail(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ToolSpec;

    fn tool() -> ToolSpec {
        ToolSpec::read(
            "test.echo",
            "Echo",
            vec![
                ParamDef::required("text", ParamType::String, "Text to echo"),
                ParamDef::optional("count", ParamType::Int, "Repeat count"),
                ParamDef::optional(
                    "mode",
                    ParamType::Enum(vec!["loud".into(), "quiet".into()]),
                    "Echo mode",
                ),
            ],
        )
    }

    #[test]
    fn accepts_valid_params() {
        let v = DeclarativeValidator;
        let out = v.validate(&tool(), &serde_json::json!({"text": "hi", "count": 2}));
        assert!(out.ok, "unexpected errors: {:?}", out.errors);
    }

    #[test]
    fn missing_required_field_has_path_and_rule() {
        let v = DeclarativeValidator;
        let out = v.validate(&tool(), &serde_json::json!({}));
        assert!(!out.ok);
        assert_eq!(out.errors[0].path, "/text");
        assert_eq!(out.errors[0].rule, "required");
    }

    #[test]
    fn wrong_type_and_unknown_param_are_reported() {
        let v = DeclarativeValidator;
        let out = v.validate(&tool(), &serde_json::json!({"text": 42, "bogus": true}));
        assert!(!out.ok);
        let rules: Vec<&str> = out.errors.iter().map(|e| e.rule.as_str()).collect();
        assert!(rules.contains(&"type"));
        assert!(rules.contains(&"unknown"));
    }

    #[test]
    fn enum_rule_is_distinct() {
        let v = DeclarativeValidator;
        let out = v.validate(&tool(), &serde_json::json!({"text": "x", "mode": "shouty"}));
        assert!(!out.ok);
        assert_eq!(out.errors[0].rule, "enum");
    }

    #[test]
    fn undeclared_shape_accepts_anything() {
        let v = DeclarativeValidator;
        let bare = ToolSpec::read("test.bare", "No params", vec![]);
        assert!(v.validate(&bare, &serde_json::json!({"whatever": 1})).ok);
    }

    #[test]
    fn optional_accepts_null() {
        let pt = ParamType::Optional(Box::new(ParamType::Int));
        assert!(pt.check(&serde_json::json!(null)).is_ok());
        assert!(pt.check(&serde_json::json!(3)).is_ok());
        assert!(pt.check(&serde_json::json!("x")).is_err());
    }
}
