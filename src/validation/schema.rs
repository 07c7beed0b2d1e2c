//! JSON Schema validator backend.
//!
//! Compiles each tool's projected input schema once and caches the compiled
//! validator by tool name; the registry is immutable after startup so the
//! cache never needs invalidation.

use crate::registry::ToolSpec;
use crate::types::FieldViolation;
use crate::validation::{ValidationOutcome, Validator};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// The schema-rule backend.
#[derive(Debug, Default)]
pub struct SchemaValidator {
    compiled: Mutex<HashMap<String, std::sync::Arc<jsonschema::Validator>>>,
}

impl SchemaValidator {
    fn compiled_for(&self, tool: &ToolSpec) -> Option<std::sync::Arc<jsonschema::Validator>> {
        let mut cache = match self.compiled.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(validator) = cache.get(&tool.name) {
            return Some(std::sync::Arc::clone(validator));
        }

        let schema = tool.input_schema();
        match jsonschema::validator_for(&schema) {
            Ok(validator) => {
                let validator = std::sync::Arc::new(validator);
                cache.insert(tool.name.clone(), std::sync::Arc::clone(&validator));
                Some(validator)
            }
            Err(e) => {
                // A registry schema that fails to compile is a programming
                // error; log it and fall back to accepting the call rather
                // than failing every request to this method.
                tracing::error!("Schema for tool '{}' failed to compile: {}", tool.name, e);
                None
            }
        }
    }
}

impl Validator for SchemaValidator {
    fn name(&self) -> &'static str {
        "schema"
    }

    fn validate(&self, tool: &ToolSpec, params: &Value) -> ValidationOutcome {
        if tool.params.is_empty() {
            return ValidationOutcome::ok();
        }

        let Some(validator) = self.compiled_for(tool) else {
            return ValidationOutcome::ok();
        };

        let errors: Vec<FieldViolation> = validator
            .iter_errors(params)
            .map(|e| {
                FieldViolation::new(
                    e.instance_path.to_string(),
                    schema_rule_name(&e),
                    e.to_string(),
                )
            })
            .collect();

        if errors.is_empty() {
            ValidationOutcome::ok()
        } else {
            ValidationOutcome::fail(errors)
        }
    }
}

fn schema_rule_name(error: &jsonschema::ValidationError<'_>) -> String {
    // Keyword kind names are long; keep just the discriminating keyword.
    let debug = format!("{:?}", error.kind);
    debug
        .split([' ', '(', '{'])
        .next()
        .unwrap_or("schema")
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::declarative::{ParamDef, ParamType};

    fn tool() -> ToolSpec {
        ToolSpec::read(
            "test.echo",
            "Echo",
            vec![
                ParamDef::required("text", ParamType::String, "Text to echo"),
                ParamDef::optional("count", ParamType::Int, "Repeat count"),
            ],
        )
    }

    #[test]
    fn accepts_valid_params() {
        let v = SchemaValidator::default();
        assert!(v.validate(&tool(), &serde_json::json!({"text": "hi"})).ok);
    }

    #[test]
    fn rejects_missing_required_and_unknown() {
        let v = SchemaValidator::default();
        let out = v.validate(&tool(), &serde_json::json!({"bogus": 1}));
        assert!(!out.ok);
        assert!(!out.errors.is_empty());
    }

    #[test]
    fn rejects_wrong_type_with_instance_path() {
        let v = SchemaValidator::default();
        let out = v.validate(&tool(), &serde_json::json!({"text": 42}));
        assert!(!out.ok);
        assert!(out.errors.iter().any(|e| e.path == "/text"));
    }

    #[test]
    fn caches_compiled_schema() {
        let v = SchemaValidator::default();
        let t = tool();
        v.validate(&t, &serde_json::json!({"text": "a"}));
        v.validate(&t, &serde_json::json!({"text": "b"}));
        assert_eq!(v.compiled.lock().unwrap().len(), 1);
    }
}
