//! Parameter validation behind one interface.
//!
//! Two interchangeable backends — declarative parameter types and generic
//! JSON Schema rules — selected by a single process-wide config switch. Both
//! must agree on the success/failure boolean; they differ only in per-field
//! error detail. Validation never panics or returns `Err`: the outcome is
//! always a discriminated ok/violations struct.

pub mod declarative;
pub mod schema;

use crate::registry::ToolSpec;
use crate::types::{FieldViolation, ValidationBackend};
use serde_json::Value;

pub use declarative::{DeclarativeValidator, ParamDef, ParamType};
pub use schema::SchemaValidator;

/// Discriminated validation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub ok: bool,
    pub errors: Vec<FieldViolation>,
}

impl ValidationOutcome {
    pub fn ok() -> Self {
        Self {
            ok: true,
            errors: Vec::new(),
        }
    }

    pub fn fail(errors: Vec<FieldViolation>) -> Self {
        Self { ok: false, errors }
    }
}

/// One validation backend.
pub trait Validator: Send + Sync + std::fmt::Debug {
    /// Backend name, recorded per call for metrics.
    fn name(&self) -> &'static str;

    /// Check `params` against the tool's declared input shape.
    fn validate(&self, tool: &ToolSpec, params: &Value) -> ValidationOutcome;
}

/// Build the configured backend.
pub fn build(backend: ValidationBackend) -> Box<dyn Validator> {
    match backend {
        ValidationBackend::Declarative => Box::new(DeclarativeValidator),
        ValidationBackend::Schema => Box::new(SchemaValidator::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ToolRegistry;

    /// The backends may disagree on error detail but never on the boolean.
    #[test]
    fn backends_agree_on_accept_reject() {
        let declarative = build(ValidationBackend::Declarative);
        let schema = build(ValidationBackend::Schema);
        let registry = ToolRegistry::standard();

        let cases = vec![
            ("catalog.get", serde_json::json!({"id": "x"}), true),
            ("catalog.get", serde_json::json!({}), false),
            ("catalog.get", serde_json::json!({"id": 42}), false),
            ("catalog.get", serde_json::json!({"id": "x", "extra": 1}), false),
            (
                "catalog.add",
                serde_json::json!({"id": "a", "title": "t", "body": "b"}),
                true,
            ),
            ("catalog.add", serde_json::json!({"id": "a"}), false),
            ("catalog.remove", serde_json::json!({"ids": ["a", "b"]}), true),
            ("catalog.remove", serde_json::json!({"ids": [1]}), false),
            ("usage.track", serde_json::json!({"id": "e"}), true),
        ];

        for (method, params, expect_ok) in cases {
            let tool = registry.get(method).unwrap();
            let d = declarative.validate(tool, &params);
            let s = schema.validate(tool, &params);
            assert_eq!(
                d.ok, expect_ok,
                "declarative disagrees on {} {:?}",
                method, params
            );
            assert_eq!(s.ok, expect_ok, "schema disagrees on {} {:?}", method, params);
        }
    }

    #[test]
    fn backend_names_differ() {
        assert_ne!(
            build(ValidationBackend::Declarative).name(),
            build(ValidationBackend::Schema).name()
        );
    }
}
