//! Request routing: registry lookup, parameter validation, mutation gating,
//! handler invocation and error normalization onto the wire shape.

use crate::catalog::engine::CatalogEngine;
use crate::ipc::handlers::{self, HandlerContext};
use crate::metrics::Metrics;
use crate::registry::ToolRegistry;
use crate::types::{Error, Result};
use crate::validation::Validator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// One inbound request frame payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// What the connection does after a dispatch: send the response, and fan out
/// a list-changed notification when the catalog visibly moved.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub response: Value,
    pub catalog_changed: bool,
}

pub struct Dispatcher {
    engine: Arc<Mutex<CatalogEngine>>,
    registry: Arc<ToolRegistry>,
    validator: Box<dyn Validator>,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new(
        engine: Arc<Mutex<CatalogEngine>>,
        registry: Arc<ToolRegistry>,
        validator: Box<dyn Validator>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { engine, registry, validator, metrics }
    }

    /// Route one request. Never returns `Err`: every failure is folded into
    /// an error response so the connection always sees a terminal frame.
    pub async fn dispatch(&self, request: &Request) -> DispatchOutcome {
        let before = self.catalog_fingerprint().await;
        let result = self.run(&request.method, &request.params).await;
        let ok = result.is_ok();
        self.metrics.method_called(&request.method, ok);

        let catalog_changed = if ok && self.may_mutate(&request.method) {
            self.catalog_fingerprint().await != before
        } else {
            false
        };

        let response = match result {
            Ok(value) => serde_json::json!({"id": request.id, "result": value}),
            Err(err) => {
                debug!(method = %request.method, error = %err, "request failed");
                error_response(&request.id, &request.method, &err)
            }
        };
        DispatchOutcome { response, catalog_changed }
    }

    fn may_mutate(&self, method: &str) -> bool {
        // batch carries its own mutating sub-ops; repair rewrites on drift
        // even though it is not gated.
        if method == "batch" || method == "catalog.repair" {
            return true;
        }
        self.registry.get(method).is_some_and(|tool| tool.mutation)
    }

    async fn catalog_fingerprint(&self) -> Option<String> {
        let mut engine = self.engine.lock().await;
        match engine.ensure_loaded() {
            Ok(view) => Some(view.aggregate_hash.clone()),
            Err(err) => {
                warn!(error = %err, "catalog load failed while fingerprinting");
                None
            }
        }
    }

    async fn run(&self, method: &str, params: &Value) -> Result<Value> {
        if method == "batch" {
            return self.run_batch(params).await;
        }
        let tool = self
            .registry
            .get(method)
            .ok_or_else(|| Error::method_not_found(method))?;

        // Absent params mean "no arguments".
        let empty = Value::Object(serde_json::Map::new());
        let params = if params.is_null() { &empty } else { params };

        let outcome = self.validator.validate(tool, params);
        if !outcome.ok {
            self.metrics.validation_rejected();
            return Err(Error::InvalidParams {
                message: format!("invalid params for {}", method),
                violations: outcome.errors,
            });
        }

        let ctx = HandlerContext {
            engine: &self.engine,
            registry: &self.registry,
            metrics: &self.metrics,
        };
        if tool.mutation {
            let engine = self.engine.lock().await;
            if !engine.mutation_enabled() {
                return Err(Error::mutation_disabled(method));
            }
        }
        handlers::route(&ctx, method, params).await
    }

    /// Sub-operations run in order; one failing item never aborts the rest.
    async fn run_batch(&self, params: &Value) -> Result<Value> {
        let ops = params
            .get("ops")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::validation("batch requires an `ops` array"))?;
        if ops.is_empty() {
            return Err(Error::validation("batch requires at least one op"));
        }

        let mut results = Vec::with_capacity(ops.len());
        for (index, op) in ops.iter().enumerate() {
            let method = op.get("method").and_then(Value::as_str);
            let item = match method {
                None => item_error(
                    index,
                    "",
                    &Error::validation("batch op missing `method`"),
                ),
                Some("batch") => item_error(
                    index,
                    "batch",
                    &Error::validation("batch ops cannot nest"),
                ),
                Some(method) => {
                    let op_params = op.get("params").cloned().unwrap_or(Value::Null);
                    match Box::pin(self.run(method, &op_params)).await {
                        Ok(value) => serde_json::json!({
                            "index": index,
                            "method": method,
                            "ok": true,
                            "result": value,
                        }),
                        Err(err) => item_error(index, method, &err),
                    }
                }
            };
            results.push(item);
        }
        let failed = results
            .iter()
            .filter(|r| r["ok"] == Value::Bool(false))
            .count();
        Ok(serde_json::json!({
            "results": results,
            "total": ops.len(),
            "failed": failed,
        }))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("validator", &self.validator.name())
            .finish_non_exhaustive()
    }
}

fn item_error(index: usize, method: &str, err: &Error) -> Value {
    serde_json::json!({
        "index": index,
        "method": method,
        "ok": false,
        "error": error_object(method, err),
    })
}

/// Build `{id, error}` from an error, surfacing the most specific semantic
/// code found anywhere in the source chain.
pub fn error_response(id: &str, method: &str, err: &Error) -> Value {
    serde_json::json!({"id": id, "error": error_object(method, err)})
}

fn error_object(method: &str, err: &Error) -> Value {
    let specific = err.most_specific().downcast_ref::<Error>().unwrap_or(err);
    let mut data = serde_json::json!({"method": method});
    if let Error::InvalidParams { violations, .. } = specific {
        if !violations.is_empty() {
            data["violations"] = serde_json::to_value(violations).unwrap_or(Value::Null);
        }
    }
    serde_json::json!({
        "code": specific.wire_code(),
        "message": specific.to_string(),
        "data": data,
    })
}
