//! `initialize`, `registry.*`, `integrity.*` and `metrics.*` handlers.

use super::HandlerContext;
use crate::types::{Error, Result};
use serde_json::Value;
use tracing::info;

pub const SERVER_NAME: &str = env!("CARGO_PKG_NAME");
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PROTOCOL_VERSION: u32 = 1;

/// Handshake response. The connection latches readiness only after this
/// response has been flushed, not here.
pub(super) async fn initialize(ctx: &HandlerContext<'_>, params: &Value) -> Result<Value> {
    let client = params
        .get("clientName")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    info!(client, "initialize");
    let mutation_enabled = ctx.engine.lock().await.mutation_enabled();
    Ok(serde_json::json!({
        "serverName": SERVER_NAME,
        "serverVersion": SERVER_VERSION,
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "mutation": mutation_enabled,
            "notifications": ["ready", "catalog.listChanged"],
            "toolCount": ctx.registry.len(),
        },
    }))
}

pub(super) async fn handle(
    ctx: &HandlerContext<'_>,
    method: &str,
    op: &str,
    _params: &Value,
) -> Result<Value> {
    match (method, op) {
        ("registry.list", _) => {
            let tools: Vec<Value> = ctx
                .registry
                .tools()
                .iter()
                .map(|t| t.descriptor())
                .collect();
            Ok(serde_json::json!({"tools": tools}))
        }
        ("integrity.verify", _) => {
            let mut engine = ctx.engine.lock().await;
            let report = engine.verify()?;
            if !report.ok {
                info!(drifted = report.drifted.len(), "integrity drift detected");
            }
            Ok(serde_json::to_value(report)?)
        }
        ("metrics.snapshot", _) => Ok(ctx.metrics.snapshot()),
        _ => Err(Error::method_not_found(method)),
    }
}
