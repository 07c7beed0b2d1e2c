//! Method handlers, grouped by namespace. Each handler takes validated
//! params, drives the engine, and returns a wire-ready JSON result.

mod catalog;
mod system;
mod usage;

use crate::catalog::engine::CatalogEngine;
use crate::metrics::Metrics;
use crate::registry::ToolRegistry;
use crate::types::{Error, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct HandlerContext<'a> {
    pub engine: &'a Arc<Mutex<CatalogEngine>>,
    pub registry: &'a Arc<ToolRegistry>,
    pub metrics: &'a Arc<Metrics>,
}

/// Route a validated request to its namespace handler.
pub async fn route(ctx: &HandlerContext<'_>, method: &str, params: &Value) -> Result<Value> {
    match method.split_once('.') {
        Some(("catalog", op)) => catalog::handle(ctx, op, params).await,
        Some(("usage", op)) => usage::handle(ctx, op, params).await,
        Some(("registry", op)) | Some(("integrity", op)) | Some(("metrics", op)) => {
            system::handle(ctx, method, op, params).await
        }
        None if method == "initialize" => system::initialize(ctx, params).await,
        _ => Err(Error::method_not_found(method)),
    }
}
