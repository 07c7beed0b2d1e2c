//! `usage.*` handlers.

use super::catalog::{str_param, usize_param};
use super::HandlerContext;
use crate::types::{Error, Result};
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

const DEFAULT_HOTSET_LIMIT: usize = 10;

pub(super) async fn handle(
    ctx: &HandlerContext<'_>,
    op: &str,
    params: &Value,
) -> Result<Value> {
    let mut engine = ctx.engine.lock().await;
    match op {
        "track" => {
            let id = str_param(params, "id")?;
            let outcome = engine.track_usage(id, Utc::now())?;
            if outcome.rate_limited {
                debug!(id, "usage track rate-limited");
            }
            Ok(serde_json::json!({
                "id": id,
                "rateLimited": outcome.rate_limited,
                "usageCount": outcome.usage_count,
            }))
        }
        "hotset" => {
            let limit = usize_param(params, "limit").unwrap_or(DEFAULT_HOTSET_LIMIT);
            let items: Vec<Value> = engine
                .usage_hotset(limit)
                .into_iter()
                .map(|(id, record)| {
                    serde_json::json!({
                        "id": id,
                        "usageCount": record.usage_count,
                        "firstSeenTs": record.first_seen_ts,
                        "lastUsedAt": record.last_used_at,
                    })
                })
                .collect();
            Ok(serde_json::json!({"hotset": items}))
        }
        "flush" => {
            let written = engine.flush_usage()?;
            Ok(serde_json::json!({"written": written}))
        }
        other => Err(Error::method_not_found(format!("usage.{}", other))),
    }
}
