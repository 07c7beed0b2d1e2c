//! `catalog.*` handlers.

use super::HandlerContext;
use crate::catalog::engine::{AddRequest, KnownEntry};
use crate::catalog::governance::GovernancePatch;
use crate::catalog::groom::GroomOptions;
use crate::catalog::query::QueryFilters;
use crate::types::{Error, Result};
use chrono::Utc;
use serde_json::Value;
use tracing::info;

pub(super) async fn handle(
    ctx: &HandlerContext<'_>,
    op: &str,
    params: &Value,
) -> Result<Value> {
    let mut engine = ctx.engine.lock().await;
    match op {
        "list" => {
            let view = engine.ensure_loaded()?;
            let offset = usize_param(params, "offset").unwrap_or(0);
            let limit = usize_param(params, "limit").unwrap_or(view.entries.len());
            let page: Vec<&_> = view.entries.iter().skip(offset).take(limit).collect();
            Ok(serde_json::json!({
                "entries": page,
                "total": view.entries.len(),
                "aggregateHash": view.aggregate_hash,
            }))
        }
        "get" => {
            let id = str_param(params, "id")?;
            let entry = engine.get(id)?;
            Ok(serde_json::to_value(entry)?)
        }
        "search" => {
            let filters = QueryFilters {
                text: Some(str_param(params, "text")?.to_string()),
                limit: usize_param(params, "limit"),
                ..QueryFilters::default()
            };
            run_query(&mut engine, filters)
        }
        "query" => {
            let filters: QueryFilters = serde_json::from_value(params.clone())
                .map_err(|e| Error::validation(format!("bad query filters: {}", e)))?;
            run_query(&mut engine, filters)
        }
        "categories" => {
            let counts = engine.categories()?;
            let items: Vec<Value> = counts
                .into_iter()
                .map(|(name, count)| serde_json::json!({"name": name, "count": count}))
                .collect();
            Ok(serde_json::json!({"categories": items}))
        }
        "diff" => {
            let known: Vec<KnownEntry> = match params.get("known") {
                Some(v) => serde_json::from_value(v.clone())
                    .map_err(|e| Error::validation(format!("bad known list: {}", e)))?,
                None => Vec::new(),
            };
            let aggregate = params.get("aggregateHash").and_then(Value::as_str);
            let diff = engine.diff(&known, aggregate)?;
            Ok(serde_json::to_value(diff)?)
        }
        "export" => {
            let view = engine.ensure_loaded()?;
            Ok(serde_json::json!({
                "entries": view.entries,
                "aggregateHash": view.aggregate_hash,
                "exportedAt": Utc::now().to_rfc3339(),
            }))
        }
        "governanceHash" => {
            let hash = engine.governance_hash()?;
            Ok(serde_json::json!({"governanceHash": hash}))
        }
        "health" => {
            let dirty = engine.usage_is_dirty();
            let view = engine.ensure_loaded()?;
            Ok(serde_json::json!({
                "entries": view.entries.len(),
                "skipped": view.skipped,
                "aggregateHash": view.aggregate_hash,
                "mutationEnabled": engine.mutation_enabled(),
                "usageDirty": dirty,
            }))
        }
        "add" => {
            let req: AddRequest = serde_json::from_value(params.clone())
                .map_err(|e| Error::validation(format!("bad add request: {}", e)))?;
            let outcome = engine.add(req, Utc::now())?;
            info!(id = %outcome.id, skipped = outcome.skipped, "catalog add");
            Ok(serde_json::to_value(outcome)?)
        }
        "import" => {
            let items: Vec<AddRequest> = params
                .get("items")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| Error::validation(format!("bad import items: {}", e)))?
                .unwrap_or_default();
            let total = items.len();
            let outcomes = engine.import(items, Utc::now())?;
            let failed = outcomes.iter().filter(|o| o.status == "error").count();
            info!(total, failed, "catalog import");
            Ok(serde_json::json!({
                "items": outcomes,
                "total": total,
                "failed": failed,
            }))
        }
        "remove" => {
            let ids: Vec<String> = params
                .get("ids")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| Error::validation(format!("bad id list: {}", e)))?
                .unwrap_or_default();
            let outcomes = engine.remove(&ids)?;
            let removed = outcomes.iter().filter(|o| o.status == "removed").count();
            info!(requested = ids.len(), removed, "catalog remove");
            Ok(serde_json::json!({"items": outcomes, "removed": removed}))
        }
        "repair" => {
            let report = engine.repair(Utc::now())?;
            if report.rewritten > 0 {
                info!(rewritten = report.rewritten, "catalog repair rewrote entries");
            }
            Ok(serde_json::to_value(report)?)
        }
        "reload" => {
            let view = engine.reload()?;
            Ok(serde_json::json!({
                "entries": view.entries.len(),
                "aggregateHash": view.aggregate_hash,
            }))
        }
        "groom" => {
            let opts = GroomOptions {
                dry_run: bool_param(params, "dryRun"),
                remove_deprecated: bool_param(params, "removeDeprecated"),
                merge_duplicates: bool_param(params, "mergeDuplicates"),
                purge_legacy_scopes: bool_param(params, "purgeLegacyScopes"),
            };
            let report = engine.groom(opts, Utc::now())?;
            info!(dry_run = report.dry_run, removed = report.removed, "catalog groom");
            Ok(serde_json::to_value(report)?)
        }
        "governanceUpdate" => {
            let id = str_param(params, "id")?;
            let patch: GovernancePatch = serde_json::from_value(
                params.get("set").cloned().unwrap_or(Value::Null),
            )
            .map_err(|e| Error::validation(format!("bad governance patch: {}", e)))?;
            let note = params.get("note").and_then(Value::as_str);
            let entry = engine.governance_update(id, &patch, note, Utc::now())?;
            Ok(serde_json::to_value(entry)?)
        }
        other => Err(Error::method_not_found(format!("catalog.{}", other))),
    }
}

fn run_query(
    engine: &mut crate::catalog::engine::CatalogEngine,
    filters: QueryFilters,
) -> Result<Value> {
    let view = engine.ensure_loaded()?;
    let (page, total) = filters.apply(&view.entries);
    Ok(serde_json::json!({"entries": page, "total": total}))
}

pub(super) fn str_param<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::validation(format!("missing `{}`", key)))
}

pub(super) fn usize_param(params: &Value, key: &str) -> Option<usize> {
    params
        .get(key)
        .and_then(Value::as_u64)
        .map(|v| v as usize)
}

fn bool_param(params: &Value, key: &str) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(false)
}
