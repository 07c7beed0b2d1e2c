//! Catalog engine — lazily-materialized in-memory view over the content
//! store.
//!
//! The engine owns all catalog state and is driven behind a single lock
//! (single-writer); reads clone an immutable `Arc<CatalogView>` snapshot that
//! is swapped atomically on reload. `invalidate` only marks the cache; the
//! rebuild happens on next access.
//!
//! Every mutation follows the same pipeline: validate, write, invalidate,
//! re-load, verify visibility. The re-read after write closes a class of
//! phantom-write bugs where callers observed success while a reader's cache
//! had not caught up.

use crate::catalog::governance::{self, GovernancePatch};
use crate::catalog::groom::{plan_groom, GroomOptions, GroomReport};
use crate::catalog::model::{
    normalize_categories, Audience, Entry, Requirement, UsageRecord, SCHEMA_VERSION,
};
use crate::catalog::usage::{TrackOutcome, UsageTracker};
use crate::store::ContentStore;
use crate::types::{CatalogConfig, EntryId, Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable snapshot of the loaded catalog.
#[derive(Debug)]
pub struct CatalogView {
    /// Entries sorted by id.
    pub entries: Vec<Entry>,
    by_id: HashMap<String, usize>,
    /// Digest over sorted `(id, source_hash)` pairs.
    pub aggregate_hash: String,
    /// Documents skipped as corrupt during the scan.
    pub skipped: usize,
    pub loaded_at: DateTime<Utc>,
}

impl CatalogView {
    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.by_id.get(id).map(|&i| &self.entries[i])
    }
}

/// Client-supplied inventory line for `catalog.diff`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownEntry {
    pub id: String,
    pub source_hash: String,
}

/// Three-way diff against a client inventory.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    pub up_to_date: bool,
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    pub aggregate_hash: String,
}

/// Fields accepted by `catalog.add` / `catalog.import`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRequest {
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default)]
    pub audience: Audience,
    #[serde(default)]
    pub requirement: Requirement,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
}

fn default_priority() -> i64 {
    100
}

/// Outcome of a single add.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOutcome {
    pub id: String,
    pub skipped: bool,
    pub source_hash: Option<String>,
}

/// Per-item import outcome.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportItemOutcome {
    pub id: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Per-id removal outcome.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoveOutcome {
    pub id: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Result of a repair pass.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    pub checked: usize,
    pub drifted: usize,
    pub rewritten: usize,
}

/// One integrity violation found by `verify`.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DriftedEntry {
    pub id: String,
    pub stored_hash: String,
    pub actual_hash: String,
}

/// Result of an integrity verification pass (reads disk, writes nothing).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub ok: bool,
    pub checked: usize,
    pub drifted: Vec<DriftedEntry>,
}

/// The catalog engine. One instance per process, constructed once and shared
/// behind a lock; no module-level singletons.
#[derive(Debug)]
pub struct CatalogEngine {
    store: ContentStore,
    config: CatalogConfig,
    view: Option<Arc<CatalogView>>,
    usage: UsageTracker,
}

impl CatalogEngine {
    pub fn new(store: ContentStore, config: CatalogConfig) -> Result<Self> {
        let usage_records = store.load_usage()?;
        let usage = UsageTracker::new(usage_records, config.usage_rate_limit);
        Ok(Self {
            store,
            config,
            view: None,
            usage,
        })
    }

    pub fn mutation_enabled(&self) -> bool {
        self.config.mutation_enabled
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    fn require_mutation_enabled(&self, what: &str) -> Result<()> {
        if self.config.mutation_enabled {
            Ok(())
        } else {
            Err(Error::mutation_disabled(format!(
                "{} requires the mutation-enabled flag",
                what
            )))
        }
    }

    /// Drop the cached view; the next access rebuilds it.
    pub fn invalidate(&mut self) {
        self.view = None;
    }

    /// Return the cached view, rebuilding it from the store if invalidated.
    pub fn ensure_loaded(&mut self) -> Result<Arc<CatalogView>> {
        if let Some(view) = &self.view {
            return Ok(Arc::clone(view));
        }

        let loaded = self.store.load_entries()?;
        let mut entries = loaded.entries;

        // Join persisted usage numbers into the materialized entries.
        for entry in entries.iter_mut() {
            if let Some(record) = self.usage.get(entry.id.as_str()) {
                entry.usage_count = Some(record.usage_count);
                entry.first_seen_ts = Some(record.first_seen_ts);
                entry.last_used_at = Some(record.last_used_at);
            }
        }

        let aggregate_hash = crate::hash::aggregate_hash(
            entries
                .iter()
                .map(|e| (e.id.as_str(), e.source_hash.as_str())),
        );
        let by_id = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.as_str().to_string(), i))
            .collect();

        let view = Arc::new(CatalogView {
            entries,
            by_id,
            aggregate_hash,
            skipped: loaded.skipped.len(),
            loaded_at: Utc::now(),
        });
        tracing::debug!(
            "Catalog view rebuilt: {} entries, {} skipped, hash {}",
            view.entries.len(),
            view.skipped,
            &view.aggregate_hash[..12],
        );
        self.view = Some(Arc::clone(&view));
        Ok(view)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn get(&mut self, id: &str) -> Result<Entry> {
        let view = self.ensure_loaded()?;
        view.get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("entry '{}' not found", id)))
    }

    /// Distinct categories with their entry counts.
    pub fn categories(&mut self) -> Result<Vec<(String, usize)>> {
        let view = self.ensure_loaded()?;
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for entry in &view.entries {
            for cat in &entry.categories {
                *counts.entry(cat.as_str()).or_default() += 1;
            }
        }
        let mut out: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(c, n)| (c.to_string(), n))
            .collect();
        out.sort();
        Ok(out)
    }

    /// Three-way diff against a client-supplied inventory.
    ///
    /// When `aggregate_hash` matches the current one, returns the up-to-date
    /// fast path without building the diff.
    pub fn diff(
        &mut self,
        known: &[KnownEntry],
        aggregate_hash: Option<&str>,
    ) -> Result<DiffResult> {
        let view = self.ensure_loaded()?;

        if let Some(client_hash) = aggregate_hash {
            if client_hash == view.aggregate_hash {
                return Ok(DiffResult {
                    up_to_date: true,
                    aggregate_hash: view.aggregate_hash.clone(),
                    ..DiffResult::default()
                });
            }
        }

        let known_by_id: HashMap<&str, &str> = known
            .iter()
            .map(|k| (k.id.as_str(), k.source_hash.as_str()))
            .collect();

        let mut result = DiffResult {
            aggregate_hash: view.aggregate_hash.clone(),
            ..DiffResult::default()
        };

        for entry in &view.entries {
            match known_by_id.get(entry.id.as_str()) {
                None => result.added.push(entry.id.as_str().to_string()),
                Some(hash) if *hash != entry.source_hash => {
                    result.updated.push(entry.id.as_str().to_string());
                }
                Some(_) => {}
            }
        }
        for k in known {
            if view.get(&k.id).is_none() {
                result.removed.push(k.id.clone());
            }
        }

        result.up_to_date =
            result.added.is_empty() && result.updated.is_empty() && result.removed.is_empty();
        Ok(result)
    }

    /// Digest over the curated governance projection of all entries.
    pub fn governance_hash(&mut self) -> Result<String> {
        let view = self.ensure_loaded()?;
        governance::governance_hash(view.entries.iter())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add one entry: validate, hash, default-fill governance, persist,
    /// invalidate, then re-load and verify visibility before returning.
    pub fn add(&mut self, req: AddRequest, now: DateTime<Utc>) -> Result<AddOutcome> {
        self.require_mutation_enabled("catalog.add")?;
        let entry = self.build_entry(&req, now)?;

        let view = self.ensure_loaded()?;
        if view.get(entry.id.as_str()).is_some() && !req.overwrite {
            return Ok(AddOutcome {
                id: req.id,
                skipped: true,
                source_hash: None,
            });
        }
        drop(view);

        self.persist_and_verify(entry)
    }

    /// Bulk add with per-item outcomes; never aborts early.
    pub fn import(
        &mut self,
        items: Vec<AddRequest>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ImportItemOutcome>> {
        self.require_mutation_enabled("catalog.import")?;
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            let id = item.id.clone();
            let overwrite = item.overwrite;
            let exists = self
                .ensure_loaded()?
                .get(&id)
                .is_some();

            if exists && !overwrite {
                outcomes.push(ImportItemOutcome {
                    id,
                    status: "error",
                    code: Some("CONFLICT"),
                    message: Some("id already exists (set overwrite to replace)".to_string()),
                });
                continue;
            }

            match self
                .build_entry(&item, now)
                .and_then(|entry| self.persist_and_verify(entry))
            {
                Ok(_) => outcomes.push(ImportItemOutcome {
                    id,
                    status: "imported",
                    code: None,
                    message: None,
                }),
                Err(e) => outcomes.push(ImportItemOutcome {
                    id,
                    status: "error",
                    code: Some(e.wire_code()),
                    message: Some(e.to_string()),
                }),
            }
        }
        Ok(outcomes)
    }

    /// Remove entries by id with per-id outcomes. The cache is invalidated
    /// only when at least one removal actually happened.
    pub fn remove(&mut self, ids: &[String]) -> Result<Vec<RemoveOutcome>> {
        self.require_mutation_enabled("catalog.remove")?;
        let mut outcomes = Vec::with_capacity(ids.len());
        let mut any_removed = false;

        for id in ids {
            match self.store.remove_entry(id) {
                Ok(true) => {
                    any_removed = true;
                    self.usage.forget(id);
                    outcomes.push(RemoveOutcome {
                        id: id.clone(),
                        status: "removed",
                        message: None,
                    });
                }
                Ok(false) => outcomes.push(RemoveOutcome {
                    id: id.clone(),
                    status: "missing",
                    message: None,
                }),
                Err(e) => outcomes.push(RemoveOutcome {
                    id: id.clone(),
                    status: "error",
                    message: Some(e.to_string()),
                }),
            }
        }

        if any_removed {
            self.invalidate();
        }
        Ok(outcomes)
    }

    /// Recompute each entry's hash from disk and rewrite only drifted ones.
    ///
    /// A zero-drift repair is a no-op and is allowed even when mutation is
    /// globally disabled; an actual rewrite is not.
    pub fn repair(&mut self, now: DateTime<Utc>) -> Result<RepairReport> {
        let loaded = self.store.load_entries()?;
        let mut report = RepairReport {
            checked: loaded.entries.len(),
            ..RepairReport::default()
        };

        for mut entry in loaded.entries {
            let actual = crate::hash::digest_text(&entry.body);
            if actual == entry.source_hash {
                continue;
            }
            report.drifted += 1;
            self.require_mutation_enabled("catalog.repair (drift found)")?;
            entry.source_hash = actual;
            entry.updated_at = now;
            self.store.save_entry(&entry)?;
            report.rewritten += 1;
        }

        if report.rewritten > 0 {
            self.invalidate();
        }
        Ok(report)
    }

    /// Forced invalidate-and-reload; returns the fresh view.
    pub fn reload(&mut self) -> Result<Arc<CatalogView>> {
        self.invalidate();
        self.ensure_loaded()
    }

    /// Integrity verification: recompute on-disk hashes, report drift.
    pub fn verify(&mut self) -> Result<VerifyReport> {
        let loaded = self.store.load_entries()?;
        let mut drifted = Vec::new();
        for entry in &loaded.entries {
            let actual = crate::hash::digest_text(&entry.body);
            if actual != entry.source_hash {
                drifted.push(DriftedEntry {
                    id: entry.id.as_str().to_string(),
                    stored_hash: entry.source_hash.clone(),
                    actual_hash: actual,
                });
            }
        }
        Ok(VerifyReport {
            ok: drifted.is_empty(),
            checked: loaded.entries.len(),
            drifted,
        })
    }

    /// Groom the catalog. `dry_run` performs zero writes and returns the
    /// predicted counts of the identical plan.
    pub fn groom(&mut self, opts: GroomOptions, now: DateTime<Utc>) -> Result<GroomReport> {
        self.require_mutation_enabled("catalog.groom")?;
        // Plan over a fresh disk read, not the cached view: the hash-repair
        // pass compares stored hashes as they are on disk, so drift written
        // behind a warm cache is still counted and fixed.
        let on_disk = self.store.load_entries()?;
        let mut plan = plan_groom(&on_disk.entries, opts, now);

        // Final hash-repair pass over the plan's resulting state, which
        // equals the post-execution disk state; dry-run prediction and
        // execution therefore agree by construction.
        let removals: std::collections::HashSet<&str> =
            plan.removals.iter().map(EntryId::as_str).collect();
        let mut repairs: Vec<Entry> = Vec::new();
        for entry in &on_disk.entries {
            if removals.contains(entry.id.as_str()) {
                continue;
            }
            let effective = plan.rewrites.get(&entry.id).unwrap_or(entry);
            let actual = crate::hash::digest_text(&effective.body);
            if actual != effective.source_hash {
                let mut fixed = effective.clone();
                fixed.source_hash = actual;
                fixed.updated_at = now;
                repairs.push(fixed);
            }
        }
        plan.report.hashes_repaired = repairs.len();

        if opts.dry_run {
            return Ok(plan.report);
        }

        for entry in plan.rewrites.values() {
            self.store.save_entry(entry)?;
        }
        for id in &plan.removals {
            self.store.remove_entry(id.as_str())?;
            self.usage.forget(id.as_str());
        }
        // Repairs last: a repaired entry that also carries a staged rewrite
        // already includes it, so this write settles the final state.
        for entry in &repairs {
            self.store.save_entry(entry)?;
        }

        self.invalidate();
        self.ensure_loaded()?;
        Ok(plan.report)
    }

    /// Patch governance fields on one entry.
    pub fn governance_update(
        &mut self,
        id: &str,
        patch: &GovernancePatch,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Entry> {
        self.require_mutation_enabled("catalog.governanceUpdate")?;
        let mut entry = self.get(id)?;
        let governance = entry.governance.get_or_insert_with(|| {
            governance::default_governance(entry.priority, entry.requirement, None, now)
        });
        governance::apply_patch(governance, patch, note, now)?;
        entry.updated_at = now;

        let outcome = self.persist_and_verify(entry)?;
        match outcome.source_hash {
            Some(_) => self.get(id),
            None => Err(Error::internal("governance update lost its write")),
        }
    }

    // =========================================================================
    // Usage
    // =========================================================================

    /// Rate-limited usage increment for an existing entry.
    pub fn track_usage(&mut self, id: &str, now: DateTime<Utc>) -> Result<TrackOutcome> {
        let view = self.ensure_loaded()?;
        if view.get(id).is_none() {
            return Err(Error::not_found(format!("entry '{}' not found", id)));
        }
        drop(view);
        Ok(self.usage.track(id, now))
    }

    pub fn usage_hotset(&self, n: usize) -> Vec<(String, UsageRecord)> {
        self.usage.hotset(n)
    }

    /// Persist the usage snapshot if there are unsaved increments.
    pub fn flush_usage(&mut self) -> Result<bool> {
        if !self.usage.is_dirty() {
            return Ok(false);
        }
        self.store.save_usage(self.usage.records())?;
        self.usage.mark_flushed();
        Ok(true)
    }

    pub fn usage_is_dirty(&self) -> bool {
        self.usage.is_dirty()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn build_entry(&mut self, req: &AddRequest, now: DateTime<Utc>) -> Result<Entry> {
        let id = EntryId::new(req.id.clone()).map_err(Error::validation)?;
        if req.title.trim().is_empty() {
            return Err(Error::validation("title cannot be empty"));
        }
        if req.body.is_empty() {
            return Err(Error::validation("body cannot be empty"));
        }

        let existing = self.ensure_loaded()?.get(id.as_str()).cloned();
        let created_at = existing.as_ref().map(|e| e.created_at).unwrap_or(now);
        // Overwrites keep the governance record; its change log belongs to
        // the id, not to one body revision.
        let governance = existing
            .and_then(|e| e.governance)
            .unwrap_or_else(|| {
                governance::default_governance(
                    req.priority,
                    req.requirement,
                    req.owner.clone(),
                    now,
                )
            });

        Ok(Entry {
            id,
            title: req.title.clone(),
            body: req.body.clone(),
            priority: req.priority,
            audience: req.audience,
            requirement: req.requirement,
            categories: normalize_categories(&req.categories),
            risk_score: req.risk_score,
            source_hash: crate::hash::digest_text(&req.body),
            schema_version: SCHEMA_VERSION,
            created_at,
            updated_at: now,
            usage_count: None,
            last_used_at: None,
            first_seen_ts: None,
            governance: Some(governance),
        })
    }

    /// Write, invalidate, re-load, and confirm the entry is visible with the
    /// expected hash before reporting success.
    fn persist_and_verify(&mut self, entry: Entry) -> Result<AddOutcome> {
        let id = entry.id.as_str().to_string();
        let expected_hash = entry.source_hash.clone();

        self.store.save_entry(&entry)?;
        self.invalidate();
        let view = self.ensure_loaded()?;

        match view.get(&id) {
            Some(visible) if visible.source_hash == expected_hash => Ok(AddOutcome {
                id,
                skipped: false,
                source_hash: Some(expected_hash),
            }),
            Some(_) => Err(Error::integrity(format!(
                "entry '{}' persisted but re-read with a different hash",
                id
            ))),
            None => Err(Error::integrity(format!(
                "entry '{}' persisted but not visible after reload",
                id
            ))),
        }
    }
}
