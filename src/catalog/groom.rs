//! Catalog grooming — category normalization, duplicate merging, purges.
//!
//! Grooming is planned as a pure function over the current entry list, then
//! the engine executes the plan. Dry runs report the plan's counts without
//! executing, so predicted and actual counts come from the same computation.

use crate::catalog::model::{normalize_categories, Entry, Requirement};
use crate::types::EntryId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Category prefixes treated as legacy scope tokens.
const LEGACY_SCOPE_PREFIXES: [&str; 2] = ["scope:", "legacy:"];

/// Options for one groom run.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroomOptions {
    pub dry_run: bool,
    pub remove_deprecated: bool,
    pub merge_duplicates: bool,
    pub purge_legacy_scopes: bool,
}

/// Counts reported by a groom run (predicted when `dry_run`).
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroomReport {
    pub categories_normalized: usize,
    pub duplicates_merged: usize,
    pub deprecated_marked: usize,
    pub removed: usize,
    pub legacy_tokens_stripped: usize,
    pub hashes_repaired: usize,
    pub dry_run: bool,
}

/// Everything the engine must write to execute a groom.
#[derive(Debug, Default)]
pub struct GroomPlan {
    /// Full new entry states to persist, keyed by id (last stage wins).
    pub rewrites: BTreeMap<EntryId, Entry>,
    /// Entries to delete.
    pub removals: Vec<EntryId>,
    pub report: GroomReport,
}

/// Pick the primary entry of a duplicate group: earliest `created_at`,
/// ties broken by smallest id.
pub fn pick_primary<'a>(group: &[&'a Entry]) -> &'a Entry {
    group
        .iter()
        .copied()
        .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
        .unwrap_or(group[0])
}

/// Union of two normalized category sets.
pub fn union_categories(a: &[String], b: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = a.iter().chain(b.iter()).cloned().collect();
    merged.sort();
    merged.dedup();
    merged
}

/// Fold a duplicate's metadata into the primary: lowest priority wins,
/// max risk score wins, categories union.
pub fn merge_metadata(primary: &mut Entry, duplicate: &Entry) {
    primary.priority = primary.priority.min(duplicate.priority);
    primary.risk_score = match (primary.risk_score, duplicate.risk_score) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };
    primary.categories = union_categories(&primary.categories, &duplicate.categories);
}

fn is_legacy_token(category: &str) -> bool {
    LEGACY_SCOPE_PREFIXES
        .iter()
        .any(|prefix| category.starts_with(prefix))
}

/// Compute the groom plan over the current entries.
///
/// `now` stamps `updated_at` on every staged rewrite.
pub fn plan_groom(entries: &[Entry], opts: GroomOptions, now: DateTime<Utc>) -> GroomPlan {
    let mut plan = GroomPlan {
        report: GroomReport {
            dry_run: opts.dry_run,
            ..GroomReport::default()
        },
        ..GroomPlan::default()
    };

    // Working copies; staged changes accumulate across phases.
    let mut working: BTreeMap<EntryId, Entry> = entries
        .iter()
        .map(|e| (e.id.clone(), e.clone()))
        .collect();
    let mut touched: Vec<EntryId> = Vec::new();

    // Phase 1: category normalization.
    for (id, entry) in working.iter_mut() {
        let normalized = normalize_categories(&entry.categories);
        if normalized != entry.categories {
            entry.categories = normalized;
            plan.report.categories_normalized += 1;
            touched.push(id.clone());
        }
    }

    // Phase 2: duplicate grouping by body content.
    if opts.merge_duplicates {
        let mut by_hash: BTreeMap<String, Vec<EntryId>> = BTreeMap::new();
        for entry in working.values() {
            by_hash
                .entry(crate::hash::digest_text(&entry.body))
                .or_default()
                .push(entry.id.clone());
        }

        for ids in by_hash.values().filter(|ids| ids.len() > 1) {
            let group: Vec<&Entry> = ids.iter().filter_map(|id| working.get(id)).collect();
            let primary_id = pick_primary(&group).id.clone();

            let duplicates: Vec<EntryId> = ids
                .iter()
                .filter(|id| **id != primary_id)
                .cloned()
                .collect();

            for dup_id in &duplicates {
                let dup = match working.get(dup_id) {
                    Some(d) => d.clone(),
                    None => continue,
                };
                if let Some(primary) = working.get_mut(&primary_id) {
                    merge_metadata(primary, &dup);
                }
                if let Some(dup_mut) = working.get_mut(dup_id) {
                    if dup_mut.requirement != Requirement::Deprecated {
                        plan.report.deprecated_marked += 1;
                    }
                    dup_mut.requirement = Requirement::Deprecated;
                    dup_mut.categories = normalize_categories(&union_categories(
                        &dup_mut.categories,
                        &[format!("superseded-by-{}", primary_id)],
                    ));
                }
                plan.report.duplicates_merged += 1;
                touched.push(dup_id.clone());
            }
            touched.push(primary_id);
        }
    }

    // Phase 3: optionally delete deprecated entries (including ones newly
    // marked above, so chains of duplicates drain in one pass).
    if opts.remove_deprecated {
        let doomed: Vec<EntryId> = working
            .values()
            .filter(|e| e.requirement == Requirement::Deprecated)
            .map(|e| e.id.clone())
            .collect();
        for id in doomed {
            working.remove(&id);
            plan.removals.push(id);
        }
        plan.report.removed = plan.removals.len();
    }

    // Phase 4: strip legacy scope tokens.
    if opts.purge_legacy_scopes {
        for (id, entry) in working.iter_mut() {
            let before = entry.categories.len();
            entry.categories.retain(|c| !is_legacy_token(c));
            let stripped = before - entry.categories.len();
            if stripped > 0 {
                plan.report.legacy_tokens_stripped += stripped;
                touched.push(id.clone());
            }
        }
    }

    // Stage rewrites for every surviving touched entry. The engine adds the
    // phase-5 on-disk hash repairs on top of this plan.
    touched.sort();
    touched.dedup();
    for id in touched {
        if let Some(entry) = working.get(&id) {
            let mut staged = entry.clone();
            staged.updated_at = now;
            plan.rewrites.insert(id, staged);
        }
    }

    plan
}
