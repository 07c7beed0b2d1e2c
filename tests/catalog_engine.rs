//! Engine-level consistency properties, exercised against a real store
//! directory.

use chrono::{Duration as ChronoDuration, Utc};
use curator_core::catalog::engine::{AddRequest, CatalogEngine, KnownEntry};
use curator_core::catalog::governance::GovernancePatch;
use curator_core::catalog::groom::GroomOptions;
use curator_core::catalog::model::Requirement;
use curator_core::hash::digest_text;
use curator_core::store::ContentStore;
use curator_core::types::CatalogConfig;
use pretty_assertions::assert_eq;

fn engine_in(dir: &std::path::Path, mutation_enabled: bool) -> CatalogEngine {
    let config = CatalogConfig {
        store_dir: dir.to_path_buf(),
        mutation_enabled,
        ..CatalogConfig::default()
    };
    let store = ContentStore::open(&config.store_dir).unwrap();
    CatalogEngine::new(store, config).unwrap()
}

fn add_req(id: &str, body: &str) -> AddRequest {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "title": format!("Entry {id}"),
        "body": body,
    }))
    .unwrap()
}

#[test]
fn add_is_visible_with_matching_hash_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(dir.path(), true);

    let outcome = engine.add(add_req("alpha", "hello"), Utc::now()).unwrap();
    assert!(!outcome.skipped);
    assert_eq!(outcome.source_hash.as_deref(), Some(digest_text("hello").as_str()));

    let entry = engine.get("alpha").unwrap();
    assert_eq!(entry.source_hash, digest_text("hello"));
    assert!(entry.governance.is_some(), "governance defaults are filled in");
}

#[test]
fn duplicate_add_without_overwrite_is_skipped_and_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(dir.path(), true);

    engine.add(add_req("alpha", "v1"), Utc::now()).unwrap();
    let before = engine.ensure_loaded().unwrap().aggregate_hash.clone();

    let outcome = engine.add(add_req("alpha", "v2"), Utc::now()).unwrap();
    assert!(outcome.skipped);
    assert_eq!(engine.ensure_loaded().unwrap().aggregate_hash, before);
    assert_eq!(engine.get("alpha").unwrap().body, "v1");
}

#[test]
fn overwrite_keeps_created_at_and_governance_log() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(dir.path(), true);
    let t0 = Utc::now() - ChronoDuration::hours(1);

    engine.add(add_req("alpha", "v1"), t0).unwrap();
    let first = engine.get("alpha").unwrap();

    let mut req = add_req("alpha", "v2");
    req.overwrite = true;
    engine.add(req, Utc::now()).unwrap();
    let second = engine.get("alpha").unwrap();

    assert_eq!(second.created_at, first.created_at);
    assert_eq!(second.body, "v2");
    assert_eq!(
        second.governance.as_ref().unwrap().change_log.len(),
        first.governance.as_ref().unwrap().change_log.len(),
    );
}

#[test]
fn aggregate_hash_tracks_membership_and_content() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(dir.path(), true);

    let empty = engine.ensure_loaded().unwrap().aggregate_hash.clone();
    engine.add(add_req("a", "one"), Utc::now()).unwrap();
    let one = engine.ensure_loaded().unwrap().aggregate_hash.clone();
    assert_ne!(empty, one);

    let mut req = add_req("a", "two");
    req.overwrite = true;
    engine.add(req, Utc::now()).unwrap();
    let two = engine.ensure_loaded().unwrap().aggregate_hash.clone();
    assert_ne!(one, two);

    engine.remove(&["a".to_string()]).unwrap();
    assert_eq!(engine.ensure_loaded().unwrap().aggregate_hash, empty);
}

#[test]
fn diff_classifies_added_updated_removed() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(dir.path(), true);
    engine.add(add_req("kept", "same"), Utc::now()).unwrap();
    engine.add(add_req("changed", "new body"), Utc::now()).unwrap();

    let known = vec![
        KnownEntry { id: "kept".into(), source_hash: digest_text("same") },
        KnownEntry { id: "changed".into(), source_hash: digest_text("old body") },
        KnownEntry { id: "gone".into(), source_hash: digest_text("x") },
    ];
    let diff = engine.diff(&known, None).unwrap();
    assert!(!diff.up_to_date);
    assert_eq!(diff.added, Vec::<String>::new());
    assert_eq!(diff.updated, vec!["changed".to_string()]);
    assert_eq!(diff.removed, vec!["gone".to_string()]);

    // Matching inventory reports up to date even without the fast path.
    let known = vec![
        KnownEntry { id: "kept".into(), source_hash: digest_text("same") },
        KnownEntry { id: "changed".into(), source_hash: digest_text("new body") },
    ];
    assert!(engine.diff(&known, None).unwrap().up_to_date);
}

#[test]
fn import_isolates_conflicts_per_item() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(dir.path(), true);
    engine.add(add_req("dup", "original"), Utc::now()).unwrap();

    let items = vec![
        add_req("fresh", "body"),
        add_req("dup", "clobber attempt"),
        add_req("bad id!", "body"),
    ];
    let outcomes = engine.import(items, Utc::now()).unwrap();
    assert_eq!(outcomes[0].status, "imported");
    assert_eq!(outcomes[1].status, "error");
    assert_eq!(outcomes[1].code, Some("CONFLICT"));
    assert_eq!(outcomes[2].status, "error");
    assert_eq!(outcomes[2].code, Some("INVALID_PARAMS"));

    assert_eq!(engine.get("dup").unwrap().body, "original");
    assert!(engine.get("fresh").is_ok());
}

#[test]
fn remove_reports_missing_ids_without_failing() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(dir.path(), true);
    engine.add(add_req("real", "body"), Utc::now()).unwrap();

    let outcomes = engine
        .remove(&["real".to_string(), "ghost".to_string()])
        .unwrap();
    assert_eq!(outcomes[0].status, "removed");
    assert_eq!(outcomes[1].status, "missing");
    assert!(engine.get("real").is_err());
}

#[test]
fn repair_rewrites_only_drifted_entries() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(dir.path(), true);
    engine.add(add_req("clean", "fine"), Utc::now()).unwrap();
    engine.add(add_req("drifted", "original"), Utc::now()).unwrap();

    // Corrupt one body on disk behind the engine's back.
    let path = dir.path().join("drifted.json");
    let raw = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, raw.replace("original", "tampered")).unwrap();

    let verify = engine.verify().unwrap();
    assert!(!verify.ok);
    assert_eq!(verify.drifted.len(), 1);
    assert_eq!(verify.drifted[0].id, "drifted");

    let report = engine.repair(Utc::now()).unwrap();
    assert_eq!(report.checked, 2);
    assert_eq!(report.drifted, 1);
    assert_eq!(report.rewritten, 1);

    assert!(engine.verify().unwrap().ok);
    let entry = engine.get("drifted").unwrap();
    assert_eq!(entry.source_hash, digest_text(&entry.body));
}

#[test]
fn zero_drift_repair_is_legal_with_mutation_disabled() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut writer = engine_in(dir.path(), true);
        writer.add(add_req("a", "pristine text"), Utc::now()).unwrap();
    }
    let mut engine = engine_in(dir.path(), false);
    let report = engine.repair(Utc::now()).unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.rewritten, 0);

    // With actual drift the same call is refused.
    let path = dir.path().join("a.json");
    let raw = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, raw.replace("pristine text", "tampered text")).unwrap();
    let err = engine.repair(Utc::now()).unwrap_err();
    assert_eq!(err.wire_code(), "MUTATION_DISABLED");
}

#[test]
fn groom_dry_run_predicts_real_counts() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(dir.path(), true);
    let now = Utc::now();

    let mut a = add_req("a", "shared body");
    a.categories = vec!["  Infra ".to_string(), "infra".to_string()];
    engine.add(a, now - ChronoDuration::hours(2)).unwrap();

    let b = add_req("b", "shared body"); // duplicate of a
    engine.add(b, now - ChronoDuration::hours(1)).unwrap();

    let mut c = add_req("c", "unique");
    c.requirement = Requirement::Deprecated;
    c.categories = vec!["scope:old".to_string(), "keep".to_string()];
    engine.add(c, now).unwrap();

    let opts = GroomOptions {
        dry_run: true,
        remove_deprecated: true,
        merge_duplicates: true,
        purge_legacy_scopes: true,
    };
    let predicted = engine.groom(opts, now).unwrap();
    assert!(predicted.dry_run);

    // Dry run wrote nothing.
    assert!(engine.get("c").is_ok());

    let real = engine
        .groom(GroomOptions { dry_run: false, ..opts }, now)
        .unwrap();
    assert!(!real.dry_run);
    assert_eq!(predicted.duplicates_merged, real.duplicates_merged);
    assert_eq!(predicted.deprecated_marked, real.deprecated_marked);
    assert_eq!(predicted.removed, real.removed);
    assert_eq!(predicted.legacy_tokens_stripped, real.legacy_tokens_stripped);
    assert_eq!(predicted.categories_normalized, real.categories_normalized);
    assert_eq!(predicted.hashes_repaired, real.hashes_repaired);

    assert!(real.removed >= 1, "deprecated entry is purged");
    assert!(engine.get("c").is_err());
}

#[test]
fn groom_repairs_drift_written_behind_a_warm_cache() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(dir.path(), true);
    engine.add(add_req("a", "settled text"), Utc::now()).unwrap();
    // The add leaves the view cached; edit the document on disk behind it.
    let path = dir.path().join("a.json");
    let raw = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, raw.replace("settled text", "edited text")).unwrap();

    let predicted = engine
        .groom(GroomOptions { dry_run: true, ..GroomOptions::default() }, Utc::now())
        .unwrap();
    assert_eq!(predicted.hashes_repaired, 1);

    let real = engine.groom(GroomOptions::default(), Utc::now()).unwrap();
    assert_eq!(real.hashes_repaired, 1);

    let entry = engine.get("a").unwrap();
    assert_eq!(entry.body, "edited text");
    assert_eq!(entry.source_hash, digest_text("edited text"));
    assert!(engine.verify().unwrap().ok);
}

#[test]
fn governance_hash_ignores_body_edits_but_sees_governance_changes() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(dir.path(), true);
    engine.add(add_req("a", "v1"), Utc::now()).unwrap();
    let baseline = engine.governance_hash().unwrap();

    let mut req = add_req("a", "v2 body edit");
    req.overwrite = true;
    engine.add(req, Utc::now()).unwrap();
    assert_eq!(engine.governance_hash().unwrap(), baseline);

    let patch = GovernancePatch {
        owner: Some("platform-team".to_string()),
        ..GovernancePatch::default()
    };
    engine
        .governance_update("a", &patch, Some("reassigned"), Utc::now())
        .unwrap();
    assert_ne!(engine.governance_hash().unwrap(), baseline);
}

#[test]
fn governance_update_bumps_patch_version_and_appends_log() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(dir.path(), true);
    engine.add(add_req("a", "body"), Utc::now()).unwrap();

    let patch = GovernancePatch {
        owner: Some("ops".to_string()),
        ..GovernancePatch::default()
    };
    let entry = engine
        .governance_update("a", &patch, Some("handover"), Utc::now())
        .unwrap();
    let gov = entry.governance.unwrap();
    assert_eq!(gov.version, "1.0.1");
    assert_eq!(gov.owner, "ops");
    assert!(gov.change_log.iter().any(|c| c.note == "handover"));

    let err = engine
        .governance_update("a", &GovernancePatch::default(), None, Utc::now())
        .unwrap_err();
    assert_eq!(err.wire_code(), "INVALID_PARAMS");
}

#[test]
fn eleventh_track_in_a_window_is_rate_limited() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(dir.path(), true);
    engine.add(add_req("hot", "body"), Utc::now()).unwrap();

    let now = Utc::now();
    for _ in 0..10 {
        let outcome = engine.track_usage("hot", now).unwrap();
        assert!(!outcome.rate_limited);
    }
    let eleventh = engine.track_usage("hot", now).unwrap();
    assert!(eleventh.rate_limited);
    assert_eq!(eleventh.usage_count, 10);

    // Next window admits again.
    let later = now + ChronoDuration::seconds(1);
    let next = engine.track_usage("hot", later).unwrap();
    assert!(!next.rate_limited);
    assert_eq!(next.usage_count, 11);

    let err = engine.track_usage("ghost", now).unwrap_err();
    assert_eq!(err.wire_code(), "NOT_FOUND");
}

#[test]
fn usage_survives_flush_and_engine_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut engine = engine_in(dir.path(), true);
        engine.add(add_req("a", "body"), Utc::now()).unwrap();
        engine.track_usage("a", Utc::now()).unwrap();
        engine.track_usage("a", Utc::now()).unwrap();
        assert!(engine.usage_is_dirty());
        assert!(engine.flush_usage().unwrap());
        assert!(!engine.flush_usage().unwrap(), "clean flush is a no-op");
    }

    let mut engine = engine_in(dir.path(), true);
    let hotset = engine.usage_hotset(5);
    assert_eq!(hotset.len(), 1);
    assert_eq!(hotset[0].0, "a");
    assert_eq!(hotset[0].1.usage_count, 2);

    let entry = engine.get("a").unwrap();
    assert_eq!(entry.usage_count, Some(2));
}

#[test]
fn corrupt_entry_files_are_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(dir.path(), true);
    engine.add(add_req("good", "body"), Utc::now()).unwrap();
    std::fs::write(dir.path().join("broken.json"), b"{ not json").unwrap();

    let view = engine.reload().unwrap();
    assert_eq!(view.entries.len(), 1);
    assert_eq!(view.skipped, 1);
}
