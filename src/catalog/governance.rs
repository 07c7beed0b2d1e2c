//! Governance defaults, tier derivation, and the governance hash.
//!
//! The governance hash covers a curated projection of governance fields only,
//! so it detects governance drift independently of body edits: a pure body
//! edit changes the aggregate content hash but not the governance hash.

use crate::catalog::model::{
    ChangeLogEntry, Entry, Governance, GovernanceStatus, PriorityTier, Requirement,
};
use crate::types::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Seed version for a fresh governance block.
pub const INITIAL_VERSION: &str = "1.0.0";

/// Derive the review tier from priority and requirement.
///
/// Mandatory/critical entries are tier P0 when high priority (low number),
/// P1 otherwise; recommended maps to P2; optional/deprecated to P3.
pub fn derive_priority_tier(priority: i64, requirement: Requirement) -> PriorityTier {
    match requirement {
        Requirement::Mandatory | Requirement::Critical => {
            if priority <= 10 {
                PriorityTier::P0
            } else {
                PriorityTier::P1
            }
        }
        Requirement::Recommended => PriorityTier::P2,
        Requirement::Optional | Requirement::Deprecated => PriorityTier::P3,
    }
}

/// Build a default governance block for a freshly added entry.
pub fn default_governance(
    priority: i64,
    requirement: Requirement,
    owner: Option<String>,
    now: DateTime<Utc>,
) -> Governance {
    Governance {
        version: INITIAL_VERSION.to_string(),
        status: GovernanceStatus::Active,
        owner: owner.unwrap_or_else(|| "unassigned".to_string()),
        priority_tier: derive_priority_tier(priority, requirement),
        classification: None,
        last_reviewed_at: None,
        next_review_due: None,
        semantic_summary: None,
        change_log: vec![ChangeLogEntry::new(now, "created", vec!["*".to_string()])],
    }
}

/// Per-entry projection that feeds the governance hash.
#[derive(Debug, Serialize)]
struct GovernanceProjection<'a> {
    id: &'a str,
    title: &'a str,
    version: &'a str,
    owner: &'a str,
    priority_tier: PriorityTier,
    next_review_due: Option<DateTime<Utc>>,
    summary_digest: String,
    change_log_len: usize,
}

/// Digest over the sorted governance projections of all entries.
///
/// Every entry is projected. Hand-authored documents without a governance
/// block get a stable placeholder projection so their presence (and derived
/// tier) still moves the hash.
pub fn governance_hash<'a, I>(entries: I) -> Result<String>
where
    I: IntoIterator<Item = &'a Entry>,
{
    let mut projections: Vec<GovernanceProjection<'_>> = entries
        .into_iter()
        .map(|entry| match entry.governance.as_ref() {
            Some(gov) => GovernanceProjection {
                id: entry.id.as_str(),
                title: &entry.title,
                version: &gov.version,
                owner: &gov.owner,
                priority_tier: gov.priority_tier,
                next_review_due: gov.next_review_due,
                summary_digest: crate::hash::digest_text(
                    gov.semantic_summary.as_deref().unwrap_or(""),
                ),
                change_log_len: gov.change_log.len(),
            },
            None => GovernanceProjection {
                id: entry.id.as_str(),
                title: &entry.title,
                version: "",
                owner: "",
                priority_tier: derive_priority_tier(entry.priority, entry.requirement),
                next_review_due: None,
                summary_digest: crate::hash::digest_text(""),
                change_log_len: 0,
            },
        })
        .collect();
    projections.sort_by(|a, b| a.id.cmp(b.id));

    let bytes = serde_json::to_vec(&projections)?;
    Ok(crate::hash::digest_bytes(&bytes))
}

/// Governance fields a client may change through `catalog.governanceUpdate`.
#[derive(Debug, Default, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GovernancePatch {
    pub version: Option<String>,
    pub status: Option<GovernanceStatus>,
    pub owner: Option<String>,
    pub priority_tier: Option<PriorityTier>,
    pub classification: Option<String>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub next_review_due: Option<DateTime<Utc>>,
    pub semantic_summary: Option<String>,
}

impl GovernancePatch {
    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    fn changed_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        if self.version.is_some() {
            fields.push("version".to_string());
        }
        if self.status.is_some() {
            fields.push("status".to_string());
        }
        if self.owner.is_some() {
            fields.push("owner".to_string());
        }
        if self.priority_tier.is_some() {
            fields.push("priorityTier".to_string());
        }
        if self.classification.is_some() {
            fields.push("classification".to_string());
        }
        if self.last_reviewed_at.is_some() {
            fields.push("lastReviewedAt".to_string());
        }
        if self.next_review_due.is_some() {
            fields.push("nextReviewDue".to_string());
        }
        if self.semantic_summary.is_some() {
            fields.push("semanticSummary".to_string());
        }
        fields
    }
}

/// Apply a governance patch, appending a change-log entry.
///
/// When the patch does not set `version` explicitly, the patch component of
/// the semver-ish version string is bumped.
pub fn apply_patch(
    governance: &mut Governance,
    patch: &GovernancePatch,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Vec<String>> {
    let fields = patch.changed_fields();
    if fields.is_empty() {
        return Err(Error::validation("governance update sets no fields"));
    }

    if let Some(status) = patch.status {
        governance.status = status;
    }
    if let Some(owner) = &patch.owner {
        governance.owner = owner.clone();
    }
    if let Some(tier) = patch.priority_tier {
        governance.priority_tier = tier;
    }
    if let Some(classification) = &patch.classification {
        governance.classification = Some(classification.clone());
    }
    if let Some(at) = patch.last_reviewed_at {
        governance.last_reviewed_at = Some(at);
    }
    if let Some(due) = patch.next_review_due {
        governance.next_review_due = Some(due);
    }
    if let Some(summary) = &patch.semantic_summary {
        governance.semantic_summary = Some(summary.clone());
    }
    governance.version = match &patch.version {
        Some(explicit) => explicit.clone(),
        None => bump_patch_version(&governance.version),
    };

    governance.change_log.push(ChangeLogEntry::new(
        now,
        note.unwrap_or("governance update"),
        fields.clone(),
    ));
    Ok(fields)
}

fn bump_patch_version(version: &str) -> String {
    let mut parts: Vec<u64> = version.split('.').filter_map(|p| p.parse().ok()).collect();
    if parts.len() != 3 {
        return INITIAL_VERSION.to_string();
    }
    parts[2] += 1;
    format!("{}.{}.{}", parts[0], parts[1], parts[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::model::{Audience, SCHEMA_VERSION};
    use crate::types::EntryId;

    fn entry_with_gov(id: &str, body: &str, summary: Option<&str>) -> Entry {
        let now = Utc::now();
        Entry {
            id: EntryId::new(id).unwrap(),
            title: format!("Entry {}", id),
            body: body.to_string(),
            priority: 20,
            audience: Audience::All,
            requirement: Requirement::Recommended,
            categories: vec![],
            risk_score: None,
            source_hash: crate::hash::digest_text(body),
            schema_version: SCHEMA_VERSION,
            created_at: now,
            updated_at: now,
            usage_count: None,
            last_used_at: None,
            first_seen_ts: None,
            governance: Some(Governance {
                semantic_summary: summary.map(|s| s.to_string()),
                ..default_governance(20, Requirement::Recommended, None, now)
            }),
        }
    }

    #[test]
    fn tier_derivation() {
        assert_eq!(
            derive_priority_tier(5, Requirement::Mandatory),
            PriorityTier::P0
        );
        assert_eq!(
            derive_priority_tier(50, Requirement::Critical),
            PriorityTier::P1
        );
        assert_eq!(
            derive_priority_tier(1, Requirement::Recommended),
            PriorityTier::P2
        );
        assert_eq!(
            derive_priority_tier(1, Requirement::Deprecated),
            PriorityTier::P3
        );
    }

    #[test]
    fn governance_hash_ignores_body_edits() {
        let a = entry_with_gov("e1", "body one", Some("summary"));
        let mut b = a.clone();
        b.body = "a different body".to_string();
        b.source_hash = crate::hash::digest_text(&b.body);

        let ha = governance_hash([&a]).unwrap();
        let hb = governance_hash([&b]).unwrap();
        assert_eq!(ha, hb);
    }

    #[test]
    fn governance_hash_tracks_field_changes() {
        let a = entry_with_gov("e1", "body", Some("summary"));
        let base = governance_hash([&a]).unwrap();

        let mut owner_changed = a.clone();
        owner_changed.governance.as_mut().unwrap().owner = "alice".to_string();
        assert_ne!(base, governance_hash([&owner_changed]).unwrap());

        let mut summary_changed = a.clone();
        summary_changed.governance.as_mut().unwrap().semantic_summary =
            Some("another summary".to_string());
        assert_ne!(base, governance_hash([&summary_changed]).unwrap());

        let mut log_grew = a.clone();
        log_grew
            .governance
            .as_mut()
            .unwrap()
            .change_log
            .push(ChangeLogEntry::new(Utc::now(), "note", vec![]));
        assert_ne!(base, governance_hash([&log_grew]).unwrap());
    }

    #[test]
    fn governance_hash_sees_entries_without_a_governance_block() {
        let governed = entry_with_gov("e1", "body", None);
        let mut bare = entry_with_gov("e2", "body two", None);
        bare.governance = None;

        let with_bare = governance_hash([&governed, &bare]).unwrap();
        let without_bare = governance_hash([&governed]).unwrap();
        assert_ne!(with_bare, without_bare);

        // The placeholder is stable: same inputs, same digest.
        assert_eq!(with_bare, governance_hash([&governed, &bare]).unwrap());

        // Tier drift on a bare entry is visible through the derived tier.
        let mut demoted = bare.clone();
        demoted.requirement = Requirement::Optional;
        assert_ne!(
            with_bare,
            governance_hash([&governed, &demoted]).unwrap()
        );
    }

    #[test]
    fn apply_patch_bumps_patch_version_and_logs() {
        let now = Utc::now();
        let mut gov = default_governance(20, Requirement::Recommended, None, now);
        assert_eq!(gov.version, "1.0.0");
        assert_eq!(gov.change_log.len(), 1);

        let patch = GovernancePatch {
            owner: Some("alice".to_string()),
            ..Default::default()
        };
        let fields = apply_patch(&mut gov, &patch, Some("reassign"), now).unwrap();
        assert_eq!(fields, vec!["owner"]);
        assert_eq!(gov.version, "1.0.1");
        assert_eq!(gov.owner, "alice");
        assert_eq!(gov.change_log.len(), 2);
        assert_eq!(gov.change_log[1].note, "reassign");
    }

    #[test]
    fn apply_patch_respects_explicit_version() {
        let now = Utc::now();
        let mut gov = default_governance(20, Requirement::Recommended, None, now);
        let patch = GovernancePatch {
            version: Some("2.0.0".to_string()),
            status: Some(GovernanceStatus::Review),
            ..Default::default()
        };
        apply_patch(&mut gov, &patch, None, now).unwrap();
        assert_eq!(gov.version, "2.0.0");
    }

    #[test]
    fn empty_patch_is_rejected() {
        let now = Utc::now();
        let mut gov = default_governance(20, Requirement::Recommended, None, now);
        let err = apply_patch(&mut gov, &GovernancePatch::default(), None, now).unwrap_err();
        assert_eq!(err.wire_code(), "INVALID_PARAMS");
    }
}
