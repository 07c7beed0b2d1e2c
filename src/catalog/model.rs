//! Catalog entry model.
//!
//! One `Entry` is an addressable content unit plus governance metadata.
//! Persisted documents and wire payloads both use camelCase field names so
//! hand-edited files stay readable.

use crate::types::EntryId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current persisted document schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Who an entry is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    #[default]
    All,
    Operators,
    Developers,
    Compliance,
}

/// How binding an entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    Mandatory,
    Critical,
    #[default]
    Recommended,
    Optional,
    Deprecated,
}

impl Requirement {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mandatory" => Some(Self::Mandatory),
            "critical" => Some(Self::Critical),
            "recommended" => Some(Self::Recommended),
            "optional" => Some(Self::Optional),
            "deprecated" => Some(Self::Deprecated),
            _ => None,
        }
    }
}

/// Governance review tier, derived from priority + requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PriorityTier {
    P0,
    P1,
    P2,
    P3,
}

/// Lifecycle status of the governance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GovernanceStatus {
    Draft,
    #[default]
    Active,
    Review,
    Retired,
}

/// One audit-trail entry in the governance change log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLogEntry {
    pub id: String,
    pub at: DateTime<Utc>,
    pub note: String,
    /// Names of the governance fields touched by this change.
    #[serde(default)]
    pub fields: Vec<String>,
}

impl ChangeLogEntry {
    pub fn new(at: DateTime<Utc>, note: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            at,
            note: note.into(),
            fields,
        }
    }
}

/// Governance metadata block, versioned independently of the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Governance {
    pub version: String,
    pub status: GovernanceStatus,
    pub owner: String,
    pub priority_tier: PriorityTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_review_due: Option<DateTime<Utc>>,
    /// Curated one-paragraph summary; hashed into the governance hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_summary: Option<String>,
    #[serde(default)]
    pub change_log: Vec<ChangeLogEntry>,
}

/// One addressable content unit plus metadata.
///
/// Invariant: outside a detected-drift window, `source_hash` equals the
/// digest of `body`; `id` is immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: EntryId,
    pub title: String,
    pub body: String,
    /// Lower number = more important.
    pub priority: i64,
    #[serde(default)]
    pub audience: Audience,
    #[serde(default)]
    pub requirement: Requirement,
    /// Deduplicated, sorted, lowercase tag set.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    pub source_hash: String,
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen_ts: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub governance: Option<Governance>,
}

impl Entry {
    /// True when the stored hash matches the recomputed body digest.
    pub fn hash_is_current(&self) -> bool {
        self.source_hash == crate::hash::digest_text(&self.body)
    }
}

/// Normalize a category set: trim, lowercase, drop empties, sort, dedup.
pub fn normalize_categories(raw: &[String]) -> Vec<String> {
    let mut cats: Vec<String> = raw
        .iter()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect();
    cats.sort();
    cats.dedup();
    cats
}

/// Per-id usage bookkeeping, persisted independently of entry bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub usage_count: u64,
    pub first_seen_ts: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}
