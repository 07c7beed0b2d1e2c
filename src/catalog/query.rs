//! Catalog query filters.
//!
//! All filters are ANDed together; within `categories_any` the members are
//! ORed, within `categories_all` every member must be present.

use crate::catalog::model::{Entry, PriorityTier, Requirement};
use serde::Deserialize;

/// Filter set for `catalog.query`. Every field is optional.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryFilters {
    /// Entry must carry every one of these categories.
    pub categories_all: Vec<String>,
    /// Entry must carry at least one of these categories.
    pub categories_any: Vec<String>,
    /// Entry requirement must be in this set.
    pub requirements: Vec<Requirement>,
    /// Inclusive priority bounds (lower number = more important).
    pub priority_min: Option<i64>,
    pub priority_max: Option<i64>,
    /// Governance tier filter.
    pub priority_tier: Option<PriorityTier>,
    /// Case-insensitive substring over title and body.
    pub text: Option<String>,
    /// Pagination.
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl QueryFilters {
    /// Whether `entry` passes every filter (pagination excluded).
    pub fn matches(&self, entry: &Entry) -> bool {
        if !self.categories_all.is_empty() {
            let all_present = self
                .categories_all
                .iter()
                .all(|c| entry.categories.iter().any(|ec| ec == &c.to_lowercase()));
            if !all_present {
                return false;
            }
        }

        if !self.categories_any.is_empty() {
            let any_present = self
                .categories_any
                .iter()
                .any(|c| entry.categories.iter().any(|ec| ec == &c.to_lowercase()));
            if !any_present {
                return false;
            }
        }

        if !self.requirements.is_empty() && !self.requirements.contains(&entry.requirement) {
            return false;
        }

        if let Some(min) = self.priority_min {
            if entry.priority < min {
                return false;
            }
        }
        if let Some(max) = self.priority_max {
            if entry.priority > max {
                return false;
            }
        }

        if let Some(tier) = self.priority_tier {
            match &entry.governance {
                Some(gov) if gov.priority_tier == tier => {}
                _ => return false,
            }
        }

        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            if !needle.is_empty()
                && !entry.title.to_lowercase().contains(&needle)
                && !entry.body.to_lowercase().contains(&needle)
            {
                return false;
            }
        }

        true
    }

    /// Apply filters and pagination over an id-ordered entry slice.
    ///
    /// Returns `(page, total_matched)`.
    pub fn apply<'a>(&self, entries: &'a [Entry]) -> (Vec<&'a Entry>, usize) {
        let matched: Vec<&Entry> = entries.iter().filter(|e| self.matches(e)).collect();
        let total = matched.len();
        let offset = self.offset.unwrap_or(0).min(total);
        let end = match self.limit {
            Some(limit) => (offset + limit).min(total),
            None => total,
        };
        (matched[offset..end].to_vec(), total)
    }
}
