//! Tags and tag search results

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metric::MetricFamily;
use crate::constants::MAX_TAG_LENGTH;
use crate::{MtrError, Result};

/// Summary of one tagged series as returned by a tag search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedSeries {
    pub entity_id: String,
    pub type_id: String,
    pub time: DateTime<Utc>,
    /// Latest value in display units.
    pub value: f64,
    pub unit: String,
}

/// Merged result of a tag fan-out search, keyed by metric family.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagSearchResult {
    pub tag: String,
    pub families: BTreeMap<MetricFamily, Vec<TaggedSeries>>,
}

impl TagSearchResult {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into(), families: BTreeMap::new() }
    }

    /// Rows for `family`; empty if the family had no matches.
    pub fn family(&self, family: MetricFamily) -> &[TaggedSeries] {
        self.families.get(&family).map_or(&[], Vec::as_slice)
    }

    /// Total number of rows across families.
    pub fn len(&self) -> usize {
        self.families.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validate a tag label.
///
/// # Errors
/// `MtrError::Validation` for empty, whitespace-padded, or oversized tags.
pub fn validate_tag(tag: &str) -> Result<()> {
    if tag.is_empty() {
        return Err(MtrError::validation("tag must not be empty"));
    }
    if tag.trim() != tag {
        return Err(MtrError::Validation(format!(
            "tag {tag:?} must not have leading or trailing whitespace"
        )));
    }
    if tag.len() > MAX_TAG_LENGTH {
        return Err(MtrError::Validation(format!("tag exceeds {MAX_TAG_LENGTH} bytes")));
    }
    Ok(())
}
