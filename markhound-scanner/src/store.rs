use crate::result::{MatchRecord, Observation, RecordKey, truncate_chars};
use chrono::Utc;
use std::collections::HashSet;

/// Append-only, deduplicated collection of match records.
#[derive(Debug, Default)]
pub struct ResultStore {
    records: Vec<MatchRecord>,
    seen: HashSet<RecordKey>,
    snippet_limit: usize,
}

impl ResultStore {
    pub fn new(snippet_limit: usize) -> Self {
        Self {
            records: Vec::new(),
            seen: HashSet::new(),
            snippet_limit,
        }
    }

    /// Insert a record unless a structurally identical one is already
    /// stored. Returns whether it was added.
    pub fn insert(&mut self, record: MatchRecord) -> bool {
        if self.seen.insert(record.key()) {
            self.records.push(record);
            true
        } else {
            false
        }
    }

    /// Fan an observation out into one record per keyword.
    pub fn record(&mut self, observation: &Observation<'_>, keywords: &[String]) -> usize {
        let content = truncate_chars(observation.content, self.snippet_limit);
        let mut added = 0;
        for keyword in keywords {
            let record = MatchRecord {
                source_url: observation.source_url.to_string(),
                matched_url: observation.matched_url.to_string(),
                element: observation.element.to_string(),
                attribute: observation.attribute.to_string(),
                keyword: keyword.clone(),
                content: content.clone(),
                location_type: observation.location_type,
                timestamp: Utc::now(),
            };
            if self.insert(record) {
                added += 1;
            }
        }
        added
    }

    pub fn records(&self) -> &[MatchRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The most recent `n` records, oldest first.
    pub fn latest(&self, n: usize) -> &[MatchRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }
}
