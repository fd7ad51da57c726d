//! Grouping and counting over record streams
//!
//! [`GroupCounter`] is fed one record at a time and tallies the value found
//! at the group-by path. [`count_records`] drives it over an iterator of
//! stored records, which is how the line store answers count queries.

use indexmap::IndexMap;
use serde_json::Value;

use crate::store::{StoreError, StoreResult};
use crate::types::{FieldPath, GroupCountResult};

/// Key used for every record when no `group_by` is requested
pub const ALL_RECORDS_KEY: &str = "*";

/// Render a grouped value as a count key
///
/// Strings keep their raw text, everything else uses compact JSON.
pub fn group_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Incremental group-by counter
#[derive(Debug)]
pub struct GroupCounter {
    grouped_by: Option<String>,
    path: Option<FieldPath>,
    counts: IndexMap<String, u64>,
    record_count: u64,
    error_count: u64,
}

impl GroupCounter {
    /// Create a counter for `group_by`, or a count-all counter when `None`
    pub fn new(group_by: Option<&str>, sep: char) -> Self {
        let group_by = group_by.filter(|g| !g.trim().is_empty());
        Self {
            grouped_by: group_by.map(str::to_string),
            path: group_by.map(|g| FieldPath::parse(g, sep)),
            counts: IndexMap::new(),
            record_count: 0,
            error_count: 0,
        }
    }

    /// Tally one record; an unresolvable path counts as an error
    pub fn observe(&mut self, record: &Value) {
        self.record_count += 1;
        match &self.path {
            None => *self.counts.entry(ALL_RECORDS_KEY.to_string()).or_insert(0) += 1,
            Some(path) => match path.resolve(record) {
                Ok(value) => *self.counts.entry(group_key(value)).or_insert(0) += 1,
                Err(e) => {
                    tracing::trace!(error = %e, "group_by path did not resolve");
                    self.error_count += 1;
                }
            },
        }
    }

    /// Tally a record that could not be read at all
    pub fn observe_error(&mut self) {
        self.record_count += 1;
        self.error_count += 1;
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub fn finish(self) -> GroupCountResult {
        if self.record_count == 0 {
            return GroupCountResult::empty();
        }
        GroupCountResult {
            grouped_key_count: self.counts.len() as u64,
            counts: self.counts,
            record_count: self.record_count,
            error_count: (self.error_count > 0).then_some(self.error_count),
            grouped_by: self.grouped_by,
        }
    }
}

/// Count records from `records`, considering at most `limit` of them
///
/// Malformed records are tallied as errors; any other error aborts the scan.
/// A `limit` of `None` or `Some(0)` consumes the whole iterator.
pub fn count_records<I>(
    records: I,
    group_by: Option<&str>,
    sep: char,
    limit: Option<usize>,
) -> StoreResult<GroupCountResult>
where
    I: IntoIterator<Item = StoreResult<Value>>,
{
    let limit = limit.filter(|&l| l > 0);
    let mut counter = GroupCounter::new(group_by, sep);

    let mut records = records.into_iter();
    loop {
        // Stop before reading past the limit
        if limit.is_some_and(|limit| counter.record_count() >= limit as u64) {
            break;
        }
        let Some(item) = records.next() else {
            break;
        };
        match item {
            Ok(record) => counter.observe(&record),
            Err(StoreError::Json(e)) => {
                tracing::warn!(error = %e, "skipping malformed record");
                counter.observe_error();
            }
            Err(e) => return Err(e),
        }
    }

    Ok(counter.finish())
}
