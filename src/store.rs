use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::models::{RecordKey, ScoutRecord};
use crate::normalize::{self, RawRow};

/// Combines two record sets keyed by `(match_num, team_num)`. On a key
/// collision the `incoming` record replaces the existing one in place, so
/// first-seen order is preserved.
pub fn merge(existing: &[ScoutRecord], incoming: &[ScoutRecord]) -> Vec<ScoutRecord> {
    let mut positions: HashMap<RecordKey, usize> = HashMap::new();
    let mut merged: Vec<ScoutRecord> = Vec::with_capacity(existing.len() + incoming.len());

    for record in existing.iter().chain(incoming.iter()) {
        match positions.get(&record.key()) {
            Some(&idx) => merged[idx] = record.clone(),
            None => {
                positions.insert(record.key(), merged.len());
                merged.push(record.clone());
            }
        }
    }

    merged
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddOutcome {
    pub accepted: Vec<ScoutRecord>,
    pub rejected_as_duplicate: usize,
    pub rejected_invalid: usize,
}

/// In-memory record collection. Owned by whoever drives the session; the
/// aggregation functions only ever see `records()`.
#[derive(Debug, Clone, Default)]
pub struct ScoutStore {
    records: Vec<ScoutRecord>,
}

impl ScoutStore {
    pub fn new(records: Vec<ScoutRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ScoutRecord] {
        &self.records
    }

    pub fn replace(&mut self, records: Vec<ScoutRecord>) {
        self.records = records;
    }

    /// Normalizes candidates and appends the ones whose key is new. Rows
    /// without a team or match number are dropped before the duplicate
    /// check. A key repeated inside the batch is kept only once.
    pub fn add_records(&mut self, candidates: &[RawRow]) -> AddOutcome {
        let mut known: HashSet<RecordKey> = self.records.iter().map(ScoutRecord::key).collect();
        let mut outcome = AddOutcome::default();

        for record in normalize::normalize(candidates) {
            if record.team_num == 0 || record.match_num == 0 {
                outcome.rejected_invalid += 1;
                continue;
            }
            if !known.insert(record.key()) {
                debug!(key = %record.key(), "rejecting duplicate match row");
                outcome.rejected_as_duplicate += 1;
                continue;
            }
            outcome.accepted.push(record);
        }

        self.records.extend(outcome.accepted.iter().cloned());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn rows(value: Value) -> Vec<RawRow> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
            _ => panic!("expected an array of rows"),
        }
    }

    fn records(value: Value) -> Vec<ScoutRecord> {
        normalize::normalize(&rows(value))
    }

    #[test]
    fn cached_rows_override_baseline() {
        let baseline = records(json!([
            { "team_num": 254, "match_num": 1, "auto_pts": 10, "tele_pts": 20 },
            { "team_num": 254, "match_num": 2, "auto_pts": 4, "tele_pts": 8 },
        ]));
        let cache = records(json!([
            { "team_num": 254, "match_num": 1, "auto_pts": 15, "tele_pts": 25 },
        ]));

        let merged = merge(&baseline, &cache);
        assert_eq!(merged.len(), 2);
        let first = merged
            .iter()
            .find(|r| r.match_num == 1)
            .expect("match 1 present");
        assert_eq!(first.auto_pts, 15.0);
        assert_eq!(first.tele_pts, 25.0);
    }

    #[test]
    fn merge_is_idempotent() {
        let a = records(json!([
            { "team_num": 1, "match_num": 1, "auto_pts": 1 },
            { "team_num": 2, "match_num": 1, "auto_pts": 2 },
        ]));
        let b = records(json!([
            { "team_num": 2, "match_num": 1, "auto_pts": 9 },
            { "team_num": 3, "match_num": 4, "auto_pts": 3 },
        ]));

        let once = merge(&a, &b);
        let twice = merge(&once, &b);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn merge_key_ignores_match_type() {
        let practice = records(json!([
            { "team_num": 971, "match_num": 3, "match_type": "Practice", "auto_pts": 2 },
        ]));
        let qual = records(json!([
            { "team_num": 971, "match_num": 3, "match_type": "Qualification", "auto_pts": 11 },
        ]));

        let merged = merge(&practice, &qual);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].match_type, "Qualification");
        assert_eq!(merged[0].auto_pts, 11.0);
    }

    #[test]
    fn add_rejects_existing_key_even_when_fields_differ() {
        let mut store = ScoutStore::new(records(json!([
            { "team_num": 118, "match_num": 5, "auto_pts": 4 },
        ])));

        let outcome = store.add_records(&rows(json!([
            { "team_num": 118, "match_num": 5, "auto_pts": 40, "scouter": "Lee" },
        ])));

        assert!(outcome.accepted.is_empty());
        assert_eq!(outcome.rejected_as_duplicate, 1);
        assert_eq!(store.records().len(), 1);
        assert_eq!(store.records()[0].auto_pts, 4.0);
    }

    #[test]
    fn record_key_reads_match_then_team() {
        let record = &records(json!([{ "team_num": 118, "match_num": 5 }]))[0];
        assert_eq!(record.key().to_string(), "5-118");
    }

    #[test]
    fn add_drops_rows_without_identity() {
        let mut store = ScoutStore::default();
        let outcome = store.add_records(&rows(json!([
            { "team_num": "", "match_num": 5 },
            { "team_num": 118, "match_num": "x" },
            { "team_num": 118, "match_num": 6 },
        ])));

        assert_eq!(outcome.rejected_invalid, 2);
        assert_eq!(outcome.rejected_as_duplicate, 0);
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(store.records().len(), 1);
    }

    #[test]
    fn add_keeps_one_copy_of_a_repeated_batch_key() {
        let mut store = ScoutStore::default();
        let outcome = store.add_records(&rows(json!([
            { "team_num": 33, "match_num": 8, "auto_pts": 1 },
            { "team_num": 33, "match_num": 8, "auto_pts": 2 },
        ])));

        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.rejected_as_duplicate, 1);
        assert_eq!(store.records().len(), 1);
    }
}
