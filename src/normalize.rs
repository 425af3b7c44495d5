use anyhow::Context;
use serde_json::{Map, Value};
use tracing::warn;

use crate::models::{MatchType, ScoutRecord};

pub type RawRow = Map<String, Value>;

/// Column order of positional rows produced by the QR capture flow.
pub const QR_SCHEMA: [&str; 24] = [
    "timestamp",
    "team_num",
    "match_num",
    "match_type",
    "alliance",
    "scouter",
    "start_zone",
    "auto_active",
    "auto_hang",
    "auto_pts",
    "auto_comm",
    "tele_pts",
    "tele_comm",
    "tele_hang",
    "adv_role",
    "adv_broke",
    "adv_fixed",
    "adv_chasis",
    "adv_intake",
    "adv_shooter",
    "adv_climber",
    "adv_hoppercapacity",
    "adv_trench",
    "adv_comments",
];

const LEGACY_HOPPER_BUCKETS: [(&str, i64); 4] =
    [("0-20", 0), ("21-40", 1), ("41-60", 2), ("61+", 3)];

#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    Object(RawRow),
    Objects(Vec<RawRow>),
    PositionalRow(Vec<Value>),
    PositionalRows(Vec<Vec<Value>>),
}

impl RawInput {
    /// Classifies a decoded JSON payload. Returns `None` for shapes that
    /// carry no rows at all (scalars, empty arrays).
    pub fn decode(value: Value) -> Option<Self> {
        match value {
            Value::Object(row) => Some(RawInput::Object(row)),
            Value::Array(items) => match items.first() {
                None => None,
                Some(Value::Array(_)) => Some(RawInput::PositionalRows(
                    items
                        .into_iter()
                        .filter_map(|item| match item {
                            Value::Array(row) => Some(row),
                            _ => None,
                        })
                        .collect(),
                )),
                Some(Value::Object(_)) => Some(RawInput::Objects(
                    items
                        .into_iter()
                        .filter_map(|item| match item {
                            Value::Object(row) => Some(row),
                            _ => None,
                        })
                        .collect(),
                )),
                Some(_) => Some(RawInput::PositionalRow(items)),
            },
            _ => None,
        }
    }

    pub fn into_rows(self) -> Vec<RawRow> {
        match self {
            RawInput::Object(row) => vec![row],
            RawInput::Objects(rows) => rows,
            RawInput::PositionalRow(row) => vec![positional_to_row(&row)],
            RawInput::PositionalRows(rows) => rows.iter().map(|row| positional_to_row(row)).collect(),
        }
    }
}

fn positional_to_row(values: &[Value]) -> RawRow {
    QR_SCHEMA
        .iter()
        .enumerate()
        .map(|(idx, key)| {
            (
                (*key).to_string(),
                values.get(idx).cloned().unwrap_or(Value::Null),
            )
        })
        .collect()
}

/// Parses CSV text with a header line into raw rows. Every cell stays text;
/// short rows simply lack the trailing columns.
pub fn parse_csv_rows(text: &str) -> anyhow::Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers().context("failed to read CSV header")?.clone();
    let mut rows = Vec::new();

    for (line, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                warn!(line = line + 2, error = %err, "skipping unreadable CSV row");
                continue;
            }
        };
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(key, cell)| (key.trim().to_string(), Value::String(cell.to_string())))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

/// Reads a number the way the scouting sheets are filled in: blanks,
/// nulls and garbage are all zero.
pub fn coerce_number(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };

    parsed.filter(|n| n.is_finite()).unwrap_or(0.0)
}

pub fn coerce_int(value: Option<&Value>) -> i64 {
    coerce_number(value) as i64
}

fn coerce_id(value: Option<&Value>) -> u32 {
    let n = coerce_number(value);
    if n >= 0.0 && n <= f64::from(u32::MAX) {
        n as u32
    } else {
        0
    }
}

/// Falsy inputs (missing, null, empty, zero, false) take the default.
pub fn coerce_string(value: Option<&Value>, default: &str) -> String {
    match value {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) if n.as_f64().is_some_and(|v| v != 0.0) => n.to_string(),
        Some(Value::Bool(true)) => "true".to_string(),
        _ => default.to_string(),
    }
}

/// Shooter IDs arrive as a single number, a hyphen-joined string
/// (`"1-2"`), a list, or not at all.
pub fn parse_list_field(value: Option<&Value>) -> Vec<i64> {
    match value {
        Some(Value::Number(n)) => n.as_f64().map(|v| vec![v as i64]).unwrap_or_default(),
        Some(Value::String(s)) if s.trim().is_empty() => Vec::new(),
        // An empty segment ("1-") reads as ID 0; unreadable segments are dropped.
        Some(Value::String(s)) => s
            .split('-')
            .map(str::trim)
            .filter_map(|part| {
                if part.is_empty() {
                    Some(0.0)
                } else {
                    part.parse::<f64>().ok()
                }
            })
            .filter(|n| n.is_finite())
            .map(|n| n as i64)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter(|item| matches!(item, Value::Number(_) | Value::String(_)))
            .map(|item| coerce_int(Some(item)))
            .collect(),
        _ => Vec::new(),
    }
}

/// Older capture builds sent the hopper bucket label instead of its ID.
fn coerce_hopper(value: Option<&Value>) -> i64 {
    if let Some(Value::String(s)) = value {
        let label = s.trim();
        if let Some((_, id)) = LEGACY_HOPPER_BUCKETS.iter().find(|(bucket, _)| *bucket == label) {
            return *id;
        }
    }
    coerce_int(value)
}

pub fn normalize_row(row: &RawRow) -> ScoutRecord {
    let auto_pts = coerce_number(row.get("auto_pts"));
    let tele_pts = coerce_number(row.get("tele_pts"));
    let auto_hang = coerce_int(row.get("auto_hang"));
    let tele_hang = coerce_int(row.get("tele_hang"));

    let auto_total_pts = auto_pts + (auto_hang as f64) * 15.0;
    let tele_total_pts = tele_pts + (tele_hang as f64) * 10.0;

    let match_type = coerce_string(row.get("match_type"), "").trim().to_string();
    let type_rank = MatchType::from_label(&match_type).rank();

    ScoutRecord {
        team_num: coerce_id(row.get("team_num")),
        match_num: coerce_id(row.get("match_num")),
        match_type,
        scouter: coerce_string(row.get("scouter"), "Anon"),
        timestamp: coerce_string(row.get("timestamp"), ""),
        alliance: coerce_string(row.get("alliance"), ""),
        start_zone: coerce_string(row.get("start_zone"), ""),

        auto_pts,
        tele_pts,
        auto_hang,
        tele_hang,
        auto_active: coerce_int(row.get("auto_active")),

        adv_broke: coerce_int(row.get("adv_broke")),
        adv_fixed: coerce_int(row.get("adv_fixed")),
        adv_climber: coerce_int(row.get("adv_climber")),
        adv_role: coerce_int(row.get("adv_role")),
        adv_trench: coerce_int(row.get("adv_trench")),
        adv_chasis: coerce_int(row.get("adv_chasis")),
        adv_intake: coerce_int(row.get("adv_intake")),
        adv_hoppercapacity: coerce_hopper(row.get("adv_hoppercapacity")),
        adv_shooter: parse_list_field(row.get("adv_shooter")),

        auto_comm: coerce_string(row.get("auto_comm"), ""),
        tele_comm: coerce_string(row.get("tele_comm"), ""),
        adv_comments: coerce_string(row.get("adv_comments"), ""),

        auto_total_pts,
        tele_total_pts,
        match_total_pts: auto_total_pts + tele_total_pts,
        tele_hang_success: tele_hang > 0,
        type_rank,
    }
}

pub fn normalize(rows: &[RawRow]) -> Vec<ScoutRecord> {
    let mut records: Vec<ScoutRecord> = rows.iter().map(normalize_row).collect();
    records.sort_by_key(ScoutRecord::sort_key);
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> RawRow {
        match value {
            Value::Object(map) => map,
            _ => panic!("test rows must be objects"),
        }
    }

    #[test]
    fn non_numeric_points_fall_back_to_zero() {
        let record = normalize_row(&row(json!({
            "team_num": "254",
            "match_num": "3",
            "auto_pts": "lots",
            "auto_hang": "1",
            "tele_pts": "",
            "tele_hang": null,
        })));

        assert_eq!(record.auto_pts, 0.0);
        assert_eq!(record.auto_total_pts, 15.0);
        assert_eq!(record.tele_pts, 0.0);
        assert_eq!(record.tele_total_pts, 0.0);
        assert_eq!(record.match_total_pts, 15.0);
        assert!(!record.tele_hang_success);
    }

    #[test]
    fn derived_totals_follow_hang_weights() {
        let record = normalize_row(&row(json!({
            "auto_pts": 12,
            "auto_hang": 1,
            "tele_pts": 30,
            "tele_hang": 2,
        })));

        assert_eq!(record.auto_total_pts, 27.0);
        assert_eq!(record.tele_total_pts, 50.0);
        assert_eq!(record.match_total_pts, 77.0);
        assert!(record.tele_hang_success);
    }

    #[test]
    fn missing_strings_take_sentinels() {
        let record = normalize_row(&RawRow::new());
        assert_eq!(record.scouter, "Anon");
        assert_eq!(record.auto_comm, "");
        assert_eq!(record.adv_comments, "");
        assert_eq!(record.team_num, 0);
        assert!(record.adv_shooter.is_empty());
    }

    #[test]
    fn match_type_ranks_only_shift_for_exact_labels() {
        let rank = |label: &str| normalize_row(&row(json!({ "match_type": label }))).type_rank;
        assert_eq!(rank("  Practice "), 0);
        assert_eq!(rank("Playoff"), 2);
        assert_eq!(rank("Qualification"), 1);
        assert_eq!(rank("playoff"), 1);
        assert_eq!(rank(""), 1);
    }

    #[test]
    fn shooter_list_accepts_every_shape() {
        assert_eq!(parse_list_field(Some(&json!(2))), vec![2]);
        assert_eq!(parse_list_field(Some(&json!("1-2"))), vec![1, 2]);
        assert_eq!(parse_list_field(Some(&json!("3"))), vec![3]);
        assert_eq!(parse_list_field(Some(&json!("1-"))), vec![1, 0]);
        assert_eq!(parse_list_field(Some(&json!("1-x-2"))), vec![1, 2]);
        assert_eq!(parse_list_field(Some(&json!("  "))), Vec::<i64>::new());
        assert_eq!(parse_list_field(Some(&json!([0, "3"]))), vec![0, 3]);
        assert_eq!(parse_list_field(Some(&json!(""))), Vec::<i64>::new());
        assert_eq!(parse_list_field(None), Vec::<i64>::new());
    }

    #[test]
    fn legacy_hopper_labels_map_to_ids() {
        let hopper = |value: Value| {
            normalize_row(&row(json!({ "adv_hoppercapacity": value }))).adv_hoppercapacity
        };
        assert_eq!(hopper(json!("41-60")), 2);
        assert_eq!(hopper(json!("61+")), 3);
        assert_eq!(hopper(json!("1")), 1);
        assert_eq!(hopper(json!("huge")), 0);
    }

    #[test]
    fn batches_sort_by_type_then_match() {
        let rows = vec![
            row(json!({ "team_num": 1, "match_num": 2, "match_type": "Playoff" })),
            row(json!({ "team_num": 1, "match_num": 9, "match_type": "Qualification" })),
            row(json!({ "team_num": 1, "match_num": 4, "match_type": "Qualification" })),
            row(json!({ "team_num": 1, "match_num": 7, "match_type": "Practice" })),
        ];

        let order: Vec<(u8, u32)> = normalize(&rows).iter().map(ScoutRecord::sort_key).collect();
        assert_eq!(order, vec![(0, 7), (1, 4), (1, 9), (2, 2)]);
    }

    #[test]
    fn decode_recognizes_each_input_shape() {
        assert!(matches!(
            RawInput::decode(json!({ "team_num": 1 })),
            Some(RawInput::Object(_))
        ));
        assert!(matches!(
            RawInput::decode(json!([{ "team_num": 1 }, { "team_num": 2 }])),
            Some(RawInput::Objects(rows)) if rows.len() == 2
        ));
        assert!(matches!(
            RawInput::decode(json!([[1, 2], [3, 4]])),
            Some(RawInput::PositionalRows(rows)) if rows.len() == 2
        ));
        assert!(matches!(
            RawInput::decode(json!(["t", 118, 5])),
            Some(RawInput::PositionalRow(_))
        ));
        assert_eq!(RawInput::decode(json!([])), None);
        assert_eq!(RawInput::decode(json!("118")), None);
    }

    #[test]
    fn positional_rows_follow_capture_schema() {
        let input = RawInput::decode(json!([
            "2026-03-01T10:00:00", 118, 5, "Qualification", "red", "Sam", "A",
            1, 1, 8, "fast", 20, "", 2, 0, 0, 0, 1, 0, "0-1", 1, "21-40", 2, "solid"
        ]))
        .expect("positional row");
        let rows = input.into_rows();
        assert_eq!(rows.len(), 1);

        let record = normalize_row(&rows[0]);
        assert_eq!(record.team_num, 118);
        assert_eq!(record.match_num, 5);
        assert_eq!(record.scouter, "Sam");
        assert_eq!(record.auto_pts, 8.0);
        assert_eq!(record.tele_hang, 2);
        assert_eq!(record.adv_shooter, vec![0, 1]);
        assert_eq!(record.adv_hoppercapacity, 1);
        assert_eq!(record.adv_comments, "solid");
    }

    #[test]
    fn short_positional_rows_leave_trailing_fields_defaulted() {
        let rows = RawInput::decode(json!([["t", 33, 2]])).expect("rows").into_rows();
        let record = normalize_row(&rows[0]);
        assert_eq!(record.team_num, 33);
        assert_eq!(record.match_num, 2);
        assert_eq!(record.scouter, "Anon");
        assert_eq!(record.adv_trench, 0);
    }

    #[test]
    fn csv_rows_keep_headers_as_keys() {
        let text = "team_num,match_num,auto_pts,scouter\n254,1,10,Kim\n\n1678,2\n";
        let rows = parse_csv_rows(text).expect("csv parses");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("scouter"), Some(&json!("Kim")));
        assert!(rows[1].get("auto_pts").is_none());

        let records = normalize(&rows);
        assert_eq!(records[1].team_num, 1678);
        assert_eq!(records[1].scouter, "Anon");
    }
}
