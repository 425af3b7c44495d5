use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::models::{
    label_for, AdvancedStats, AutoStats, BrokeHistory, EventMetricRange, EventSummary,
    FixedHistory, LatestLoadout, MatchDetails, MatchTrendPoint, OverallStats, Reliability,
    ScoutRecord, ScouterComment, ShooterLoadout, TeamOverview, TeamSummary, TeleopStats,
    TrendEntry, TypicalUsage, CHASSIS_LABELS, HOPPER_LABELS, INTAKE_LABELS, ROLE_LABELS,
    SHOOTER_LABELS, TRENCH_LABELS,
};

const ANOMALY_THRESHOLD: f64 = 1.5;
const MISSING_COMMENT: &str = "nan";

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Most frequent value. Ties go to the lowest value, so the answer does not
/// depend on input order.
pub fn mode(values: &[i64]) -> Option<i64> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(*value).or_insert(0) += 1;
    }

    let mut best: Option<(i64, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn flag(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKey {
    MatchTotalPts,
    AutoTotalPts,
    TeleTotalPts,
    TeleFuel,
    AutoSuccessRate,
    TeleHangSuccessRate,
    BreakRate,
    TeleModeHang,
}

impl MetricKey {
    pub const ALL: [MetricKey; 8] = [
        MetricKey::MatchTotalPts,
        MetricKey::AutoTotalPts,
        MetricKey::TeleTotalPts,
        MetricKey::TeleFuel,
        MetricKey::AutoSuccessRate,
        MetricKey::TeleHangSuccessRate,
        MetricKey::BreakRate,
        MetricKey::TeleModeHang,
    ];

    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|metric| metric.as_str() == key)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKey::MatchTotalPts => "match_avg_total_pts",
            MetricKey::AutoTotalPts => "auto_total_pts",
            MetricKey::TeleTotalPts => "tele_total_pts",
            MetricKey::TeleFuel => "tele_avg_fuel",
            MetricKey::AutoSuccessRate => "auto_success_rate",
            MetricKey::TeleHangSuccessRate => "tele_hang_success_rate",
            MetricKey::BreakRate => "break_rate",
            MetricKey::TeleModeHang => "tele_mode_hang",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MetricKey::MatchTotalPts => "Match total points",
            MetricKey::AutoTotalPts => "Auto total points",
            MetricKey::TeleTotalPts => "Teleop total points",
            MetricKey::TeleFuel => "Teleop fuel points",
            MetricKey::AutoSuccessRate => "Auto success rate",
            MetricKey::TeleHangSuccessRate => "Teleop hang success rate",
            MetricKey::BreakRate => "Break rate",
            MetricKey::TeleModeHang => "Most common teleop hang level",
        }
    }

    fn values(self, matches: &[&ScoutRecord]) -> Vec<f64> {
        let per_match =
            |extract: fn(&ScoutRecord) -> f64| -> Vec<f64> { matches.iter().map(|m| extract(m)).collect() };
        match self {
            MetricKey::MatchTotalPts => per_match(|m| m.match_total_pts),
            MetricKey::AutoTotalPts => per_match(|m| m.auto_total_pts),
            MetricKey::TeleTotalPts => per_match(|m| m.tele_total_pts),
            MetricKey::TeleFuel => per_match(|m| m.tele_pts),
            MetricKey::AutoSuccessRate => per_match(|m| m.auto_active as f64),
            MetricKey::TeleHangSuccessRate => per_match(|m| flag(m.tele_hang_success)),
            MetricKey::BreakRate => per_match(|m| m.adv_broke as f64),
            MetricKey::TeleModeHang => {
                let hangs: Vec<i64> = matches.iter().map(|m| m.tele_hang).collect();
                mode(&hangs).map(|level| vec![level as f64]).unwrap_or_default()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeSort {
    #[default]
    Avg,
    Max,
    Consistency,
}

impl FromStr for RangeSort {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "avg" => Ok(RangeSort::Avg),
            "max" => Ok(RangeSort::Max),
            "consistency" => Ok(RangeSort::Consistency),
            other => Err(format!("unknown sort '{other}' (expected avg, max or consistency)")),
        }
    }
}

fn team_matches(records: &[ScoutRecord], team_num: u32) -> Vec<&ScoutRecord> {
    let mut matches: Vec<&ScoutRecord> = records.iter().filter(|r| r.team_num == team_num).collect();
    matches.sort_by_key(|r| r.sort_key());
    matches
}

fn average_of(matches: &[&ScoutRecord], extract: impl Fn(&ScoutRecord) -> f64) -> f64 {
    let values: Vec<f64> = matches.iter().map(|m| extract(m)).collect();
    round2(mean(&values))
}

fn mapped_label(table: &[&'static str], id: i64) -> String {
    label_for(table, id).unwrap_or("N/A").to_string()
}

fn present_comment(text: &str) -> Option<&str> {
    (!text.is_empty() && text != MISSING_COMMENT).then_some(text)
}

fn comment_for(record: &ScoutRecord) -> Option<ScouterComment> {
    let mut parts = Vec::new();
    if let Some(text) = present_comment(&record.auto_comm) {
        parts.push(format!("[Auto] {text}"));
    }
    if let Some(text) = present_comment(&record.tele_comm) {
        parts.push(format!("[Tele] {text}"));
    }
    if let Some(text) = present_comment(&record.adv_comments) {
        parts.push(text.to_string());
    }

    if parts.is_empty() {
        return None;
    }
    Some(ScouterComment {
        match_num: record.match_num,
        scouter: record.scouter.clone(),
        text: parts.join(" | "),
    })
}

fn display_match_type(match_type: &str) -> String {
    if match_type == "Qualification" {
        "Quals".to_string()
    } else {
        match_type.to_string()
    }
}

pub fn team_overview(records: &[ScoutRecord], team_num: u32) -> Option<TeamOverview> {
    let matches = team_matches(records, team_num);
    let latest = *matches.last()?;

    let climb_levels: Vec<i64> = matches.iter().map(|m| m.tele_hang).collect();
    let broke_matches: Vec<u32> = matches
        .iter()
        .filter(|m| m.adv_broke == 1)
        .map(|m| m.match_num)
        .collect();
    let fixed_matches: Vec<u32> = matches
        .iter()
        .filter(|m| m.adv_fixed == 1)
        .map(|m| m.match_num)
        .collect();

    let shooter_labels: Vec<String> = latest
        .adv_shooter
        .iter()
        .map(|id| label_for(SHOOTER_LABELS, *id).unwrap_or("UNKNOWN").to_string())
        .collect();
    let shooter_raw = if shooter_labels.is_empty() {
        "NONE".to_string()
    } else {
        shooter_labels.join(" + ")
    };

    let mut comments: Vec<ScouterComment> = matches.iter().filter_map(|m| comment_for(m)).collect();
    comments.reverse();

    let trend = matches
        .iter()
        .map(|m| TrendEntry {
            match_num: m.match_num,
            match_type: display_match_type(&m.match_type),
            auto_pts: m.auto_pts,
            tele_pts: m.tele_pts,
            total_pts: m.match_total_pts,
            details: MatchDetails {
                scouter: m.scouter.clone(),
                broke: m.adv_broke == 1,
                fixed: m.adv_fixed == 1,
                climb_level: m.tele_hang,
            },
        })
        .collect();

    let max_total_pts = matches
        .iter()
        .map(|m| m.match_total_pts)
        .fold(f64::NEG_INFINITY, f64::max);

    Some(TeamOverview {
        team_num,
        matches_played: matches.len(),
        comments,
        trend,
        overall: OverallStats {
            avg_total_pts: average_of(&matches, |m| m.match_total_pts),
            max_total_pts,
        },
        auto: AutoStats {
            avg_total_pts: average_of(&matches, |m| m.auto_total_pts),
            success_rate: average_of(&matches, |m| m.auto_active as f64),
        },
        teleop: TeleopStats {
            avg_total_pts: average_of(&matches, |m| m.tele_total_pts),
            avg_fuel_pts: average_of(&matches, |m| m.tele_pts),
            hang_success_rate: average_of(&matches, |m| flag(m.tele_hang_success)),
            mode_climb_level: mode(&climb_levels).unwrap_or(0),
        },
        advanced: AdvancedStats {
            latest: LatestLoadout {
                chassis: mapped_label(CHASSIS_LABELS, latest.adv_chasis),
                intake: mapped_label(INTAKE_LABELS, latest.adv_intake),
                hopper_capacity: mapped_label(HOPPER_LABELS, latest.adv_hoppercapacity),
                climber: latest.adv_climber == 1,
                shooter: ShooterLoadout {
                    labels: shooter_labels,
                    raw: shooter_raw,
                },
            },
            reliability: Reliability {
                currently_broken: latest.adv_broke == 1 && latest.adv_fixed != 1,
                broke: BrokeHistory {
                    occurred: !broke_matches.is_empty(),
                    last_match: broke_matches.last().copied(),
                    matches: broke_matches,
                },
                fixed: FixedHistory {
                    last_match: fixed_matches.last().copied(),
                    matches: fixed_matches,
                },
            },
            typical: TypicalUsage {
                role: mapped_label(ROLE_LABELS, latest.adv_role),
                trench: mapped_label(TRENCH_LABELS, latest.adv_trench),
            },
        },
    })
}

/// Min/avg/max of one metric for every team, best average first. An
/// unrecognized key produces no rows.
pub fn event_metric_range(records: &[ScoutRecord], metric_key: &str) -> Vec<EventMetricRange> {
    let metric = MetricKey::parse(metric_key);
    let mut grouped: BTreeMap<u32, Vec<&ScoutRecord>> = BTreeMap::new();
    for record in records {
        grouped.entry(record.team_num).or_default().push(record);
    }

    let mut ranges: Vec<EventMetricRange> = grouped
        .into_iter()
        .filter_map(|(team_num, matches)| {
            let values = metric.map(|m| m.values(&matches)).unwrap_or_default();
            if values.is_empty() {
                return None;
            }
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            Some(EventMetricRange {
                team_num,
                min,
                avg: mean(&values).clamp(min, max),
                max,
            })
        })
        .collect();

    ranges.sort_by(|a, b| b.avg.partial_cmp(&a.avg).unwrap_or(std::cmp::Ordering::Equal));
    ranges
}

pub fn sort_ranges(mut ranges: Vec<EventMetricRange>, sort: RangeSort) -> Vec<EventMetricRange> {
    match sort {
        RangeSort::Avg => {
            ranges.sort_by(|a, b| b.avg.partial_cmp(&a.avg).unwrap_or(std::cmp::Ordering::Equal))
        }
        RangeSort::Max => {
            ranges.sort_by(|a, b| b.max.partial_cmp(&a.max).unwrap_or(std::cmp::Ordering::Equal))
        }
        RangeSort::Consistency => ranges.sort_by(|a, b| {
            (a.max - a.min)
                .partial_cmp(&(b.max - b.min))
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
    }
    ranges
}

pub fn team_trend(records: &[ScoutRecord], team_num: u32) -> Vec<MatchTrendPoint> {
    let matches = team_matches(records, team_num);
    let points: Vec<f64> = matches.iter().map(|m| m.match_total_pts).collect();

    let avg = mean(&points);
    let std_dev = if points.len() > 1 {
        sample_std_dev(&points)
    } else {
        1.0
    };
    // Identical totals are flat regardless of float noise in the mean.
    let flat = points.windows(2).all(|pair| pair[0] == pair[1]);

    matches
        .iter()
        .map(|m| {
            let z_score = if flat || std_dev == 0.0 {
                0.0
            } else {
                (m.match_total_pts - avg) / std_dev
            };
            MatchTrendPoint {
                match_num: m.match_num,
                match_total_pts: m.match_total_pts,
                z_score: round2(z_score),
                anomaly: z_score.abs() > ANOMALY_THRESHOLD,
            }
        })
        .collect()
}

pub fn team_summaries(records: &[ScoutRecord]) -> Vec<TeamSummary> {
    let teams: BTreeSet<u32> = records.iter().map(|r| r.team_num).collect();
    teams
        .into_iter()
        .map(|team_num| {
            let totals: Vec<f64> = records
                .iter()
                .filter(|r| r.team_num == team_num)
                .map(|r| r.match_total_pts)
                .collect();
            TeamSummary {
                team_num,
                nickname: format!("Team {team_num}"),
                matches_played: totals.len(),
                avg_total_pts: round2(mean(&totals)),
            }
        })
        .collect()
}

pub fn event_summary(records: &[ScoutRecord]) -> EventSummary {
    let ranges = event_metric_range(records, MetricKey::MatchTotalPts.as_str());
    let averages: Vec<f64> = ranges.iter().map(|r| r.avg).collect();
    EventSummary {
        total_teams: ranges.len(),
        matches_scouted: records.len(),
        event_avg_total_pts: round2(mean(&averages)),
    }
}

pub fn compare_teams(records: &[ScoutRecord], teams: &[u32]) -> Vec<TeamOverview> {
    teams
        .iter()
        .filter_map(|team| team_overview(records, *team))
        .collect()
}
