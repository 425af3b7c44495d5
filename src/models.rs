use serde::{Deserialize, Serialize};

pub const CHASSIS_LABELS: &[&str] = &["TANK", "SWERVE", "MECANUM", "CUSTOM"];
pub const INTAKE_LABELS: &[&str] = &["OVER BUMPER", "UNDER BUMPER", "NONE"];
pub const HOPPER_LABELS: &[&str] = &["0-20", "21-40", "41-60", "61+"];
pub const ROLE_LABELS: &[&str] = &["SCORER", "FEEDER", "DEFENSE", "NONE"];
pub const TRENCH_LABELS: &[&str] = &["TRENCH", "BUMP", "BOTH", "NONE"];
pub const SHOOTER_LABELS: &[&str] = &["TURRET", "HOOD", "DUAL", "FIXED"];

/// Looks up a categorical ID in one of the label tables above.
pub fn label_for(table: &[&'static str], id: i64) -> Option<&'static str> {
    usize::try_from(id).ok().and_then(|idx| table.get(idx).copied())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Practice,
    Qualification,
    Playoff,
}

impl MatchType {
    /// Only the exact labels `Practice` and `Playoff` move a match out of
    /// the qualification bucket.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "Practice" => MatchType::Practice,
            "Playoff" => MatchType::Playoff,
            _ => MatchType::Qualification,
        }
    }

    pub fn rank(self) -> u8 {
        match self {
            MatchType::Practice => 0,
            MatchType::Qualification => 1,
            MatchType::Playoff => 2,
        }
    }
}

/// One team's performance in one match, after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoutRecord {
    pub team_num: u32,
    pub match_num: u32,
    pub match_type: String,
    pub scouter: String,
    pub timestamp: String,
    pub alliance: String,
    pub start_zone: String,

    pub auto_pts: f64,
    pub tele_pts: f64,
    pub auto_hang: i64,
    pub tele_hang: i64,
    pub auto_active: i64,

    pub adv_broke: i64,
    pub adv_fixed: i64,
    pub adv_climber: i64,
    pub adv_role: i64,
    pub adv_trench: i64,
    pub adv_chasis: i64,
    pub adv_intake: i64,
    pub adv_hoppercapacity: i64,
    pub adv_shooter: Vec<i64>,

    pub auto_comm: String,
    pub tele_comm: String,
    pub adv_comments: String,

    pub auto_total_pts: f64,
    pub tele_total_pts: f64,
    pub match_total_pts: f64,
    pub tele_hang_success: bool,
    pub type_rank: u8,
}

impl ScoutRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            match_num: self.match_num,
            team_num: self.team_num,
        }
    }

    /// Ordering key shared by normalization and every per-team query.
    pub fn sort_key(&self) -> (u8, u32) {
        (self.type_rank, self.match_num)
    }
}

/// Dedupe key. Match type is deliberately not part of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub match_num: u32,
    pub team_num: u32,
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.match_num, self.team_num)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScouterComment {
    pub match_num: u32,
    pub scouter: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchDetails {
    pub scouter: String,
    pub broke: bool,
    pub fixed: bool,
    pub climb_level: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendEntry {
    pub match_num: u32,
    pub match_type: String,
    pub auto_pts: f64,
    pub tele_pts: f64,
    pub total_pts: f64,
    pub details: MatchDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallStats {
    pub avg_total_pts: f64,
    pub max_total_pts: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutoStats {
    pub avg_total_pts: f64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeleopStats {
    pub avg_total_pts: f64,
    pub avg_fuel_pts: f64,
    pub hang_success_rate: f64,
    pub mode_climb_level: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShooterLoadout {
    pub labels: Vec<String>,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestLoadout {
    pub chassis: String,
    pub intake: String,
    pub hopper_capacity: String,
    pub climber: bool,
    pub shooter: ShooterLoadout,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokeHistory {
    pub occurred: bool,
    pub matches: Vec<u32>,
    pub last_match: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixedHistory {
    pub matches: Vec<u32>,
    pub last_match: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reliability {
    pub currently_broken: bool,
    pub broke: BrokeHistory,
    pub fixed: FixedHistory,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypicalUsage {
    pub role: String,
    pub trench: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvancedStats {
    pub latest: LatestLoadout,
    pub reliability: Reliability,
    pub typical: TypicalUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamOverview {
    pub team_num: u32,
    pub matches_played: usize,
    pub comments: Vec<ScouterComment>,
    pub trend: Vec<TrendEntry>,
    pub overall: OverallStats,
    pub auto: AutoStats,
    pub teleop: TeleopStats,
    pub advanced: AdvancedStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventMetricRange {
    pub team_num: u32,
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchTrendPoint {
    pub match_num: u32,
    pub match_total_pts: f64,
    pub z_score: f64,
    pub anomaly: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamSummary {
    pub team_num: u32,
    pub nickname: String,
    pub matches_played: usize,
    pub avg_total_pts: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSummary {
    pub total_teams: usize,
    pub matches_scouted: usize,
    pub event_avg_total_pts: f64,
}

/// Outcome of an incremental add, shaped for the capture UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddMatchesResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AddMatchesResult {
    pub fn accepted(count: usize) -> Self {
        Self {
            success: true,
            count: Some(count),
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            count: None,
            message: Some(message.into()),
        }
    }
}
