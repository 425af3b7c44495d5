use serde_json::Value;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::db;
use crate::models::{
    AddMatchesResult, EventMetricRange, EventSummary, MatchTrendPoint, ScoutRecord, TeamOverview,
    TeamSummary,
};
use crate::normalize::{self, RawInput, RawRow};
use crate::stats::{self, RangeSort};
use crate::store::{self, ScoutStore};
use crate::sync::SyncClient;

pub struct ScoutingService {
    store: ScoutStore,
    pool: SqlitePool,
    sync: Option<SyncClient>,
}

impl ScoutingService {
    pub fn new(pool: SqlitePool, sync: Option<SyncClient>) -> Self {
        Self {
            store: ScoutStore::new(Vec::new()),
            pool,
            sync,
        }
    }

    pub async fn restore(&mut self) {
        let cached = normalize::normalize(&self.cached_rows().await);
        self.store.replace(cached);
    }

    pub fn records(&self) -> &[ScoutRecord] {
        self.store.records()
    }

    async fn cached_rows(&self) -> Vec<RawRow> {
        match db::read_cache(&self.pool).await {
            Ok(rows) => rows.unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "failed to read local cache, continuing without it");
                Vec::new()
            }
        }
    }

    async fn persist(&self) {
        if let Err(err) = db::write_cache(&self.pool, self.store.records()).await {
            error!(error = %err, "failed to write local cache");
        }
    }

    /// Replaces the store with the baseline export reconciled against the
    /// cache. Cached rows win over baseline rows with the same key.
    pub async fn load_baseline(&mut self, rows: &[RawRow]) {
        let baseline = normalize::normalize(rows);
        let cached = normalize::normalize(&self.cached_rows().await);
        if !cached.is_empty() {
            info!(records = cached.len(), "merging cached matches over baseline");
        }

        let merged = store::merge(&baseline, &cached);
        self.store.replace(merged);
        self.persist().await;
        info!(records = self.store.records().len(), "scouting data ready");
    }

    /// Accepts a single row object, a list of row objects, or positional
    /// QR rows. New rows are cached and pushed to the bridge.
    pub async fn add_matches(&mut self, raw: Value) -> AddMatchesResult {
        let Some(input) = RawInput::decode(raw) else {
            return AddMatchesResult::rejected("unrecognized input shape");
        };
        let candidates = input.into_rows();
        let outcome = self.store.add_records(&candidates);

        if outcome.accepted.is_empty() {
            let message = if outcome.rejected_as_duplicate > 0 {
                "all rows were duplicates"
            } else {
                "no valid rows"
            };
            info!(
                duplicates = outcome.rejected_as_duplicate,
                invalid = outcome.rejected_invalid,
                "nothing added"
            );
            return AddMatchesResult::rejected(message);
        }

        self.persist().await;
        self.push(&outcome.accepted).await;

        info!(
            added = outcome.accepted.len(),
            duplicates = outcome.rejected_as_duplicate,
            invalid = outcome.rejected_invalid,
            "matches added"
        );
        AddMatchesResult::accepted(outcome.accepted.len())
    }

    async fn push(&self, records: &[ScoutRecord]) {
        let Some(sync) = &self.sync else {
            return;
        };
        if let Err(err) = sync.push_remote(records).await {
            warn!(bridge = sync.base_url(), error = %err, "could not push to bridge");
        }
    }

    /// Pulls the bridge dataset and loads it as the new baseline. Returns
    /// `false`, leaving the store untouched, when the bridge is unreachable
    /// or its export cannot be read.
    pub async fn refresh_from_remote(&mut self) -> bool {
        let Some(sync) = &self.sync else {
            warn!("no bridge configured");
            return false;
        };

        let text = match sync.fetch_remote().await {
            Ok(text) => text,
            Err(err) => {
                warn!(bridge = sync.base_url(), error = %err, "bridge not available");
                return false;
            }
        };
        let rows = match normalize::parse_csv_rows(&text) {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "bridge export is not valid CSV");
                return false;
            }
        };

        self.load_baseline(&rows).await;
        true
    }

    pub async fn clear_cache(&mut self) -> anyhow::Result<bool> {
        db::clear_cache(&self.pool).await
    }

    pub fn teams(&self) -> Vec<TeamSummary> {
        stats::team_summaries(self.records())
    }

    pub fn event_summary(&self) -> EventSummary {
        stats::event_summary(self.records())
    }

    pub fn overview(&self, team_num: u32) -> Option<TeamOverview> {
        stats::team_overview(self.records(), team_num)
    }

    pub fn trend(&self, team_num: u32) -> Vec<MatchTrendPoint> {
        stats::team_trend(self.records(), team_num)
    }

    pub fn event_metric(&self, metric_key: &str, sort: RangeSort) -> Vec<EventMetricRange> {
        stats::sort_ranges(stats::event_metric_range(self.records(), metric_key), sort)
    }

    pub fn compare(&self, teams: &[u32]) -> Vec<TeamOverview> {
        stats::compare_teams(self.records(), teams)
    }
}
