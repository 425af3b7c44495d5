use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

mod config;
mod db;
mod models;
mod normalize;
mod report;
mod scouting;
mod stats;
mod store;
mod sync;

use crate::config::Settings;
use crate::models::AddMatchesResult;
use crate::scouting::ScoutingService;
use crate::stats::{MetricKey, RangeSort};
use crate::sync::SyncClient;

#[derive(Parser)]
#[command(name = "scout-analytics")]
#[command(about = "Match scouting analytics for robotics events", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what the local cache holds
    Status,
    /// Load a baseline CSV export, keeping cached matches on top
    Load {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Replace the baseline with the bridge's dataset
    Pull,
    /// Add scanned matches (JSON text, or @path to a JSON file)
    Add {
        #[arg(long)]
        data: String,
    },
    /// List known teams
    Teams,
    /// Detailed overview of one team
    Overview {
        #[arg(long)]
        team: u32,
    },
    /// Per-match totals with anomaly flags
    Trend {
        #[arg(long)]
        team: u32,
    },
    /// Min/avg/max of a metric for every team
    Range {
        #[arg(long, default_value = "match_avg_total_pts")]
        metric: String,
        #[arg(long, default_value = "avg")]
        sort: RangeSort,
    },
    /// Side-by-side overviews
    Compare {
        #[arg(long = "team", required = true)]
        teams: Vec<u32>,
    },
    /// Generate a markdown report for a team or the whole event
    Report {
        #[arg(long)]
        team: Option<u32>,
        #[arg(long, default_value = "match_avg_total_pts")]
        metric: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Forget every cached match
    ClearCache,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_add_payload(data: &str) -> anyhow::Result<String> {
    match data.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scan payload from {path}")),
        None => Ok(data.to_string()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_tracing();
    let cli = Cli::parse();
    let settings = cli.settings;

    let pool = db::connect(&settings.cache_url).await?;
    db::init_db(&pool).await.context("failed to prepare cache schema")?;

    let sync = SyncClient::new(settings.bridge_url(), settings.bridge_timeout())?;
    let mut service = ScoutingService::new(pool.clone(), Some(sync));

    match cli.command {
        Commands::Status => match db::cache_info(&pool).await? {
            Some(info) => println!(
                "Cache holds {} matches (updated {}).",
                info.record_count, info.updated_at
            ),
            None => println!("Cache is empty."),
        },
        Commands::Load { csv } => {
            let text = std::fs::read_to_string(&csv)
                .with_context(|| format!("failed to read {}", csv.display()))?;
            let rows = normalize::parse_csv_rows(&text)?;
            service.load_baseline(&rows).await;
            println!("Loaded {} matches from {}.", service.records().len(), csv.display());
        }
        Commands::Pull => {
            service.restore().await;
            if service.refresh_from_remote().await {
                println!("Synced {} matches from {}.", service.records().len(), settings.bridge_url());
            } else {
                println!("Bridge at {} is not available; using local data.", settings.bridge_url());
            }
        }
        Commands::Add { data } => {
            service.restore().await;
            let payload = read_add_payload(&data)?;
            let result = match serde_json::from_str::<Value>(&payload) {
                Ok(raw) => service.add_matches(raw).await,
                Err(_) => AddMatchesResult::rejected("input is not valid JSON"),
            };
            if settings.json {
                print_json(&result)?;
            } else if result.success {
                println!("Added {} matches.", result.count.unwrap_or_default());
            } else {
                println!("Nothing added: {}.", result.message.as_deref().unwrap_or("unknown"));
            }
        }
        Commands::Teams => {
            service.restore().await;
            let teams = service.teams();
            if settings.json {
                print_json(&teams)?;
            } else if teams.is_empty() {
                println!("No teams scouted yet.");
            } else {
                let summary = service.event_summary();
                println!(
                    "{} teams, {} matches, event average {:.2} pts",
                    summary.total_teams, summary.matches_scouted, summary.event_avg_total_pts
                );
                for team in teams {
                    println!(
                        "- {} ({} matches) avg {:.2} pts",
                        team.nickname, team.matches_played, team.avg_total_pts
                    );
                }
            }
        }
        Commands::Overview { team } => {
            service.restore().await;
            let overview = service.overview(team);
            if settings.json {
                print_json(&overview)?;
            } else if let Some(overview) = overview {
                println!(
                    "Team {}: {} matches, avg {:.2} pts (best {:.0})",
                    overview.team_num,
                    overview.matches_played,
                    overview.overall.avg_total_pts,
                    overview.overall.max_total_pts
                );
                println!(
                    "Auto {:.2} pts ({:.0}% active), teleop {:.2} pts, hang {:.0}%, climb level {}",
                    overview.auto.avg_total_pts,
                    overview.auto.success_rate * 100.0,
                    overview.teleop.avg_total_pts,
                    overview.teleop.hang_success_rate * 100.0,
                    overview.teleop.mode_climb_level
                );
                println!(
                    "Shooter {}, currently broken: {}",
                    overview.advanced.latest.shooter.raw,
                    overview.advanced.reliability.currently_broken
                );
            } else {
                println!("No matches for team {team}.");
            }
        }
        Commands::Trend { team } => {
            service.restore().await;
            let trend = service.trend(team);
            if settings.json {
                print_json(&trend)?;
            } else if trend.is_empty() {
                println!("No matches for team {team}.");
            } else {
                for point in trend {
                    println!(
                        "- match {}: {:.0} pts, z {:+.2}{}",
                        point.match_num,
                        point.match_total_pts,
                        point.z_score,
                        if point.anomaly { " ANOMALY" } else { "" }
                    );
                }
            }
        }
        Commands::Range { metric, sort } => {
            service.restore().await;
            let ranges = service.event_metric(&metric, sort);
            if settings.json {
                print_json(&ranges)?;
            } else if ranges.is_empty() {
                println!("No data for metric '{metric}'.");
            } else {
                for range in ranges {
                    println!(
                        "- Team {}: min {:.2} avg {:.2} max {:.2}",
                        range.team_num, range.min, range.avg, range.max
                    );
                }
            }
        }
        Commands::Compare { teams } => {
            service.restore().await;
            let overviews = service.compare(&teams);
            if settings.json {
                print_json(&overviews)?;
            } else {
                for overview in overviews {
                    println!(
                        "- Team {}: avg {:.2} pts, auto {:.2}, teleop {:.2}, hang {:.0}%",
                        overview.team_num,
                        overview.overall.avg_total_pts,
                        overview.auto.avg_total_pts,
                        overview.teleop.avg_total_pts,
                        overview.teleop.hang_success_rate * 100.0
                    );
                }
            }
        }
        Commands::Report { team, metric, out } => {
            service.restore().await;
            let report = match team {
                Some(team) => report::build_team_report(service.records(), team, Utc::now()),
                None => {
                    let metric = MetricKey::parse(&metric)
                        .with_context(|| format!("unknown metric '{metric}'"))?;
                    report::build_event_report(service.records(), metric, Utc::now())
                }
            };
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::ClearCache => {
            if service.clear_cache().await? {
                info!("local cache cleared");
                println!("Cache cleared. Restart to reload the baseline.");
            } else {
                println!("Cache was already empty.");
            }
        }
    }

    Ok(())
}
