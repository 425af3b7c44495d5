use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::ScoutRecord;
use crate::stats::{self, MetricKey};

pub fn build_team_report(records: &[ScoutRecord], team_num: u32, generated_at: DateTime<Utc>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Team {team_num} Scouting Report");
    let _ = writeln!(output, "Generated {}", generated_at.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(output);

    let Some(overview) = stats::team_overview(records, team_num) else {
        let _ = writeln!(output, "No matches scouted for this team.");
        return output;
    };

    let _ = writeln!(output, "## Performance");
    let _ = writeln!(output, "- Matches played: {}", overview.matches_played);
    let _ = writeln!(
        output,
        "- Total points: avg {:.2}, best {:.0}",
        overview.overall.avg_total_pts, overview.overall.max_total_pts
    );
    let _ = writeln!(
        output,
        "- Auto: avg {:.2} pts, active in {:.0}% of matches",
        overview.auto.avg_total_pts,
        overview.auto.success_rate * 100.0
    );
    let _ = writeln!(
        output,
        "- Teleop: avg {:.2} pts ({:.2} fuel), hang success {:.0}%, usual climb level {}",
        overview.teleop.avg_total_pts,
        overview.teleop.avg_fuel_pts,
        overview.teleop.hang_success_rate * 100.0,
        overview.teleop.mode_climb_level
    );

    let latest = &overview.advanced.latest;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Robot");
    let _ = writeln!(
        output,
        "- Chassis {}, intake {}, hopper {}, shooter {}",
        latest.chassis, latest.intake, latest.hopper_capacity, latest.shooter.raw
    );
    let _ = writeln!(output, "- Climber: {}", if latest.climber { "yes" } else { "no" });
    let _ = writeln!(
        output,
        "- Role {}, field path {}",
        overview.advanced.typical.role, overview.advanced.typical.trench
    );

    let reliability = &overview.advanced.reliability;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Reliability");
    if reliability.broke.occurred {
        let _ = writeln!(output, "- Broke in matches {:?}", reliability.broke.matches);
        let _ = writeln!(output, "- Fixed in matches {:?}", reliability.fixed.matches);
    } else {
        let _ = writeln!(output, "- No breakdowns recorded.");
    }
    if reliability.currently_broken {
        let _ = writeln!(output, "- **Currently broken**");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Match Trend");
    for point in stats::team_trend(records, team_num) {
        let marker = if point.anomaly { " (anomaly)" } else { "" };
        let _ = writeln!(
            output,
            "- Match {}: {:.0} pts, z {:+.2}{}",
            point.match_num, point.match_total_pts, point.z_score, marker
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Comments");
    if overview.comments.is_empty() {
        let _ = writeln!(output, "No comments recorded.");
    } else {
        for comment in overview.comments.iter().take(5) {
            let _ = writeln!(
                output,
                "- Match {} ({}): {}",
                comment.match_num, comment.scouter, comment.text
            );
        }
    }

    output
}

pub fn build_event_report(records: &[ScoutRecord], metric: MetricKey, generated_at: DateTime<Utc>) -> String {
    let summary = stats::event_summary(records);
    let ranges = stats::event_metric_range(records, metric.as_str());

    let mut output = String::new();
    let _ = writeln!(output, "# Event Scouting Report");
    let _ = writeln!(output, "Generated {}", generated_at.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Teams: {}", summary.total_teams);
    let _ = writeln!(output, "- Matches scouted: {}", summary.matches_scouted);
    let _ = writeln!(output, "- Event average: {:.2} pts", summary.event_avg_total_pts);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Ranking by {}", metric.label());
    if ranges.is_empty() {
        let _ = writeln!(output, "No matches scouted yet.");
    } else {
        for (idx, range) in ranges.iter().enumerate() {
            let _ = writeln!(
                output,
                "{}. Team {}: avg {:.2} (min {:.2}, max {:.2})",
                idx + 1,
                range.team_num,
                range.avg,
                range.min,
                range.max
            );
        }
    }

    output
}
