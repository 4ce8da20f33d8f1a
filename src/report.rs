use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate;
use crate::compare;
use crate::config::Selection;
use crate::models::{
    ActiveSummary, ComparisonRow, Overview, ParticipationRow, PctChange, RawRecord, Trend,
    TrendSummary,
};
use crate::normalize::normalize;

/// Everything one render needs, computed from the two selected snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub prev_snapshot: String,
    pub last_snapshot: String,
    pub overview: Overview,
    pub participation: Vec<ParticipationRow>,
    pub comparison: Vec<ComparisonRow>,
    pub trends: TrendSummary,
    pub risers: Vec<ComparisonRow>,
    pub decliners: Vec<ComparisonRow>,
    pub active: ActiveSummary,
}

pub fn build_dashboard(
    selection: &Selection,
    prev_rows: &[RawRecord],
    last_rows: &[RawRecord],
    marker: &str,
) -> Dashboard {
    let prev = normalize(prev_rows);
    let last = normalize(last_rows);

    let prev_totals = aggregate::aggregate(&prev);
    let last_totals = aggregate::aggregate(&last);
    let comparison = compare::compare(&prev_totals, &last_totals);

    Dashboard {
        prev_snapshot: selection.prev.clone(),
        last_snapshot: selection.last.clone(),
        overview: aggregate::overview(&last_totals),
        participation: aggregate::participation(&last),
        trends: compare::summarize(&comparison),
        risers: compare::top_risers(&comparison, compare::MOVERS_LIMIT),
        decliners: compare::top_decliners(&comparison, compare::MOVERS_LIMIT),
        active: aggregate::completed_rounds(&last, marker, last_totals.len()),
        comparison,
    }
}

pub fn fmt_pct(value: PctChange) -> String {
    match value {
        PctChange::New => "∞".to_string(),
        PctChange::Finite(value) => format!("{value:+.2}%"),
    }
}

pub fn fmt_share(value: f64) -> String {
    format!("{value:.2}%")
}

pub fn fmt_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

pub fn trend_line(summary: &TrendSummary) -> String {
    format!(
        "{} {} up, {} {} down, {} {} new, {} {} unchanged",
        Trend::Up.glyph(),
        summary.up,
        Trend::Down.glyph(),
        summary.down,
        Trend::New.glyph(),
        summary.new,
        Trend::Same.glyph(),
        summary.same
    )
}

pub fn overview_text(overview: &Overview) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Total damage: {}", fmt_thousands(overview.total_damage));
    let _ = writeln!(output, "Players:      {}", overview.participants);
    let _ = writeln!(output, "Average:      {}", fmt_thousands(overview.average_damage));
    let _ = writeln!(
        output,
        "Top player:   {}",
        overview.top_participant.as_deref().unwrap_or("N/A")
    );
    output
}

pub fn participation_table(rows: &[ParticipationRow], top_n: usize) -> String {
    let mut output = String::new();
    if rows.is_empty() {
        let _ = writeln!(output, "No participants in this snapshot.");
        return output;
    }

    let _ = writeln!(
        output,
        "{:<24} {:>14} {:>10} {:>8}",
        "Player", "Damage", "Share", "Rounds"
    );
    for row in compare::top_n(rows, top_n) {
        let _ = writeln!(
            output,
            "{:<24} {:>14} {:>10} {:>8}",
            row.canonical_id,
            fmt_thousands(row.total_damage),
            fmt_share(row.share_pct),
            row.rounds
        );
    }
    output
}

pub fn comparison_table(rows: &[ComparisonRow], top_n: usize) -> String {
    let mut output = String::new();
    if rows.is_empty() {
        let _ = writeln!(output, "Nobody appears in either snapshot.");
        return output;
    }

    let _ = writeln!(
        output,
        "{:<4} {:<24} {:>14} {:>14} {:>12}",
        "", "Player", "Prev", "Last", "Change"
    );
    for row in compare::top_n(rows, top_n) {
        let _ = writeln!(
            output,
            "{:<4} {:<24} {:>14} {:>14} {:>12}",
            row.trend.glyph(),
            row.canonical_id,
            fmt_thousands(row.prev_damage),
            fmt_thousands(row.last_damage),
            fmt_pct(row.pct_change)
        );
    }
    output
}

pub fn active_table(active: &ActiveSummary) -> String {
    let mut output = String::new();
    if active.players.is_empty() {
        let _ = writeln!(
            output,
            "No players completed {} rounds in this raid.",
            active.marker
        );
        return output;
    }

    let _ = writeln!(
        output,
        "{} players completed {} ({:.1}% of participants), {} damage total, {} average",
        active.players.len(),
        active.marker,
        active.completion_pct,
        fmt_thousands(active.total_damage),
        fmt_thousands(active.average_damage)
    );
    for player in &active.players {
        let _ = writeln!(
            output,
            "{:>3}. {:<24} {:>14}",
            player.rank,
            player.display_name,
            fmt_thousands(player.damage)
        );
    }
    output
}

pub fn build_report(dashboard: &Dashboard, top_n: usize, generated_at: DateTime<Utc>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Guild Raid Report");
    let _ = writeln!(
        output,
        "Comparing `{}` → `{}` (generated {})",
        dashboard.prev_snapshot,
        dashboard.last_snapshot,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);

    let overview = &dashboard.overview;
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Total damage: {}", fmt_thousands(overview.total_damage));
    let _ = writeln!(output, "- Players: {}", overview.participants);
    let _ = writeln!(output, "- Average damage: {}", fmt_thousands(overview.average_damage));
    let _ = writeln!(
        output,
        "- Top player: {}",
        overview.top_participant.as_deref().unwrap_or("N/A")
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Participation ({})", dashboard.last_snapshot);
    if dashboard.participation.is_empty() {
        let _ = writeln!(output, "No participants in this snapshot.");
    } else {
        let _ = writeln!(output, "| Player | Damage | Share | Rounds |");
        let _ = writeln!(output, "|---|---:|---:|---|");
        for row in compare::top_n(&dashboard.participation, top_n) {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} |",
                row.canonical_id,
                fmt_thousands(row.total_damage),
                fmt_share(row.share_pct),
                row.rounds
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trends");
    let _ = writeln!(output, "{}", trend_line(&dashboard.trends));
    let _ = writeln!(output);
    if dashboard.comparison.is_empty() {
        let _ = writeln!(output, "Nobody appears in either snapshot.");
    } else {
        let _ = writeln!(output, "| Trend | Player | Prev | Last | Change |");
        let _ = writeln!(output, "|---|---|---:|---:|---:|");
        for row in compare::top_n(&dashboard.comparison, top_n) {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} |",
                row.trend.glyph(),
                row.canonical_id,
                fmt_thousands(row.prev_damage),
                fmt_thousands(row.last_damage),
                fmt_pct(row.pct_change)
            );
        }
    }

    write_movers(&mut output, "Biggest Gains", &dashboard.risers, "No increases detected.");
    write_movers(
        &mut output,
        "Biggest Drops",
        &dashboard.decliners,
        "No decreases detected.",
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Completed All Rounds ({})", dashboard.active.marker);
    if dashboard.active.players.is_empty() {
        let _ = writeln!(
            output,
            "No players completed {} rounds in this raid.",
            dashboard.active.marker
        );
    } else {
        let _ = writeln!(
            output,
            "{:.1}% of players completed every attack.",
            dashboard.active.completion_pct
        );
        let _ = writeln!(output);
        for player in &dashboard.active.players {
            let _ = writeln!(
                output,
                "{}. {} ({})",
                player.rank,
                player.display_name,
                fmt_thousands(player.damage)
            );
        }
    }

    output
}

fn write_movers(output: &mut String, title: &str, rows: &[ComparisonRow], empty: &str) {
    let _ = writeln!(output);
    let _ = writeln!(output, "### {title}");
    if rows.is_empty() {
        let _ = writeln!(output, "{empty}");
        return;
    }
    for row in rows {
        let change = row
            .pct_change
            .finite()
            .map_or_else(|| fmt_pct(row.pct_change), |value| format!("{value:+.1}%"));
        let _ = writeln!(output, "- {}: {}", row.canonical_id, change);
    }
}

#[derive(Serialize)]
struct ComparisonCsvRow<'a> {
    player: &'a str,
    prev_damage: i64,
    last_damage: i64,
    pct_change: String,
    trend: &'static str,
}

pub fn write_comparison_csv<W: std::io::Write>(
    writer: W,
    rows: &[ComparisonRow],
) -> anyhow::Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for row in rows {
        csv.serialize(ComparisonCsvRow {
            player: &row.canonical_id,
            prev_damage: row.prev_damage,
            last_damage: row.last_damage,
            pct_change: fmt_pct(row.pct_change),
            trend: row.trend.as_str(),
        })?;
    }
    csv.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct ComparisonJson<'a> {
    prev_snapshot: &'a str,
    last_snapshot: &'a str,
    trends: &'a TrendSummary,
    rows: &'a [ComparisonRow],
}

pub fn comparison_json(dashboard: &Dashboard, top_n: usize) -> anyhow::Result<String> {
    let payload = ComparisonJson {
        prev_snapshot: &dashboard.prev_snapshot,
        last_snapshot: &dashboard.last_snapshot,
        trends: &dashboard.trends,
        rows: compare::top_n(&dashboard.comparison, top_n),
    };
    Ok(serde_json::to_string_pretty(&payload)?)
}
