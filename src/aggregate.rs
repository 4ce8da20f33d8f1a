use std::collections::{BTreeMap, HashMap};

use crate::models::{
    ActivePlayer, ActiveSummary, AggregateRow, NormalizedRecord, Overview, ParticipationRow,
};

pub const DEFAULT_COMPLETION_MARKER: &str = "21/21";
pub const MISSING_ROUNDS: &str = "N/A";

/// Sums damage per canonical id. Output is keyed order; callers that care
/// about ranking sort it themselves.
pub fn aggregate(records: &[NormalizedRecord]) -> Vec<AggregateRow> {
    let mut totals: BTreeMap<&str, i64> = BTreeMap::new();

    for record in records {
        let entry = totals.entry(record.canonical_id.as_str()).or_insert(0);
        *entry = entry.saturating_add(record.damage);
    }

    totals
        .into_iter()
        .map(|(canonical_id, total_damage)| AggregateRow {
            canonical_id: canonical_id.to_string(),
            total_damage,
        })
        .collect()
}

pub fn rank_by_damage(rows: &mut [AggregateRow]) {
    rows.sort_by(|a, b| {
        b.total_damage
            .cmp(&a.total_damage)
            .then_with(|| a.canonical_id.cmp(&b.canonical_id))
    });
}

pub fn total_damage(rows: &[AggregateRow]) -> i64 {
    rows.iter()
        .fold(0i64, |acc, row| acc.saturating_add(row.total_damage))
}

pub fn overview(rows: &[AggregateRow]) -> Overview {
    let total = total_damage(rows);
    let participants = rows.len();
    let top_participant = rows
        .iter()
        .max_by(|a, b| {
            a.total_damage
                .cmp(&b.total_damage)
                .then_with(|| b.canonical_id.cmp(&a.canonical_id))
        })
        .map(|row| row.canonical_id.clone());

    Overview {
        total_damage: total,
        participants,
        average_damage: floor_average(total, participants),
        top_participant,
    }
}

/// Current-snapshot participation: damage share and reported rounds per
/// participant, largest contributors first.
pub fn participation(records: &[NormalizedRecord]) -> Vec<ParticipationRow> {
    let mut rows = aggregate(records);
    rank_by_damage(&mut rows);
    let total = total_damage(&rows);

    let mut rounds: HashMap<&str, &str> = HashMap::new();
    for record in records {
        if let Some(value) = record.rounds.as_deref() {
            rounds.entry(record.canonical_id.as_str()).or_insert(value);
        }
    }

    rows.into_iter()
        .map(|row| {
            let share_pct = if total > 0 {
                row.total_damage as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            let rounds = rounds
                .get(row.canonical_id.as_str())
                .copied()
                .unwrap_or(MISSING_ROUNDS)
                .to_string();
            ParticipationRow {
                canonical_id: row.canonical_id,
                total_damage: row.total_damage,
                share_pct,
                rounds,
            }
        })
        .collect()
}

/// Ranks the rows whose `rounds` matches `marker` exactly. Completion share is
/// measured against `participants`, the distinct participant count of the
/// same snapshot.
pub fn completed_rounds(
    records: &[NormalizedRecord],
    marker: &str,
    participants: usize,
) -> ActiveSummary {
    let mut finished: Vec<&NormalizedRecord> = records
        .iter()
        .filter(|record| record.rounds.as_deref() == Some(marker))
        .collect();
    finished.sort_by(|a, b| {
        b.damage
            .cmp(&a.damage)
            .then_with(|| a.display_name.cmp(&b.display_name))
    });

    let players: Vec<ActivePlayer> = finished
        .into_iter()
        .enumerate()
        .map(|(index, record)| ActivePlayer {
            rank: index + 1,
            display_name: record.display_name.clone(),
            damage: record.damage,
        })
        .collect();

    let total = players
        .iter()
        .fold(0i64, |acc, player| acc.saturating_add(player.damage));
    let completion_pct = if participants == 0 {
        0.0
    } else {
        players.len() as f64 / participants as f64 * 100.0
    };

    ActiveSummary {
        marker: marker.to_string(),
        average_damage: floor_average(total, players.len()),
        total_damage: total,
        completion_pct,
        players,
    }
}

fn floor_average(total: i64, count: usize) -> i64 {
    if count == 0 {
        return 0;
    }
    total.div_euclid(count as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, damage: i64, rounds: Option<&str>) -> NormalizedRecord {
        NormalizedRecord {
            canonical_id: name.to_uppercase(),
            display_name: name.to_string(),
            damage,
            rounds: rounds.map(str::to_string),
        }
    }

    fn totals(rows: &[AggregateRow]) -> Vec<(String, i64)> {
        rows.iter()
            .map(|row| (row.canonical_id.clone(), row.total_damage))
            .collect()
    }

    #[test]
    fn sums_case_variants_together() {
        let rows = aggregate(&[record("foo", 3, None), record("FOO", 4, None)]);
        assert_eq!(
            rows,
            vec![AggregateRow {
                canonical_id: "FOO".to_string(),
                total_damage: 7
            }]
        );
    }

    #[test]
    fn result_ignores_input_order() {
        let forward = vec![
            record("a", 1, None),
            record("b", 2, None),
            record("A", 3, None),
        ];
        let mut backward = forward.clone();
        backward.reverse();
        assert_eq!(totals(&aggregate(&forward)), totals(&aggregate(&backward)));
    }

    #[test]
    fn reaggregating_is_a_no_op() {
        let first = aggregate(&[
            record("a", 10, None),
            record("A", 5, None),
            record("b", 20, None),
        ]);
        let as_records: Vec<NormalizedRecord> = first
            .iter()
            .map(|row| record(&row.canonical_id, row.total_damage, None))
            .collect();
        assert_eq!(aggregate(&as_records), first);
    }

    #[test]
    fn negative_damage_flows_through() {
        let rows = aggregate(&[record("a", 10, None), record("a", -4, None)]);
        assert_eq!(rows[0].total_damage, 6);
    }

    #[test]
    fn participation_shares_and_rounds() {
        let rows = participation(&[
            record("alpha", 30, None),
            record("Alpha", 10, Some("21/21")),
            record("beta", 60, Some("18/21")),
        ]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].canonical_id, "BETA");
        assert!((rows[0].share_pct - 60.0).abs() < 1e-9);
        assert_eq!(rows[0].rounds, "18/21");
        assert_eq!(rows[1].canonical_id, "ALPHA");
        assert!((rows[1].share_pct - 40.0).abs() < 1e-9);
        assert_eq!(rows[1].rounds, "21/21");
    }

    #[test]
    fn participation_with_zero_total_has_zero_shares() {
        let rows = participation(&[record("a", 0, None), record("b", 0, None)]);
        assert!(rows.iter().all(|row| row.share_pct == 0.0));
        assert!(rows.iter().all(|row| row.rounds == MISSING_ROUNDS));
    }

    #[test]
    fn overview_reports_floor_average_and_leader() {
        let rows = aggregate(&[
            record("a", 10, None),
            record("b", 25, None),
            record("c", 0, None),
        ]);
        let summary = overview(&rows);
        assert_eq!(summary.total_damage, 35);
        assert_eq!(summary.participants, 3);
        assert_eq!(summary.average_damage, 11);
        assert_eq!(summary.top_participant.as_deref(), Some("B"));
    }

    #[test]
    fn overview_of_nothing() {
        let summary = overview(&[]);
        assert_eq!(summary.total_damage, 0);
        assert_eq!(summary.average_damage, 0);
        assert_eq!(summary.top_participant, None);
    }

    #[test]
    fn completed_rounds_ranks_exact_marker_matches() {
        let records = vec![
            record("a", 100, Some("21/21")),
            record("b", 300, Some("21/21")),
            record("c", 500, Some("20/21")),
            record("d", 200, Some("21/21 ")),
            record("e", 50, None),
        ];
        let summary = completed_rounds(&records, DEFAULT_COMPLETION_MARKER, 5);
        let names: Vec<&str> = summary
            .players
            .iter()
            .map(|player| player.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(summary.players[0].rank, 1);
        assert_eq!(summary.total_damage, 400);
        assert_eq!(summary.average_damage, 200);
        assert!((summary.completion_pct - 40.0).abs() < 1e-9);
    }

    #[test]
    fn completed_rounds_empty_state() {
        let summary = completed_rounds(&[record("a", 1, None)], "21/21", 1);
        assert!(summary.players.is_empty());
        assert_eq!(summary.average_damage, 0);
        assert_eq!(summary.completion_pct, 0.0);
    }
}
