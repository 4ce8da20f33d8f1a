use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::{AggregateRow, ComparisonRow, PctChange, Trend, TrendSummary};

pub const DEFAULT_TOP_N: usize = 10;
pub const MOVERS_LIMIT: usize = 10;

/// Outer-joins two aggregates on canonical id and orders the result by
/// percentage change, largest first.
pub fn compare(prev: &[AggregateRow], last: &[AggregateRow]) -> Vec<ComparisonRow> {
    let mut joined: BTreeMap<&str, (i64, i64)> = BTreeMap::new();

    for row in prev {
        let entry = joined.entry(row.canonical_id.as_str()).or_insert((0, 0));
        entry.0 = entry.0.saturating_add(row.total_damage);
    }
    for row in last {
        let entry = joined.entry(row.canonical_id.as_str()).or_insert((0, 0));
        entry.1 = entry.1.saturating_add(row.total_damage);
    }

    let mut rows: Vec<ComparisonRow> = joined
        .into_iter()
        .map(|(canonical_id, (prev_damage, last_damage))| {
            let pct_change = pct_change(prev_damage, last_damage);
            ComparisonRow {
                canonical_id: canonical_id.to_string(),
                prev_damage,
                last_damage,
                pct_change,
                trend: classify(pct_change),
            }
        })
        .collect();

    // stable: equal keys stay in canonical id order
    rows.sort_by(|a, b| descending(a.pct_change, b.pct_change));
    rows
}

pub fn pct_change(prev: i64, last: i64) -> PctChange {
    if prev > 0 {
        return PctChange::Finite((last as f64 - prev as f64) / prev as f64 * 100.0);
    }
    if prev == 0 && last > 0 {
        return PctChange::New;
    }
    PctChange::Finite(0.0)
}

pub fn classify(pct_change: PctChange) -> Trend {
    match pct_change {
        PctChange::New => Trend::New,
        PctChange::Finite(value) if value > 0.0 => Trend::Up,
        PctChange::Finite(value) if value < 0.0 => Trend::Down,
        PctChange::Finite(_) => Trend::Same,
    }
}

/// `New` outranks every finite change; new rows tie among themselves.
fn descending(a: PctChange, b: PctChange) -> Ordering {
    match (a, b) {
        (PctChange::New, PctChange::New) => Ordering::Equal,
        (PctChange::New, PctChange::Finite(_)) => Ordering::Less,
        (PctChange::Finite(_), PctChange::New) => Ordering::Greater,
        (PctChange::Finite(a), PctChange::Finite(b)) => {
            b.partial_cmp(&a).unwrap_or(Ordering::Equal)
        }
    }
}

/// First `n` rows in their current order; `0` keeps everything.
pub fn top_n<T>(rows: &[T], n: usize) -> &[T] {
    if n == 0 {
        rows
    } else {
        &rows[..n.min(rows.len())]
    }
}

pub fn summarize(rows: &[ComparisonRow]) -> TrendSummary {
    let mut summary = TrendSummary::default();
    for row in rows {
        match row.trend {
            Trend::Up => summary.up += 1,
            Trend::Down => summary.down += 1,
            Trend::New => summary.new += 1,
            Trend::Same => summary.same += 1,
        }
    }
    summary
}

/// Largest finite gains, biggest first.
pub fn top_risers(rows: &[ComparisonRow], limit: usize) -> Vec<ComparisonRow> {
    let mut risers: Vec<ComparisonRow> = rows
        .iter()
        .filter(|row| row.trend == Trend::Up)
        .cloned()
        .collect();
    risers.sort_by(|a, b| descending(a.pct_change, b.pct_change));
    risers.truncate(limit);
    risers
}

/// Steepest drops, most negative first.
pub fn top_decliners(rows: &[ComparisonRow], limit: usize) -> Vec<ComparisonRow> {
    let mut decliners: Vec<ComparisonRow> = rows
        .iter()
        .filter(|row| row.trend == Trend::Down)
        .cloned()
        .collect();
    decliners.sort_by(|a, b| descending(b.pct_change, a.pct_change));
    decliners.truncate(limit);
    decliners
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::models::RawRecord;
    use crate::normalize::normalize;

    fn agg(rows: &[(&str, i64)]) -> Vec<AggregateRow> {
        rows.iter()
            .map(|(id, damage)| AggregateRow {
                canonical_id: id.to_string(),
                total_damage: *damage,
            })
            .collect()
    }

    fn find<'a>(rows: &'a [ComparisonRow], id: &str) -> &'a ComparisonRow {
        rows.iter()
            .find(|row| row.canonical_id == id)
            .unwrap_or_else(|| panic!("missing row {id}"))
    }

    fn raw(name: &str, damage: &str) -> RawRecord {
        RawRecord {
            username: Some(name.to_string()),
            damage: Some(damage.to_string()),
            rounds: None,
        }
    }

    #[test]
    fn percentage_rule_literal_cases() {
        assert_eq!(pct_change(100, 150), PctChange::Finite(50.0));
        assert_eq!(pct_change(100, 50), PctChange::Finite(-50.0));
        assert_eq!(pct_change(0, 80), PctChange::New);
        assert_eq!(pct_change(0, 0), PctChange::Finite(0.0));
        assert_eq!(pct_change(100, 100), PctChange::Finite(0.0));
        assert_eq!(pct_change(100, 0), PctChange::Finite(-100.0));
    }

    #[test]
    fn non_positive_baseline_without_growth_is_flat() {
        assert_eq!(pct_change(-10, 5), PctChange::Finite(0.0));
        assert_eq!(pct_change(0, -5), PctChange::Finite(0.0));
    }

    #[test]
    fn classification_is_exclusive() {
        assert_eq!(classify(PctChange::Finite(50.0)), Trend::Up);
        assert_eq!(classify(PctChange::Finite(-50.0)), Trend::Down);
        assert_eq!(classify(PctChange::New), Trend::New);
        assert_eq!(classify(PctChange::Finite(0.0)), Trend::Same);
    }

    #[test]
    fn outer_join_keeps_every_participant_once() {
        let rows = compare(&agg(&[("A", 10), ("B", 5)]), &agg(&[("B", 7), ("C", 3)]));
        assert_eq!(rows.len(), 3);
        let a = find(&rows, "A");
        assert_eq!((a.prev_damage, a.last_damage), (10, 0));
        let b = find(&rows, "B");
        assert_eq!((b.prev_damage, b.last_damage), (5, 7));
        let c = find(&rows, "C");
        assert_eq!((c.prev_damage, c.last_damage), (0, 3));
    }

    #[test]
    fn empty_previous_makes_everyone_new() {
        let rows = compare(&[], &agg(&[("A", 1), ("B", 2)]));
        assert!(rows.iter().all(|row| row.trend == Trend::New));
    }

    #[test]
    fn empty_current_drops_everyone() {
        let rows = compare(&agg(&[("A", 1), ("B", 2)]), &[]);
        for row in &rows {
            assert_eq!(row.last_damage, 0);
            assert_eq!(row.pct_change, PctChange::Finite(-100.0));
            assert_eq!(row.trend, Trend::Down);
        }
    }

    #[test]
    fn both_empty_is_empty() {
        assert!(compare(&[], &[]).is_empty());
    }

    #[test]
    fn new_rows_sort_first_in_stable_order() {
        let rows = compare(
            &agg(&[("M", 10), ("N", 10)]),
            &agg(&[("Z", 5), ("M", 1000), ("B", 1), ("N", 5), ("K", 9)]),
        );
        let order: Vec<&str> = rows.iter().map(|row| row.canonical_id.as_str()).collect();
        assert_eq!(order, vec!["B", "K", "Z", "M", "N"]);
        assert!(rows[..3].iter().all(|row| row.pct_change == PctChange::New));
        assert_eq!(rows[3].pct_change, PctChange::Finite(9900.0));
    }

    #[test]
    fn new_rows_outrank_huge_finite_gains() {
        let rows = compare(
            &agg(&[("BIG", 1)]),
            &agg(&[("BIG", 100_000_000_000_000_000), ("NEWBIE", 5)]),
        );
        assert_eq!(rows[0].canonical_id, "NEWBIE");
        assert_eq!(rows[0].trend, Trend::New);
        assert_eq!(rows[1].canonical_id, "BIG");
        assert_eq!(rows[1].trend, Trend::Up);
        assert!(rows[1].pct_change.finite().unwrap() > 1e18);

        let risers = top_risers(&rows, MOVERS_LIMIT);
        assert_eq!(risers.len(), 1);
        assert_eq!(risers[0].canonical_id, "BIG");
    }

    #[test]
    fn top_n_boundaries() {
        let rows = vec![1, 2, 3, 4];
        assert_eq!(top_n(&rows, 0), &[1, 2, 3, 4]);
        assert_eq!(top_n(&rows, 4), &[1, 2, 3, 4]);
        assert_eq!(top_n(&rows, 10), &[1, 2, 3, 4]);
        assert_eq!(top_n(&rows, 2), &[1, 2]);
        let empty: Vec<i32> = Vec::new();
        assert!(top_n(&empty, 3).is_empty());
    }

    #[test]
    fn movers_and_summary() {
        let rows = compare(
            &agg(&[("A", 100), ("B", 100), ("C", 100), ("D", 100)]),
            &agg(&[("A", 150), ("B", 300), ("C", 10), ("D", 100), ("E", 1)]),
        );
        let summary = summarize(&rows);
        assert_eq!(
            summary,
            TrendSummary {
                up: 2,
                down: 1,
                new: 1,
                same: 1
            }
        );

        let risers = top_risers(&rows, MOVERS_LIMIT);
        let ids: Vec<&str> = risers.iter().map(|row| row.canonical_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A"]);

        let decliners = top_decliners(&rows, 1);
        assert_eq!(decliners.len(), 1);
        assert_eq!(decliners[0].canonical_id, "C");
    }

    #[test]
    fn raid_to_raid_scenario() {
        let raid_1 = aggregate(&normalize(&[raw("A", "10"), raw("a", "5"), raw("B", "20")]));
        let raid_2 = aggregate(&normalize(&[raw("A", "30"), raw("B", "0"), raw("C", "15")]));
        assert_eq!(raid_1, agg(&[("A", 15), ("B", 20)]));
        assert_eq!(raid_2, agg(&[("A", 30), ("B", 0), ("C", 15)]));

        let rows = compare(&raid_1, &raid_2);
        let order: Vec<&str> = rows.iter().map(|row| row.canonical_id.as_str()).collect();
        assert_eq!(order, vec!["C", "A", "B"]);

        let a = find(&rows, "A");
        assert_eq!((a.prev_damage, a.last_damage), (15, 30));
        assert_eq!(a.pct_change, PctChange::Finite(100.0));
        assert_eq!(a.trend, Trend::Up);

        let b = find(&rows, "B");
        assert_eq!((b.prev_damage, b.last_damage), (20, 0));
        assert_eq!(b.pct_change, PctChange::Finite(-100.0));
        assert_eq!(b.trend, Trend::Down);

        let c = find(&rows, "C");
        assert_eq!((c.prev_damage, c.last_damage), (0, 15));
        assert_eq!(c.pct_change, PctChange::New);
        assert_eq!(c.trend, Trend::New);
    }

    #[test]
    fn malformed_damage_contributes_nothing() {
        let rows = aggregate(&normalize(&[raw("x", "n/a"), raw("X", "4")]));
        assert_eq!(rows, agg(&[("X", 4)]));
    }
}
