use crate::models::{NormalizedRecord, RawRecord};

pub fn normalize(rows: &[RawRecord]) -> Vec<NormalizedRecord> {
    rows.iter().map(normalize_record).collect()
}

pub fn normalize_record(row: &RawRecord) -> NormalizedRecord {
    let display_name = row.username.clone().unwrap_or_default();
    NormalizedRecord {
        canonical_id: canonical_id(&display_name),
        display_name,
        damage: coerce_damage(row.damage.as_deref()),
        rounds: row.rounds.clone(),
    }
}

pub fn canonical_id(username: &str) -> String {
    username.to_uppercase()
}

/// Parses a damage cell, falling back to 0 for anything that is not a finite
/// number. Fractional values truncate toward zero.
pub fn coerce_damage(value: Option<&str>) -> i64 {
    let Some(text) = value.map(str::trim).filter(|text| !text.is_empty()) else {
        return 0;
    };

    if let Ok(parsed) = text.parse::<i64>() {
        return parsed;
    }

    match text.parse::<f64>() {
        // `as` saturates at the i64 bounds
        Ok(parsed) if parsed.is_finite() => parsed.trunc() as i64,
        _ => 0,
    }
}
