use serde::{Serialize, Serializer};

/// One row as stored in a snapshot table, before any cleanup.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub username: Option<String>,
    pub damage: Option<String>,
    pub rounds: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub canonical_id: String,
    pub display_name: String,
    pub damage: i64,
    pub rounds: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateRow {
    pub canonical_id: String,
    pub total_damage: i64,
}

/// Relative change between two snapshots.
///
/// `New` marks a participant whose previous total was zero and whose current
/// total is positive. It is kept apart from the finite values so nothing
/// does arithmetic on it by accident.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PctChange {
    Finite(f64),
    New,
}

impl PctChange {
    pub fn finite(self) -> Option<f64> {
        match self {
            PctChange::Finite(value) => Some(value),
            PctChange::New => None,
        }
    }
}

impl Serialize for PctChange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PctChange::Finite(value) => serializer.serialize_f64(*value),
            PctChange::New => serializer.serialize_str("inf"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Same,
    New,
}

impl Trend {
    pub fn as_str(self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Same => "same",
            Trend::New => "new",
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            Trend::Up => "🔼",
            Trend::Down => "🔽",
            Trend::New => "🆕",
            Trend::Same => "⏺",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub canonical_id: String,
    pub prev_damage: i64,
    pub last_damage: i64,
    pub pct_change: PctChange,
    pub trend: Trend,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrendSummary {
    pub up: usize,
    pub down: usize,
    pub new: usize,
    pub same: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipationRow {
    pub canonical_id: String,
    pub total_damage: i64,
    pub share_pct: f64,
    pub rounds: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub total_damage: i64,
    pub participants: usize,
    pub average_damage: i64,
    pub top_participant: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivePlayer {
    pub rank: usize,
    pub display_name: String,
    pub damage: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveSummary {
    pub marker: String,
    pub players: Vec<ActivePlayer>,
    pub total_damage: i64,
    pub average_damage: i64,
    pub completion_pct: f64,
}
