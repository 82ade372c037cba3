//! Data types shared across the snapshot pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the raw "most played" ranking list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankEntry {
    pub app_id: u32,
    /// 1 = most popular.
    pub rank: u32,
    pub peak_in_game: u64,
}

/// Per-app store-detail payload, mirroring the upstream JSON shape.
///
/// `success = false` means the store has no data for the app; the entry is
/// skipped without being treated as an error.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailRecord {
    pub success: bool,
    pub name: String,
    /// The store's `type` field: "game", "dlc", "demo", ...
    pub kind: String,
    /// Raw genre description strings, exactly as the store sends them.
    pub genres: Vec<String>,
    /// Final price in currency minor units, absent when free or unlisted.
    pub price_minor: Option<i64>,
    pub release_date: Option<String>,
}

/// How an item's rank moved relative to the previous snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankStatus {
    New,
    Up,
    Down,
    Same,
}

impl RankStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankStatus::New => "NEW",
            RankStatus::Up => "UP",
            RankStatus::Down => "DOWN",
            RankStatus::Same => "SAME",
        }
    }
}

impl fmt::Display for RankStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(RankStatus::New),
            "UP" => Ok(RankStatus::Up),
            "DOWN" => Ok(RankStatus::Down),
            "SAME" => Ok(RankStatus::Same),
            other => Err(format!("unknown rank status: {other}")),
        }
    }
}

/// One item's recorded state within a snapshot.
///
/// Created once per ingestion run, enriched once by the delta pass, then
/// appended to the store and never mutated again.
///
/// A freshly ingested observation carries `previous_rank = None`,
/// `status = New` and `delta = 0` until [`crate::delta::compute_deltas`]
/// has run. The zero delta on NEW items is an arithmetic placeholder;
/// `status` is authoritative and must be checked first.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub app_id: u32,
    pub name: String,
    /// Normalized genre tokens: trimmed, lowercased, first-appearance order.
    pub genres: Vec<String>,
    /// Price in major units, two decimal places. 0.0 when free or unlisted.
    pub price: f64,
    pub release_date: String,
    pub rank: u32,
    pub previous_rank: Option<u32>,
    pub peak_in_game: u64,
    pub snapshot_time: DateTime<Utc>,
    pub status: RankStatus,
    /// previous rank − current rank; positive = climbed.
    pub delta: i64,
}

impl Observation {
    /// Genre column value as stored in the CSV: comma-joined tokens.
    pub fn genre_string(&self) -> String {
        self.genres.join(", ")
    }
}
