//! Snapshot ingestion: turns raw ranking entries plus store details into
//! normalized [`Observation`]s tagged with one snapshot timestamp.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::config::IngestConfig;
use crate::model::{DetailRecord, Observation, RankEntry, RankStatus};

/// Why a ranking entry produced no observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The detail lookup failed upstream (network or parse error).
    LookupFailed,
    /// The store answered but has no data for the app (`success = false`).
    NoStoreData,
    /// The app is not of kind "game" (dlc, demo, ...).
    NotAGame { kind: String },
    /// The display name is on the exclusion list.
    Excluded,
    /// A later entry for the same app id superseded this one.
    Duplicate,
}

/// One skipped ranking entry, kept so callers can audit drop reasons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub app_id: u32,
    pub reason: SkipReason,
}

/// The full outcome of one ingestion pass.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    /// Surviving observations, in rank-list order, one per app id.
    pub observations: Vec<Observation>,
    pub skipped: Vec<Skipped>,
}

/// Normalizes raw ranking entries into observations for one snapshot.
///
/// `detail_lookup` is the seam to the store-detail source: `None` means the
/// caller's fetch or parse failed for that id, an expected and frequent
/// outcome. Entries without usable details, non-game apps, and excluded
/// names are dropped and recorded in the report. Duplicate app ids keep the
/// last-seen record at the first occurrence's position.
///
/// Pure: no I/O, output order follows the input rank list.
pub fn ingest(
    entries: &[RankEntry],
    detail_lookup: impl Fn(u32) -> Option<DetailRecord>,
    snapshot_time: DateTime<Utc>,
    config: &IngestConfig,
) -> IngestReport {
    let mut observations: Vec<Observation> = Vec::with_capacity(entries.len());
    let mut skipped = Vec::new();
    // app_id -> position in `observations`, for last-seen-wins dedup
    let mut seen: HashMap<u32, usize> = HashMap::new();

    for entry in entries {
        let Some(detail) = detail_lookup(entry.app_id) else {
            skipped.push(Skipped {
                app_id: entry.app_id,
                reason: SkipReason::LookupFailed,
            });
            continue;
        };

        if !detail.success {
            skipped.push(Skipped {
                app_id: entry.app_id,
                reason: SkipReason::NoStoreData,
            });
            continue;
        }

        if detail.kind != "game" {
            skipped.push(Skipped {
                app_id: entry.app_id,
                reason: SkipReason::NotAGame {
                    kind: detail.kind.clone(),
                },
            });
            continue;
        }

        if config.is_excluded(&detail.name) {
            skipped.push(Skipped {
                app_id: entry.app_id,
                reason: SkipReason::Excluded,
            });
            continue;
        }

        let observation = Observation {
            app_id: entry.app_id,
            name: detail.name.clone(),
            genres: normalize_genres(&detail.genres),
            price: price_from_minor(detail.price_minor),
            release_date: detail
                .release_date
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            rank: entry.rank,
            previous_rank: None,
            peak_in_game: entry.peak_in_game,
            snapshot_time,
            status: RankStatus::New,
            delta: 0,
        };

        match seen.get(&entry.app_id) {
            Some(&pos) => {
                observations[pos] = observation;
                skipped.push(Skipped {
                    app_id: entry.app_id,
                    reason: SkipReason::Duplicate,
                });
            }
            None => {
                seen.insert(entry.app_id, observations.len());
                observations.push(observation);
            }
        }
    }

    IngestReport {
        observations,
        skipped,
    }
}

/// Splits raw genre descriptions into trimmed, lowercased tokens.
/// Empty tokens are discarded; duplicates keep their first appearance.
fn normalize_genres(raw: &[String]) -> Vec<String> {
    let mut tokens = Vec::new();
    for description in raw {
        for part in description.split(',') {
            let token = part.trim().to_lowercase();
            if !token.is_empty() && !tokens.contains(&token) {
                tokens.push(token);
            }
        }
    }
    tokens
}

/// Minor-unit price to major units. Integer minor units divided by 100 land
/// exactly on two decimal places; 0.0 when no pricing block is present.
fn price_from_minor(minor: Option<i64>) -> f64 {
    match minor {
        Some(m) => m as f64 / 100.0,
        None => 0.0,
    }
}
