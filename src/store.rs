//! Append-only CSV store for snapshot observations.
//!
//! Rows are appended once per snapshot and never rewritten. Reading goes
//! through a strict parse step that either yields a typed [`Observation`]
//! or a structured [`RowError`]; malformed rows are dropped with a warning,
//! never fatal.

use anyhow::Result;
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::{Observation, RankStatus};

/// Flat CSV row. Column order is the store schema and is fixed across appends.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    app_id: u32,
    name: String,
    genre: String,
    price: f64,
    release_date: String,
    rank_position: u32,
    previous_rank: Option<u32>,
    peak_in_game: u64,
    snapshot_time: String,
    rank_status: String,
    rank_delta: i64,
}

/// A row that deserialized but failed validation at the store boundary.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("unparsable snapshot_time {value:?}")]
    BadTimestamp { value: String },
    #[error("unknown rank_status {value:?}")]
    BadStatus { value: String },
    #[error("rank_position must be positive")]
    ZeroRank,
}

impl From<&Observation> for CsvRow {
    fn from(obs: &Observation) -> Self {
        CsvRow {
            app_id: obs.app_id,
            name: obs.name.clone(),
            genre: obs.genre_string(),
            price: obs.price,
            release_date: obs.release_date.clone(),
            rank_position: obs.rank,
            previous_rank: obs.previous_rank,
            peak_in_game: obs.peak_in_game,
            snapshot_time: obs.snapshot_time.to_rfc3339(),
            rank_status: obs.status.to_string(),
            rank_delta: obs.delta,
        }
    }
}

impl TryFrom<CsvRow> for Observation {
    type Error = RowError;

    fn try_from(row: CsvRow) -> Result<Self, Self::Error> {
        let snapshot_time = DateTime::parse_from_rfc3339(&row.snapshot_time)
            .map_err(|_| RowError::BadTimestamp {
                value: row.snapshot_time.clone(),
            })?
            .with_timezone(&Utc);

        let status: RankStatus = row
            .rank_status
            .parse()
            .map_err(|_| RowError::BadStatus {
                value: row.rank_status.clone(),
            })?;

        if row.rank_position == 0 {
            return Err(RowError::ZeroRank);
        }

        Ok(Observation {
            app_id: row.app_id,
            name: row.name,
            genres: row
                .genre
                .split(',')
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty())
                .collect(),
            price: row.price,
            release_date: row.release_date,
            rank: row.rank_position,
            previous_rank: row.previous_rank,
            peak_in_game: row.peak_in_game,
            snapshot_time,
            status,
            delta: row.rank_delta,
        })
    }
}

/// Appends one batch of observations as CSV rows.
///
/// Creates the file with headers if it does not already exist. An empty
/// batch is a normal no-op: nothing to persist, nothing written.
pub fn append_snapshot(path: &str, observations: &[Observation]) -> Result<()> {
    if observations.is_empty() {
        info!(path, "Nothing to persist");
        return Ok(());
    }

    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = observations.len(), "Appending snapshot");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for obs in observations {
        writer.serialize(CsvRow::from(obs))?;
    }
    writer.flush()?;

    Ok(())
}

/// Reads every valid observation from one store file.
///
/// A missing file yields an empty set. Rows that fail to deserialize or
/// validate are dropped and logged, the rest of the file is kept.
pub fn load_rows(path: &str) -> Result<Vec<Observation>> {
    if !Path::new(path).exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    let mut rdr = csv::Reader::from_reader(file);
    let mut rows = Vec::new();

    for result in rdr.deserialize::<CsvRow>() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!(path, error = %e, "Dropping malformed store row");
                continue;
            }
        };
        match Observation::try_from(row) {
            Ok(obs) => rows.push(obs),
            Err(e) => {
                warn!(path, error = %e, "Dropping invalid store row");
            }
        }
    }

    Ok(rows)
}

/// Merges a primary store with an optional backup store.
///
/// Union of records keyed by `(app_id, snapshot_time)`, one record per key.
/// The backup is read first and the primary second, so on key collisions the
/// primary's record is the last seen and wins.
pub fn merge_stores(primary: &str, backup: Option<&str>) -> Result<Vec<Observation>> {
    let mut merged: Vec<Observation> = Vec::new();
    let mut index: HashMap<(u32, DateTime<Utc>), usize> = HashMap::new();

    let mut sources = Vec::new();
    if let Some(b) = backup {
        sources.push(b);
    }
    sources.push(primary);

    for source in sources {
        for obs in load_rows(source)? {
            let key = (obs.app_id, obs.snapshot_time);
            match index.get(&key) {
                Some(&pos) => merged[pos] = obs,
                None => {
                    index.insert(key, merged.len());
                    merged.push(obs);
                }
            }
        }
    }

    Ok(merged)
}

/// Returns the observations of the most recent stored snapshot.
pub fn latest_snapshot(rows: &[Observation]) -> Vec<Observation> {
    let Some(latest) = rows.iter().map(|o| o.snapshot_time).max() else {
        return Vec::new();
    };
    rows.iter()
        .filter(|o| o.snapshot_time == latest)
        .cloned()
        .collect()
}

/// Derives the id → rank map of the latest snapshot strictly before `before`.
///
/// Empty when no prior snapshot exists; every current item then classifies
/// as NEW.
pub fn previous_ranks(rows: &[Observation], before: DateTime<Utc>) -> HashMap<u32, u32> {
    let Some(prior) = rows
        .iter()
        .map(|o| o.snapshot_time)
        .filter(|t| *t < before)
        .max()
    else {
        return HashMap::new();
    };

    rows.iter()
        .filter(|o| o.snapshot_time == prior)
        .map(|o| (o.app_id, o.rank))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn obs(app_id: u32, rank: u32, time: DateTime<Utc>) -> Observation {
        Observation {
            app_id,
            name: format!("game-{app_id}"),
            genres: vec!["action".to_string(), "rpg".to_string()],
            price: 9.99,
            release_date: "12 Mar, 2024".to_string(),
            rank,
            previous_rank: Some(rank + 1),
            peak_in_game: 1000,
            snapshot_time: time,
            status: RankStatus::Up,
            delta: 1,
        }
    }

    #[test]
    fn test_append_creates_file() {
        let path = temp_path("playstats_store_create.csv");
        let _ = fs::remove_file(&path);

        append_snapshot(&path, &[obs(1, 1, ts(12))]).unwrap();

        assert!(Path::new(&path).exists());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_empty_batch_is_noop() {
        let path = temp_path("playstats_store_empty.csv");
        let _ = fs::remove_file(&path);

        append_snapshot(&path, &[]).unwrap();

        assert!(!Path::new(&path).exists());
    }

    #[test]
    fn test_append_writes_header_once() {
        let path = temp_path("playstats_store_header.csv");
        let _ = fs::remove_file(&path);

        append_snapshot(&path, &[obs(1, 1, ts(12))]).unwrap();
        append_snapshot(&path, &[obs(1, 1, ts(13))]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content.lines().filter(|l| l.contains("app_id")).count();
        assert_eq!(header_count, 1);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_round_trip() {
        let path = temp_path("playstats_store_roundtrip.csv");
        let _ = fs::remove_file(&path);

        let batch = vec![obs(1, 1, ts(12)), obs(2, 2, ts(12))];
        append_snapshot(&path, &batch).unwrap();

        let loaded = load_rows(&path).unwrap();
        assert_eq!(loaded, batch);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_round_trip_preserves_none_previous_rank() {
        let path = temp_path("playstats_store_nullable.csv");
        let _ = fs::remove_file(&path);

        let mut o = obs(1, 1, ts(12));
        o.previous_rank = None;
        o.status = RankStatus::New;
        o.delta = 0;
        append_snapshot(&path, &[o.clone()]).unwrap();

        let loaded = load_rows(&path).unwrap();
        assert_eq!(loaded, vec![o]);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let rows = load_rows(&temp_path("playstats_store_does_not_exist.csv")).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_malformed_rows_are_dropped() {
        let path = temp_path("playstats_store_malformed.csv");
        let _ = fs::remove_file(&path);

        append_snapshot(&path, &[obs(1, 1, ts(12))]).unwrap();
        // non-numeric peak and an unparsable timestamp
        let mut content = fs::read_to_string(&path).unwrap();
        content.push_str("2,bad,action,1.0,Unknown,2,1,not-a-number,2024-05-01T12:00:00+00:00,UP,1\n");
        content.push_str("3,bad,action,1.0,Unknown,3,1,50,yesterday,UP,1\n");
        content.push_str("4,bad,action,1.0,Unknown,4,1,50,2024-05-01T12:00:00+00:00,SIDEWAYS,1\n");
        fs::write(&path, content).unwrap();

        let rows = load_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].app_id, 1);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_merge_primary_wins_over_backup() {
        let primary = temp_path("playstats_store_merge_primary.csv");
        let backup = temp_path("playstats_store_merge_backup.csv");
        let _ = fs::remove_file(&primary);
        let _ = fs::remove_file(&backup);

        let mut in_backup = obs(1, 5, ts(12));
        in_backup.name = "backup copy".to_string();
        let in_primary = obs(1, 1, ts(12));
        let only_backup = obs(2, 2, ts(12));

        append_snapshot(&backup, &[in_backup, only_backup.clone()]).unwrap();
        append_snapshot(&primary, &[in_primary.clone()]).unwrap();

        let merged = merge_stores(&primary, Some(&backup)).unwrap();

        assert_eq!(merged.len(), 2);
        let one = merged.iter().find(|o| o.app_id == 1).unwrap();
        assert_eq!(one, &in_primary);
        assert!(merged.contains(&only_backup));

        fs::remove_file(&primary).unwrap();
        fs::remove_file(&backup).unwrap();
    }

    #[test]
    fn test_latest_snapshot_picks_max_timestamp() {
        let rows = vec![obs(1, 1, ts(10)), obs(2, 2, ts(10)), obs(1, 3, ts(11))];

        let latest = latest_snapshot(&rows);

        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].snapshot_time, ts(11));
        assert_eq!(latest[0].rank, 3);
    }

    #[test]
    fn test_previous_ranks_strictly_before() {
        let rows = vec![
            obs(1, 4, ts(10)),
            obs(1, 2, ts(11)),
            obs(2, 9, ts(11)),
            obs(1, 1, ts(12)),
        ];

        let previous = previous_ranks(&rows, ts(12));

        assert_eq!(previous, HashMap::from([(1, 2), (2, 9)]));
    }

    #[test]
    fn test_previous_ranks_empty_without_prior_snapshot() {
        let rows = vec![obs(1, 1, ts(12))];
        assert!(previous_ranks(&rows, ts(12)).is_empty());
        assert!(previous_ranks(&[], ts(12)).is_empty());
    }
}
