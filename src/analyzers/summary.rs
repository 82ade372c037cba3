use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::analyzers::utility::mean;
use crate::model::{Observation, RankStatus};

/// How many entries the revenue and genre leaderboards carry.
const LEADERBOARD_SIZE: usize = 5;

/// A game that moved rank, with its signed delta.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mover {
    pub app_id: u32,
    pub name: String,
    pub delta: i64,
}

/// One entry of the price × peak revenue proxy leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueEntry {
    pub app_id: u32,
    pub name: String,
    pub revenue_proxy: f64,
}

/// Mean peak concurrent players for one genre.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenrePeak {
    pub genre: String,
    pub mean_peak: f64,
}

/// Headline figures derived from one snapshot, serialized as JSON for the
/// reporting layer.
#[derive(Debug, Serialize)]
pub struct SnapshotSummary {
    pub snapshot_time: DateTime<Utc>,
    pub entries: usize,
    /// Name of the rank-1 game.
    pub most_played: Option<String>,
    /// Most common genre; ties break to the lexicographically smaller name.
    pub top_genre: Option<String>,
    /// Mean price over the top `top_k` ranks.
    pub mean_price: f64,
    pub new_entries: usize,
    /// Largest positive delta among UP items.
    pub biggest_climb: Option<Mover>,
    /// Most negative delta among DOWN items.
    pub biggest_drop: Option<Mover>,
    pub top_revenue: Vec<RevenueEntry>,
    pub genre_peaks: Vec<GenrePeak>,
}

impl SnapshotSummary {
    /// Summarizes one snapshot's observations.
    ///
    /// All observations must share one snapshot timestamp; the caller
    /// selects the latest stored snapshot. NEW items never qualify as
    /// climb or drop candidates, their stored zero delta is a placeholder.
    pub fn from_snapshot(observations: &[Observation], top_k: usize) -> Self {
        let snapshot_time = observations
            .iter()
            .map(|o| o.snapshot_time)
            .max()
            .unwrap_or_default();

        let most_played = observations
            .iter()
            .min_by_key(|o| o.rank)
            .map(|o| o.name.clone());

        let top_k_prices: Vec<f64> = {
            let mut by_rank: Vec<&Observation> = observations.iter().collect();
            by_rank.sort_by_key(|o| o.rank);
            by_rank.iter().take(top_k).map(|o| o.price).collect()
        };

        let new_entries = observations
            .iter()
            .filter(|o| o.status == RankStatus::New)
            .count();

        let biggest_climb = observations
            .iter()
            .filter(|o| o.status == RankStatus::Up)
            .max_by_key(|o| o.delta)
            .map(to_mover);

        let biggest_drop = observations
            .iter()
            .filter(|o| o.status == RankStatus::Down)
            .min_by_key(|o| o.delta)
            .map(to_mover);

        SnapshotSummary {
            snapshot_time,
            entries: observations.len(),
            most_played,
            top_genre: top_genre(observations),
            mean_price: mean(&top_k_prices),
            new_entries,
            biggest_climb,
            biggest_drop,
            top_revenue: top_revenue(observations),
            genre_peaks: genre_peaks(observations),
        }
    }
}

fn to_mover(obs: &Observation) -> Mover {
    Mover {
        app_id: obs.app_id,
        name: obs.name.clone(),
        delta: obs.delta,
    }
}

fn top_genre(observations: &[Observation]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for obs in observations {
        for genre in &obs.genres {
            *counts.entry(genre.as_str()).or_default() += 1;
        }
    }

    counts
        .into_iter()
        .max_by(|(name_a, count_a), (name_b, count_b)| {
            // highest count first, lexicographically smaller name on ties
            count_a.cmp(count_b).then(name_b.cmp(name_a))
        })
        .map(|(name, _)| name.to_string())
}

fn top_revenue(observations: &[Observation]) -> Vec<RevenueEntry> {
    let mut entries: Vec<RevenueEntry> = observations
        .iter()
        .map(|o| RevenueEntry {
            app_id: o.app_id,
            name: o.name.clone(),
            revenue_proxy: o.price * o.peak_in_game as f64,
        })
        .collect();

    entries.sort_by(|a, b| {
        b.revenue_proxy
            .total_cmp(&a.revenue_proxy)
            .then_with(|| a.name.cmp(&b.name))
    });
    entries.truncate(LEADERBOARD_SIZE);
    entries
}

fn genre_peaks(observations: &[Observation]) -> Vec<GenrePeak> {
    let mut peaks_by_genre: HashMap<&str, Vec<f64>> = HashMap::new();
    for obs in observations {
        for genre in &obs.genres {
            peaks_by_genre
                .entry(genre.as_str())
                .or_default()
                .push(obs.peak_in_game as f64);
        }
    }

    let mut peaks: Vec<GenrePeak> = peaks_by_genre
        .into_iter()
        .map(|(genre, series)| GenrePeak {
            genre: genre.to_string(),
            mean_peak: mean(&series),
        })
        .collect();

    peaks.sort_by(|a, b| {
        b.mean_peak
            .total_cmp(&a.mean_peak)
            .then_with(|| a.genre.cmp(&b.genre))
    });
    peaks.truncate(LEADERBOARD_SIZE);
    peaks
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn obs(app_id: u32, rank: u32, price: f64, peak: u64, genres: &[&str]) -> Observation {
        Observation {
            app_id,
            name: format!("game-{app_id}"),
            genres: genres.iter().map(|g| g.to_string()).collect(),
            price,
            release_date: "Unknown".to_string(),
            rank,
            previous_rank: None,
            peak_in_game: peak,
            snapshot_time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            status: RankStatus::New,
            delta: 0,
        }
    }

    #[test]
    fn test_empty_snapshot() {
        let summary = SnapshotSummary::from_snapshot(&[], 10);

        assert_eq!(summary.entries, 0);
        assert_eq!(summary.most_played, None);
        assert_eq!(summary.top_genre, None);
        assert_eq!(summary.mean_price, 0.0);
        assert!(summary.top_revenue.is_empty());
        assert!(summary.genre_peaks.is_empty());
    }

    #[test]
    fn test_most_played_is_rank_one() {
        let rows = vec![
            obs(1, 2, 0.0, 10, &[]),
            obs(2, 1, 0.0, 20, &[]),
            obs(3, 3, 0.0, 5, &[]),
        ];

        let summary = SnapshotSummary::from_snapshot(&rows, 10);

        assert_eq!(summary.most_played.as_deref(), Some("game-2"));
    }

    #[test]
    fn test_top_genre_counts_and_tie_break() {
        let rows = vec![
            obs(1, 1, 0.0, 10, &["action", "rpg"]),
            obs(2, 2, 0.0, 10, &["action", "strategy"]),
            obs(3, 3, 0.0, 10, &["rpg"]),
        ];

        let summary = SnapshotSummary::from_snapshot(&rows, 10);
        // action and rpg both appear twice, tie breaks to "action"
        assert_eq!(summary.top_genre.as_deref(), Some("action"));
    }

    #[test]
    fn test_mean_price_over_top_k() {
        let rows = vec![
            obs(1, 1, 10.0, 0, &[]),
            obs(2, 2, 20.0, 0, &[]),
            obs(3, 3, 90.0, 0, &[]),
        ];

        let summary = SnapshotSummary::from_snapshot(&rows, 2);

        assert_eq!(summary.mean_price, 15.0);
    }

    #[test]
    fn test_movers_exclude_new_items() {
        let mut climber = obs(1, 1, 0.0, 0, &[]);
        climber.status = RankStatus::Up;
        climber.delta = 4;
        climber.previous_rank = Some(5);

        let mut faller = obs(2, 9, 0.0, 0, &[]);
        faller.status = RankStatus::Down;
        faller.delta = -7;
        faller.previous_rank = Some(2);

        let newcomer = obs(3, 2, 0.0, 0, &[]);

        let summary = SnapshotSummary::from_snapshot(&[climber, faller, newcomer], 10);

        assert_eq!(summary.new_entries, 1);
        let climb = summary.biggest_climb.unwrap();
        assert_eq!((climb.app_id, climb.delta), (1, 4));
        let drop = summary.biggest_drop.unwrap();
        assert_eq!((drop.app_id, drop.delta), (2, -7));
    }

    #[test]
    fn test_no_movers_when_everything_is_new() {
        let rows = vec![obs(1, 1, 0.0, 0, &[]), obs(2, 2, 0.0, 0, &[])];

        let summary = SnapshotSummary::from_snapshot(&rows, 10);

        assert!(summary.biggest_climb.is_none());
        assert!(summary.biggest_drop.is_none());
        assert_eq!(summary.new_entries, 2);
    }

    #[test]
    fn test_top_revenue_ranks_price_times_peak() {
        let rows = vec![
            obs(1, 1, 10.0, 100, &[]), // 1000
            obs(2, 2, 1.0, 5000, &[]), // 5000
            obs(3, 3, 0.0, 900_000, &[]), // 0
            obs(4, 4, 2.0, 2000, &[]), // 4000
            obs(5, 5, 50.0, 10, &[]),  // 500
            obs(6, 6, 30.0, 10, &[]),  // 300
        ];

        let summary = SnapshotSummary::from_snapshot(&rows, 10);

        let ids: Vec<u32> = summary.top_revenue.iter().map(|r| r.app_id).collect();
        assert_eq!(ids, vec![2, 4, 1, 5, 6]);
        assert_eq!(summary.top_revenue[0].revenue_proxy, 5000.0);
    }

    #[test]
    fn test_genre_peaks_mean_and_order() {
        let rows = vec![
            obs(1, 1, 0.0, 100, &["action"]),
            obs(2, 2, 0.0, 300, &["action"]),
            obs(3, 3, 0.0, 50, &["strategy"]),
        ];

        let summary = SnapshotSummary::from_snapshot(&rows, 10);

        assert_eq!(
            summary.genre_peaks,
            vec![
                GenrePeak {
                    genre: "action".to_string(),
                    mean_peak: 200.0
                },
                GenrePeak {
                    genre: "strategy".to_string(),
                    mean_peak: 50.0
                },
            ]
        );
    }
}
