//! Rank-delta computation against the most recent prior snapshot.

use std::collections::HashMap;

use crate::model::{Observation, RankStatus};

/// Enriches observations with previous rank, movement status and signed delta.
///
/// `previous_ranks` maps app id to the rank held in the latest snapshot
/// strictly before this one; the caller derives it from the store. An empty
/// map classifies every item as NEW.
///
/// Rank 1 is best: a smaller current rank than the previous one is UP, a
/// larger one is DOWN, equal is SAME, and `delta = previous − current`
/// (positive = climbed). Items absent from `previous_ranks` get
/// `previous_rank = None`, status NEW and a zero delta; the status takes
/// precedence over the delta everywhere downstream.
///
/// Pure and deterministic, never fails on well-typed input.
pub fn compute_deltas(
    observations: Vec<Observation>,
    previous_ranks: &HashMap<u32, u32>,
) -> Vec<Observation> {
    observations
        .into_iter()
        .map(|mut obs| {
            match previous_ranks.get(&obs.app_id) {
                Some(&prev) => {
                    obs.previous_rank = Some(prev);
                    obs.delta = i64::from(prev) - i64::from(obs.rank);
                    obs.status = if obs.rank < prev {
                        RankStatus::Up
                    } else if obs.rank > prev {
                        RankStatus::Down
                    } else {
                        RankStatus::Same
                    };
                }
                None => {
                    obs.previous_rank = None;
                    obs.status = RankStatus::New;
                    obs.delta = 0;
                }
            }
            obs
        })
        .collect()
}
