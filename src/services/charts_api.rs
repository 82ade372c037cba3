//! Trait for the game-statistics data source.

use anyhow::Result;

use playstats::model::{DetailRecord, RankEntry};

/// Abstraction over the ranking/detail provider (e.g., Steam).
///
/// `top_games` is the whole-batch call: a failure there aborts the run
/// before anything is written. `app_details` is per-item: a failure is an
/// expected outcome and surfaces as a missed lookup during ingestion.
#[async_trait::async_trait]
pub trait ChartsApi {
    /// Returns the current "most played" ranking, most popular first.
    async fn top_games(&self, limit: usize) -> Result<Vec<RankEntry>>;

    /// Returns the store-detail record for one app.
    async fn app_details(&self, app_id: u32) -> Result<DetailRecord>;
}
