use anyhow::{Result, anyhow};
use async_trait::async_trait;

use playstats::fetch::{BasicClient, HttpClient, fetch_bytes};
use playstats::model::{DetailRecord, RankEntry};

use crate::services::charts_api::ChartsApi;

/// Client for the public Steam charts and store endpoints.
///
/// Neither endpoint requires authentication. Responses are parsed as
/// permissive JSON and only the fields the pipeline needs are extracted;
/// entries with a malformed shape are dropped rather than failing the batch.
pub struct SteamClient<C = BasicClient> {
    http: C,
    charts_url: String,
    store_url: String,
}

impl SteamClient<BasicClient> {
    pub fn new() -> Self {
        Self::with_http(BasicClient::new())
    }
}

impl Default for SteamClient<BasicClient> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: HttpClient> SteamClient<C> {
    pub fn with_http(http: C) -> Self {
        Self {
            http,
            charts_url: "https://api.steampowered.com/ISteamChartsService/GetMostPlayedGames/v1/"
                .to_string(),
            store_url: "https://store.steampowered.com/api/appdetails".to_string(),
        }
    }
}

#[async_trait]
impl<C: HttpClient> ChartsApi for SteamClient<C> {
    async fn top_games(&self, limit: usize) -> Result<Vec<RankEntry>> {
        let bytes = fetch_bytes(&self.http, &self.charts_url).await?;
        let json: serde_json::Value = serde_json::from_slice(&bytes)?;

        let ranks = json["response"]["ranks"]
            .as_array()
            .ok_or_else(|| anyhow!("charts response has no ranks array"))?;

        let entries = ranks
            .iter()
            .filter_map(|item| {
                let app_id = item["appid"].as_u64()? as u32;
                let rank = item["rank"].as_u64()? as u32;
                let peak_in_game = item["peak_in_game"].as_u64().unwrap_or(0);

                Some(RankEntry {
                    app_id,
                    rank,
                    peak_in_game,
                })
            })
            .take(limit)
            .collect();

        Ok(entries)
    }

    async fn app_details(&self, app_id: u32) -> Result<DetailRecord> {
        let url = format!("{}?appids={}", self.store_url, app_id);
        let bytes = fetch_bytes(&self.http, &url).await?;
        let json: serde_json::Value = serde_json::from_slice(&bytes)?;

        let entry = &json[app_id.to_string()];
        if !entry["success"].as_bool().unwrap_or(false) {
            return Ok(DetailRecord {
                success: false,
                name: String::new(),
                kind: String::new(),
                genres: Vec::new(),
                price_minor: None,
                release_date: None,
            });
        }

        let data = &entry["data"];
        let genres = data["genres"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|g| g["description"].as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(DetailRecord {
            success: true,
            name: data["name"].as_str().unwrap_or("Unknown").to_string(),
            kind: data["type"].as_str().unwrap_or_default().to_string(),
            genres,
            price_minor: data["price_overview"]["final"].as_i64(),
            release_date: data["release_date"]["date"].as_str().map(str::to_string),
        })
    }
}
