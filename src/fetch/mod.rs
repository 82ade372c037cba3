mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Result, anyhow};

/// Executes a GET against `url` and returns the response body.
///
/// Non-success HTTP statuses are errors here so callers never parse an
/// upstream error page as payload.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(anyhow!("GET {url} returned status {status}"));
    }
    Ok(resp.bytes().await?.to_vec())
}
