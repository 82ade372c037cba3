use anyhow::Result;
use std::collections::HashSet;

/// Immutable per-run ingestion settings.
///
/// Passed explicitly into [`crate::ingest::ingest`] so there is no
/// process-wide mutable configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// How many ranking entries to request.
    pub top_n: usize,
    /// Display names to drop during ingestion.
    pub exclusions: HashSet<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            top_n: 25,
            exclusions: HashSet::new(),
        }
    }
}

impl IngestConfig {
    /// Loads an exclusion list from a JSON file holding a plain array of names:
    /// ```json
    /// ["Counter-Strike 2", "Dota 2"]
    /// ```
    pub fn with_exclusions_from(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let names: Vec<String> = serde_json::from_str(&content)?;
        Ok(Self {
            exclusions: names.into_iter().collect(),
            ..Self::default()
        })
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclusions.contains(name)
    }
}
