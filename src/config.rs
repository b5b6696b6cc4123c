use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::{Deserialize, Serialize};

/// Crawl settings: defaults below, overridden by an optional JSON file,
/// overridden by `DVX_*` environment variables (`__` separates nesting,
/// e.g. `DVX_WAIT__SETTLE_MS`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Reprogramming catalog root listing the brands.
    pub base_url: String,
    /// Brand links are kept when their text contains one of these,
    /// case-insensitively.
    pub target_brands: Vec<String>,
    pub selectors: SelectorConfig,
    pub wait: WaitTimes,
    /// Render attempts per page before falling back to a plain GET.
    pub retries: u32,
    /// Highest stage number to probe; unset probes until a stage comes
    /// back empty.
    pub max_stage: Option<u32>,
    /// Synthesize a missing stage from the last extracted one instead of
    /// stopping at the first empty page.
    pub fill_missing_stages: bool,
    pub output_path: PathBuf,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub brands: String,
    pub models: String,
    pub types: String,
    pub engines: String,
    /// Name/power spans inside one engine anchor.
    pub engine_spans: String,
    pub stage: StageSelectors,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSelectors {
    /// Progress-bar value spans: hp stock/tuned, then nm stock/tuned.
    pub progress_values: String,
    pub old_price: String,
    pub new_price: String,
    pub engine_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitTimes {
    /// Pause after each successful page load.
    pub settle_ms: u64,
    /// Upper bound on one render attempt.
    pub timeout_ms: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dvxperformance.com/dvxsteenokkerzeel/reprogramming".to_string(),
            target_brands: [
                "Audi",
                "BMW",
                "Mercedes",
                "Volkswagen",
                "Porsche",
                "Cupra",
                "Skoda",
                "Seat",
                "Mini",
                "Lamborghini",
                "Bentley",
                "Aston Martin",
            ]
            .iter()
            .map(|b| b.to_string())
            .collect(),
            selectors: SelectorConfig::default(),
            wait: WaitTimes::default(),
            retries: 3,
            max_stage: Some(2),
            fill_missing_stages: false,
            output_path: PathBuf::from("data/supreme-tuning-master.json"),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36".to_string(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            brands: ".brand.featured a, .brand a".to_string(),
            models: ".model.hvr-grow a, .model a".to_string(),
            types: ".type.hvr-grow a, .type a".to_string(),
            engines: ".engine.hvr-grow a, .engine a".to_string(),
            engine_spans: "div span".to_string(),
            stage: StageSelectors::default(),
        }
    }
}

impl Default for StageSelectors {
    fn default() -> Self {
        Self {
            progress_values: "h2 + .improvement + .progress .progress-bar span".to_string(),
            old_price: ".old-price".to_string(),
            new_price: ".new-price".to_string(),
            engine_label: ".pricing-table .value".to_string(),
        }
    }
}

impl Default for WaitTimes {
    fn default() -> Self {
        Self { settle_ms: 1000, timeout_ms: 30_000 }
    }
}

pub fn load(path: Option<&Path>) -> Result<CrawlConfig> {
    let mut builder =
        Config::builder().add_source(Config::try_from(&CrawlConfig::default())?);
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path.to_path_buf()));
    }
    let settings = builder
        .add_source(Environment::with_prefix("DVX").separator("__").try_parsing(true))
        .build()
        .context("assembling configuration")?;
    settings
        .try_deserialize()
        .context("deserializing configuration")
}
