//! Configuration management
//!
//! Handles loading and parsing of JSON configuration files with environment
//! variable overrides for the data directory and benchmark fund.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::{Basket, FundId, InvestmentMode};

/// Fund that drives the trading calendar unless configured otherwise (Nifty 50)
pub const DEFAULT_BENCHMARK: &str = "118741";

const DEFAULT_COLOR: &str = "#18181b";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_benchmark")]
    pub benchmark: FundId,
    #[serde(default)]
    pub data: DataConfig,
    /// Fund catalogue, used for display names
    #[serde(default)]
    pub funds: Vec<FundInfo>,
    pub baskets: Vec<Basket>,
    #[serde(default)]
    pub defaults: QueryDefaults,
}

fn default_benchmark() -> FundId {
    FundId::new(DEFAULT_BENCHMARK)
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Override settings from `NAV_DATA_DIR` and `NAV_BENCHMARK_FUND`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("NAV_DATA_DIR") {
            self.data.data_dir = dir;
        }
        if let Some(benchmark) = lookup("NAV_BENCHMARK_FUND") {
            self.benchmark = FundId::new(benchmark.trim());
        }
    }

    /// Reject malformed baskets and normalise display colours
    pub fn validate(&mut self) -> Result<()> {
        if self.baskets.is_empty() {
            anyhow::bail!("Config must define at least one basket");
        }

        let mut ids = BTreeSet::new();
        for basket in &mut self.baskets {
            basket
                .validate()
                .with_context(|| format!("Invalid basket #{}", basket.id))?;
            if !ids.insert(basket.id) {
                anyhow::bail!("Duplicate basket id {}", basket.id);
            }

            if let Some(color) = &basket.color {
                if !is_hex_color(color) {
                    warn!(
                        "Basket '{}': invalid colour '{}', using {}",
                        basket.name, color, DEFAULT_COLOR
                    );
                    basket.color = Some(DEFAULT_COLOR.to_string());
                }
            }
        }

        Ok(())
    }

    pub fn active_baskets(&self) -> Vec<Basket> {
        self.baskets.iter().filter(|b| b.active).cloned().collect()
    }

    /// Every fund that needs NAV history: the benchmark, the catalogue and
    /// all basket holdings
    pub fn required_funds(&self) -> Vec<FundId> {
        let mut ids: BTreeSet<FundId> = BTreeSet::new();
        ids.insert(self.benchmark.clone());
        ids.extend(self.funds.iter().map(|f| f.id.clone()));
        for basket in &self.baskets {
            ids.extend(basket.weighted_funds().map(|(id, _)| id.clone()));
        }
        ids.into_iter().collect()
    }

    pub fn fund_name(&self, id: &FundId) -> Option<&str> {
        self.funds
            .iter()
            .find(|f| &f.id == id)
            .map(|f| f.name.as_str())
    }
}

impl Default for Config {
    fn default() -> Self {
        let nifty50 = FundId::new("118741");
        let midcap150 = FundId::new("148726");
        let gold = FundId::new("140088");
        let debt = FundId::new("143494");

        Config {
            benchmark: nifty50.clone(),
            data: DataConfig::default(),
            funds: vec![
                FundInfo::new(&nifty50, "Nippon India Index Fund - Nifty 50 Plan - Direct Plan Growth Plan"),
                FundInfo::new(&midcap150, "Nippon India Nifty Midcap 150 Index Fund - Direct Plan - Growth Option"),
                FundInfo::new(&gold, "Nippon India ETF Gold BeES"),
                FundInfo::new(&debt, "Nippon India Ultra Short Duration Fund Direct Growth"),
            ],
            baskets: vec![
                Basket::new(
                    1,
                    "Benchmark: Nifty 50",
                    [(nifty50.clone(), 100.0)].into_iter().collect(),
                )
                .with_color("#18181b"),
                Basket::new(
                    2,
                    "Aggressive: Nifty 50 + MidCap 150",
                    [(nifty50.clone(), 50.0), (midcap150.clone(), 50.0)]
                        .into_iter()
                        .collect(),
                )
                .with_color("#2563eb"),
                Basket::new(
                    3,
                    "Nifty 50 + MidCap 150 + GOLD",
                    [
                        (nifty50.clone(), 33.0),
                        (midcap150.clone(), 33.0),
                        (gold.clone(), 34.0),
                    ]
                    .into_iter()
                    .collect(),
                )
                .with_color("#f59e0b"),
                Basket::new(
                    4,
                    "Nifty 50 + MidCap 150 + GOLD + Debt",
                    [(nifty50, 20.0), (midcap150, 20.0), (gold, 30.0), (debt, 30.0)]
                        .into_iter()
                        .collect(),
                )
                .with_color("#10b981"),
            ],
            defaults: QueryDefaults::default(),
        }
    }
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Where NAV histories live on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub data_dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            data_dir: "data".to_string(),
        }
    }
}

/// Catalogue entry for a fund
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundInfo {
    pub id: FundId,
    pub name: String,
}

impl FundInfo {
    pub fn new(id: &FundId, name: impl Into<String>) -> Self {
        FundInfo {
            id: id.clone(),
            name: name.into(),
        }
    }
}

/// Query settings used when the CLI does not override them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDefaults {
    /// Period token, e.g. "1Y"
    pub period: String,
    pub mode: InvestmentMode,
    pub lumpsum_amount: f64,
    /// Monthly contribution
    pub sip_amount: f64,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        QueryDefaults {
            period: "1Y".to_string(),
            mode: InvestmentMode::Lumpsum,
            lumpsum_amount: InvestmentMode::Lumpsum.default_amount(),
            sip_amount: InvestmentMode::Periodic.default_amount(),
        }
    }
}

impl QueryDefaults {
    pub fn amount_for(&self, mode: InvestmentMode) -> f64 {
        match mode {
            InvestmentMode::Lumpsum => self.lumpsum_amount,
            InvestmentMode::Periodic => self.sip_amount,
        }
    }
}
