//! CLI subcommands and the query options they share

use anyhow::{Context, Result};
use basket_backtest::{data, Basket, Config, InvestmentMode, NavStore, Period, Query};
use chrono::NaiveDate;
use clap::Args;
use tracing::info;

pub mod backtest;
pub mod rank;

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Path to configuration file (built-in funds and baskets if omitted)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Period: 1M, 2M, 3M, 6M, 1Y, 2Y, 3Y, 5Y, 7Y, 10Y or Custom
    #[arg(short, long)]
    pub period: Option<String>,

    /// Custom start date (YYYY-MM-DD), implies a custom period
    #[arg(long)]
    pub start: Option<String>,

    /// Custom end date (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<String>,

    /// Investment mode: lumpsum or sip
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Lumpsum amount, or monthly contribution for SIP
    #[arg(short, long)]
    pub amount: Option<f64>,

    /// Date relative periods count back from (default: today)
    #[arg(long)]
    pub as_of: Option<String>,

    /// Only these basket ids (comma-separated). E.g., "1,3"
    #[arg(short, long)]
    pub baskets: Option<String>,

    /// Print JSON instead of tables
    #[arg(long)]
    pub json: bool,
}

/// Everything a subcommand needs to evaluate a query
pub struct Session {
    pub config: Config,
    pub store: NavStore,
    pub query: Query,
    pub baskets: Vec<Basket>,
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

impl QueryArgs {
    pub fn load(&self) -> Result<Session> {
        let config = match &self.config {
            Some(path) => {
                let config = Config::from_file(path)?;
                info!("Loaded configuration from: {}", path);
                config
            }
            None => {
                let mut config = Config::default();
                config.apply_overrides(|key| std::env::var(key).ok());
                info!("Using built-in funds and baskets");
                config
            }
        };

        let query = self.query(&config)?;
        let baskets = self.select_baskets(&config)?;

        info!("Loading NAV data from: {}", config.data.data_dir);
        let store = data::load_store(&config.data.data_dir, &config.required_funds())?;
        info!("Loaded NAV data for {} funds", store.len());

        Ok(Session {
            config,
            store,
            query,
            baskets,
        })
    }

    fn query(&self, config: &Config) -> Result<Query> {
        let start = self.start.as_deref().map(parse_date).transpose()?;
        let end = self.end.as_deref().map(parse_date).transpose()?;

        let token = match (&self.period, start) {
            (Some(period), _) => period.clone(),
            (None, Some(_)) => "Custom".to_string(),
            (None, None) => config.defaults.period.clone(),
        };
        if !token.eq_ignore_ascii_case("custom") && (start.is_some() || end.is_some()) {
            anyhow::bail!(
                "--start/--end only apply to a Custom period, not '{}'",
                token
            );
        }
        let period = Period::parse_with_dates(&token, start, end)?;

        let mode = match &self.mode {
            Some(mode) => mode.parse::<InvestmentMode>().map_err(anyhow::Error::msg)?,
            None => config.defaults.mode,
        };
        let amount = self
            .amount
            .unwrap_or_else(|| config.defaults.amount_for(mode));
        let as_of = match &self.as_of {
            Some(date) => parse_date(date)?,
            None => chrono::Local::now().date_naive(),
        };

        info!(
            "Query: {} {} of {:.2} as of {}",
            period, mode, amount, as_of
        );
        Ok(Query::new(period, mode, amount, as_of)?)
    }

    fn select_baskets(&self, config: &Config) -> Result<Vec<Basket>> {
        let active = config.active_baskets();
        let Some(list) = &self.baskets else {
            return Ok(active);
        };

        let ids = list
            .split(',')
            .map(|s| s.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Invalid basket list '{}'", list))?;

        let selected: Vec<Basket> = config
            .baskets
            .iter()
            .filter(|b| ids.contains(&b.id))
            .cloned()
            .collect();
        if selected.is_empty() {
            anyhow::bail!("No baskets match ids {}", list);
        }
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(period: Option<&str>, start: Option<&str>, end: Option<&str>) -> QueryArgs {
        QueryArgs {
            config: None,
            period: period.map(String::from),
            start: start.map(String::from),
            end: end.map(String::from),
            mode: None,
            amount: None,
            as_of: Some("2024-06-30".to_string()),
            baskets: None,
            json: false,
        }
    }

    #[test]
    fn test_relative_period_rejects_custom_dates() {
        let config = Config::default();
        let err = args(Some("1Y"), Some("2023-01-01"), Some("2023-12-31"))
            .query(&config)
            .unwrap_err();
        assert!(err.to_string().contains("Custom period"));

        assert!(args(Some("6M"), None, Some("2023-12-31")).query(&config).is_err());
        // --end alone falls back to the default relative period
        assert!(args(None, None, Some("2023-12-31")).query(&config).is_err());
    }

    #[test]
    fn test_custom_dates_resolve_period() {
        let config = Config::default();
        let query = args(None, Some("2023-01-01"), Some("2023-12-31"))
            .query(&config)
            .unwrap();
        assert_eq!(query.target_start(), NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());

        let query = args(Some("custom"), Some("2023-01-01"), Some("2023-12-31"))
            .query(&config)
            .unwrap();
        assert_eq!(query.target_start(), NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());

        assert!(args(Some("1Y"), None, None).query(&config).is_ok());
    }
}
