//! Data loading
//!
//! Loads NAV histories from disk into a [`NavStore`]. Each fund lives in its
//! own file named after its id, either `{id}.csv` with a `date,nav` header or
//! `{id}.json` in the mfapi.in scheme document shape.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::nav::{NavSeries, NavStore};
use crate::{FundId, NavObservation};

/// Date layouts accepted in NAV files: ISO, then the provider's day-first form
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y"];

fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .with_context(|| format!("Failed to parse date: {}", s))
}

fn parse_nav(s: &str) -> Result<f64> {
    s.trim()
        .parse::<f64>()
        .with_context(|| format!("Failed to parse nav: {}", s))
}

// =============================================================================
// CSV
// =============================================================================

/// Load observations from a `date,nav` CSV file (unsorted, as stored)
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<NavObservation>> {
    let mut reader = csv::Reader::from_path(path.as_ref()).context("Failed to open CSV file")?;

    let mut observations = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let date = parse_date(record.get(0).context("Missing date column")?)?;
        let nav = parse_nav(record.get(1).context("Missing nav column")?)?;
        observations.push(NavObservation::new(date, nav));
    }

    Ok(observations)
}

// =============================================================================
// mfapi.in JSON
// =============================================================================

#[derive(Debug, Deserialize)]
struct SchemeDocument {
    #[serde(default)]
    status: Option<String>,
    data: Vec<SchemeNav>,
}

#[derive(Debug, Deserialize)]
struct SchemeNav {
    date: String,
    nav: NavValue,
}

/// The provider sends NAVs as strings; hand-written files often use numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NavValue {
    Text(String),
    Number(f64),
}

/// Load observations from an mfapi.in scheme document
pub fn load_json(path: impl AsRef<Path>) -> Result<Vec<NavObservation>> {
    let contents = fs::read_to_string(path.as_ref()).context("Failed to read JSON file")?;
    let document: SchemeDocument =
        serde_json::from_str(&contents).context("Failed to parse NAV JSON")?;

    if let Some(status) = document.status.as_deref() {
        if status != "SUCCESS" {
            debug!("NAV document status is {}", status);
        }
    }

    document
        .data
        .iter()
        .map(|entry| {
            let nav = match &entry.nav {
                NavValue::Text(s) => parse_nav(s)?,
                NavValue::Number(n) => *n,
            };
            Ok(NavObservation::new(parse_date(&entry.date)?, nav))
        })
        .collect()
}

// =============================================================================
// Store
// =============================================================================

/// Load one fund's history from `data_dir`, or `None` if it has no file
pub fn load_series(data_dir: impl AsRef<Path>, fund: &FundId) -> Result<Option<NavSeries>> {
    let data_dir = data_dir.as_ref();
    let csv_path = data_dir.join(format!("{}.csv", fund));
    let json_path = data_dir.join(format!("{}.json", fund));

    let observations = if csv_path.exists() {
        load_csv(&csv_path)?
    } else if json_path.exists() {
        load_json(&json_path)?
    } else {
        return Ok(None);
    };

    let series = NavSeries::from_unsorted(observations)
        .with_context(|| format!("Invalid NAV history for fund {}", fund))?;
    Ok(Some(series))
}

/// Load NAV histories for `funds` from `data_dir`.
///
/// Funds without a file are skipped with a warning; the engine treats them
/// as unavailable. Fails if nothing could be loaded.
pub fn load_store(data_dir: impl AsRef<Path>, funds: &[FundId]) -> Result<NavStore> {
    let data_dir = data_dir.as_ref();
    let mut store = NavStore::new();

    for fund in funds {
        let series = load_series(data_dir, fund)
            .with_context(|| format!("Failed to load data for {}", fund))?;
        let Some(series) = series else {
            warn!("NAV file not found for fund {} in {}", fund, data_dir.display());
            continue;
        };

        info!(
            "Loaded {} NAVs for {} ({} to {})",
            series.len(),
            fund,
            series.first().map(|o| o.date.to_string()).unwrap_or_default(),
            series.last().map(|o| o.date.to_string()).unwrap_or_default()
        );
        store.insert(fund.clone(), series);
    }

    if store.is_empty() {
        anyhow::bail!("No NAV data loaded for any fund from {}", data_dir.display());
    }

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::NavProvider;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-03-05").unwrap(), d(2024, 3, 5));
        assert_eq!(parse_date("05-03-2024").unwrap(), d(2024, 3, 5));
        assert!(parse_date("03/05/2024").is_err());
    }

    #[test]
    fn test_load_csv_sorts_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("101.csv"),
            "date,nav\n2024-01-03,12.5\n02-01-2024,12.0\n2024-01-03,99.0\n",
        )
        .unwrap();

        let series = load_series(dir.path(), &FundId::new("101")).unwrap().unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.inception(), Some(d(2024, 1, 2)));
        assert_eq!(series.valuation_nav(d(2024, 1, 3)), Some(12.5));
    }

    #[test]
    fn test_load_mfapi_json() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("118741.json"),
            r#"{
                "meta": {"scheme_code": 118741},
                "data": [
                    {"date": "03-01-2024", "nav": "34.5612"},
                    {"date": "02-01-2024", "nav": 34.1}
                ],
                "status": "SUCCESS"
            }"#,
        )
        .unwrap();

        let series = load_series(dir.path(), &FundId::new("118741")).unwrap().unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.valuation_nav(d(2024, 1, 3)), Some(34.5612));
    }

    #[test]
    fn test_load_store_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "date,nav\n2024-01-01,10\n").unwrap();

        let store = load_store(dir.path(), &[FundId::new("a"), FundId::new("b")]).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.series(&FundId::new("b")).is_none());

        assert!(load_store(dir.path(), &[FundId::new("b")]).is_err());
    }

    #[test]
    fn test_invalid_nav_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("z.csv"), "date,nav\n2024-01-01,0\n").unwrap();
        assert!(load_series(dir.path(), &FundId::new("z")).is_err());

        fs::write(dir.path().join("y.csv"), "date,nav\n2024-01-01,abc\n").unwrap();
        assert!(load_series(dir.path(), &FundId::new("y")).is_err());
    }
}
