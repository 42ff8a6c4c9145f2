//! NAV index
//!
//! Per-fund price history with "latest observation on or before a date"
//! lookups. Two lookup flavours exist and callers must pick the right one:
//!
//! - [`NavSeries::purchase_nav`] falls back to the first observation when the
//!   date precedes the series. Only used to price a purchase at the very start
//!   of history.
//! - [`NavSeries::valuation_nav`] never falls back. A date before the series
//!   has no value and the caller drops that date.

use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;

use crate::{FundId, NavObservation};

/// Validation errors for NAV histories
#[derive(Debug, Error, PartialEq)]
pub enum NavSeriesError {
    #[error("NAV series is empty")]
    Empty,

    #[error("NAV on {date} must be positive, got {nav}")]
    NonPositiveNav { date: NaiveDate, nav: f64 },

    #[error("NAV dates must be strictly increasing: {previous} is followed by {date}")]
    NotIncreasing { previous: NaiveDate, date: NaiveDate },
}

/// Ordered, de-duplicated price history for one fund
#[derive(Debug, Clone, PartialEq)]
pub struct NavSeries {
    observations: Vec<NavObservation>,
}

impl NavSeries {
    /// Build a series from observations already sorted by date
    pub fn new(observations: Vec<NavObservation>) -> Result<Self, NavSeriesError> {
        let series = Self { observations };
        series.validate()?;
        Ok(series)
    }

    /// Build a series from raw provider output: sorts by date and keeps the
    /// first observation for any duplicated date.
    pub fn from_unsorted(mut observations: Vec<NavObservation>) -> Result<Self, NavSeriesError> {
        observations.sort_by_key(|o| o.date);
        observations.dedup_by_key(|o| o.date);
        Self::new(observations)
    }

    fn validate(&self) -> Result<(), NavSeriesError> {
        if self.observations.is_empty() {
            return Err(NavSeriesError::Empty);
        }

        for (i, obs) in self.observations.iter().enumerate() {
            if obs.nav <= 0.0 || !obs.nav.is_finite() {
                return Err(NavSeriesError::NonPositiveNav {
                    date: obs.date,
                    nav: obs.nav,
                });
            }
            if i > 0 && obs.date <= self.observations[i - 1].date {
                return Err(NavSeriesError::NotIncreasing {
                    previous: self.observations[i - 1].date,
                    date: obs.date,
                });
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// First observation; defines the fund's inception for this dataset
    pub fn first(&self) -> Option<&NavObservation> {
        self.observations.first()
    }

    pub fn last(&self) -> Option<&NavObservation> {
        self.observations.last()
    }

    pub fn inception(&self) -> Option<NaiveDate> {
        self.first().map(|o| o.date)
    }

    /// Latest observation dated on or before `date`, without fallback.
    ///
    /// Binary search over the sorted dates; an exact hit returns that
    /// observation, otherwise the latest strictly earlier one.
    pub fn latest_on_or_before(&self, date: NaiveDate) -> Option<&NavObservation> {
        let idx = self.observations.partition_point(|o| o.date <= date);
        if idx == 0 {
            None
        } else {
            self.observations.get(idx - 1)
        }
    }

    /// Observation used to price a purchase: forward-filled, falling back to
    /// the first observation if `date` precedes the series.
    pub fn purchase_nav(&self, date: NaiveDate) -> Option<&NavObservation> {
        self.latest_on_or_before(date).or_else(|| self.first())
    }

    /// Forward-filled NAV used for daily valuation. `None` means the date is
    /// before this fund's coverage and must not be valued.
    pub fn valuation_nav(&self, date: NaiveDate) -> Option<f64> {
        self.latest_on_or_before(date).map(|o| o.nav)
    }

    /// Observation dates within `[start, end]`, used as a trading calendar
    pub fn dates_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        self.observations
            .iter()
            .map(|o| o.date)
            .skip_while(|d| *d < start)
            .take_while(|d| *d <= end)
            .collect()
    }
}

// =============================================================================
// Data provider
// =============================================================================

/// Read-only source of NAV histories.
///
/// Everything the engine needs must be loaded before a query runs: a missing
/// series means "unavailable for this query", never "still loading".
pub trait NavProvider: Sync {
    fn series(&self, fund: &FundId) -> Option<&NavSeries>;
}

/// In-memory NAV provider keyed by fund id
#[derive(Debug, Clone, Default)]
pub struct NavStore {
    data: HashMap<FundId, NavSeries>,
}

impl NavStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, fund: FundId, series: NavSeries) {
        self.data.insert(fund, series);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl NavProvider for NavStore {
    fn series(&self, fund: &FundId) -> Option<&NavSeries> {
        self.data.get(fund)
    }
}

impl FromIterator<(FundId, NavSeries)> for NavStore {
    fn from_iter<I: IntoIterator<Item = (FundId, NavSeries)>>(iter: I) -> Self {
        Self {
            data: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn series() -> NavSeries {
        NavSeries::new(vec![
            NavObservation::new(d(2024, 1, 1), 10.0),
            NavObservation::new(d(2024, 1, 3), 11.0),
            NavObservation::new(d(2024, 1, 10), 12.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_exact_date_lookup() {
        let s = series();
        assert_eq!(s.latest_on_or_before(d(2024, 1, 3)).unwrap().nav, 11.0);
        assert_eq!(s.latest_on_or_before(d(2024, 1, 10)).unwrap().nav, 12.0);
    }

    #[test]
    fn test_forward_fill_between_observations() {
        let s = series();
        assert_eq!(s.latest_on_or_before(d(2024, 1, 2)).unwrap().nav, 10.0);
        assert_eq!(s.valuation_nav(d(2024, 1, 9)), Some(11.0));
        assert_eq!(s.valuation_nav(d(2024, 6, 1)), Some(12.0));
    }

    #[test]
    fn test_before_first_observation() {
        let s = series();
        assert!(s.latest_on_or_before(d(2023, 12, 31)).is_none());
        assert_eq!(s.valuation_nav(d(2023, 12, 31)), None);
        // Purchase lookups fall back to inception
        assert_eq!(s.purchase_nav(d(2023, 12, 31)).unwrap().date, d(2024, 1, 1));
    }

    #[test]
    fn test_from_unsorted_dedups() {
        let s = NavSeries::from_unsorted(vec![
            NavObservation::new(d(2024, 1, 3), 11.0),
            NavObservation::new(d(2024, 1, 1), 10.0),
            NavObservation::new(d(2024, 1, 3), 99.0),
        ])
        .unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.inception(), Some(d(2024, 1, 1)));
    }

    #[test]
    fn test_rejects_unordered_and_bad_prices() {
        assert_eq!(NavSeries::new(vec![]), Err(NavSeriesError::Empty));
        assert!(matches!(
            NavSeries::new(vec![
                NavObservation::new(d(2024, 1, 2), 10.0),
                NavObservation::new(d(2024, 1, 1), 10.0),
            ]),
            Err(NavSeriesError::NotIncreasing { .. })
        ));
        assert!(matches!(
            NavSeries::new(vec![NavObservation::new(d(2024, 1, 1), 0.0)]),
            Err(NavSeriesError::NonPositiveNav { .. })
        ));
    }

    #[test]
    fn test_dates_between() {
        let s = series();
        assert_eq!(
            s.dates_between(d(2024, 1, 2), d(2024, 1, 10)),
            vec![d(2024, 1, 3), d(2024, 1, 10)]
        );
        assert!(s.dates_between(d(2025, 1, 1), d(2025, 2, 1)).is_empty());
    }

    #[test]
    fn test_store_lookup() {
        let store: NavStore = vec![(FundId::new("118741"), series())].into_iter().collect();
        assert!(store.series(&FundId::new("118741")).is_some());
        assert!(store.series(&FundId::new("000000")).is_none());
    }
}
