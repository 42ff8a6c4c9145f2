//! Query periods and date resolution

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::InvestmentMode;

/// Relative period tokens offered to users, plus `Custom`
pub const PERIODS: &[&str] = &[
    "1M", "2M", "3M", "6M", "1Y", "2Y", "3Y", "5Y", "7Y", "10Y", "Custom",
];

#[derive(Debug, Error, PartialEq)]
pub enum PeriodParseError {
    #[error("invalid period '{0}', expected one of 1M, 3M, 6M, 1Y, 3Y, ... or Custom")]
    InvalidToken(String),

    #[error("custom period needs both a start and an end date")]
    MissingCustomDates,

    #[error("custom start {start} must be before end {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
}

#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("contribution amount must be a positive number, got {0}")]
    NonPositiveAmount(f64),
}

/// Lookback window for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Period {
    Months { count: u32 },
    Years { count: u32 },
    Custom { start: NaiveDate, end: NaiveDate },
}

impl Period {
    pub fn months(count: u32) -> Self {
        Period::Months { count }
    }

    pub fn years(count: u32) -> Self {
        Period::Years { count }
    }

    pub fn custom(start: NaiveDate, end: NaiveDate) -> Result<Self, PeriodParseError> {
        if start >= end {
            return Err(PeriodParseError::InvertedRange { start, end });
        }
        Ok(Period::Custom { start, end })
    }

    /// Parse a period token, using the custom dates only for `Custom`
    pub fn parse_with_dates(
        token: &str,
        custom_start: Option<NaiveDate>,
        custom_end: Option<NaiveDate>,
    ) -> Result<Self, PeriodParseError> {
        if token.eq_ignore_ascii_case("custom") {
            return match (custom_start, custom_end) {
                (Some(start), Some(end)) => Period::custom(start, end),
                _ => Err(PeriodParseError::MissingCustomDates),
            };
        }
        token.parse()
    }

    /// Requested start date, counted back from `as_of`.
    ///
    /// Month arithmetic clamps to the last day of shorter months
    /// (31 Mar minus 1M is 29 Feb in a leap year).
    pub fn target_start(&self, as_of: NaiveDate) -> NaiveDate {
        let back = match *self {
            Period::Months { count } => Months::new(count),
            Period::Years { count } => Months::new(count.saturating_mul(12)),
            Period::Custom { start, .. } => return start,
        };
        as_of.checked_sub_months(back).unwrap_or(NaiveDate::MIN)
    }

    /// Requested end date: the custom end, otherwise `as_of`
    pub fn target_end(&self, as_of: NaiveDate) -> NaiveDate {
        match *self {
            Period::Custom { end, .. } => end,
            _ => as_of,
        }
    }
}

impl FromStr for Period {
    type Err = PeriodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if token.eq_ignore_ascii_case("custom") {
            return Err(PeriodParseError::MissingCustomDates);
        }

        let invalid = || PeriodParseError::InvalidToken(s.to_string());
        let unit = token.chars().last().ok_or_else(invalid)?;
        let count: u32 = token[..token.len() - unit.len_utf8()]
            .parse()
            .map_err(|_| invalid())?;
        if count == 0 {
            return Err(invalid());
        }

        match unit {
            'M' | 'm' => Ok(Period::months(count)),
            'Y' | 'y' => Ok(Period::years(count)),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Months { count: 1 } => write!(f, "1 Month"),
            Period::Months { count } => write!(f, "{} Months", count),
            Period::Years { count: 1 } => write!(f, "1 Year"),
            Period::Years { count } => write!(f, "{} Years", count),
            Period::Custom { start, end } => write!(
                f,
                "{} to {}",
                start.format("%d %b %Y"),
                end.format("%d %b %Y")
            ),
        }
    }
}

/// Parameters of one backtest query, shared by every basket evaluated in it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub period: Period,
    pub mode: InvestmentMode,
    /// Lumpsum amount, or the monthly contribution in Periodic mode
    pub amount: f64,
    /// Date relative periods are counted back from
    pub as_of: NaiveDate,
}

impl Query {
    pub fn new(
        period: Period,
        mode: InvestmentMode,
        amount: f64,
        as_of: NaiveDate,
    ) -> Result<Self, QueryError> {
        if !(amount.is_finite() && amount > 0.0) {
            return Err(QueryError::NonPositiveAmount(amount));
        }
        Ok(Self {
            period,
            mode,
            amount,
            as_of,
        })
    }

    pub fn target_start(&self) -> NaiveDate {
        self.period.target_start(self.as_of)
    }

    pub fn target_end(&self) -> NaiveDate {
        self.period.target_end(self.as_of)
    }
}
