//! Calendar-year returns and cross-basket rankings
//!
//! Each basket is re-simulated from the first date all of its funds have
//! history (the effective start), its valued dates are bucketed by calendar
//! year, and the baskets are ranked within each year.
//!
//! The yearly return differs by mode:
//! - Lumpsum: `(end - start) / start`, the return within that year.
//! - Periodic: `(end - invested) / invested` at year end, i.e. the
//!   cumulative return to date rather than a single-year figure.

use chrono::{Datelike, NaiveDate};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::nav::NavProvider;
use crate::simulator::{Simulator, ValuedDate};
use crate::{Basket, InvestmentMode, Query, RankedBasket, YearlyReturn};

/// First and last valued dates seen in one calendar year
#[derive(Debug, Clone, Copy)]
struct YearBucket {
    start_date: NaiveDate,
    start_value: f64,
    end_date: NaiveDate,
    end_value: f64,
    end_invested: f64,
}

impl YearBucket {
    fn open(point: &ValuedDate) -> Self {
        Self {
            start_date: point.date,
            start_value: point.value,
            end_date: point.date,
            end_value: point.value,
            end_invested: point.invested,
        }
    }

    fn extend(&mut self, point: &ValuedDate) {
        self.end_date = point.date;
        self.end_value = point.value;
        self.end_invested = point.invested;
    }

    fn into_return(self, year: i32, mode: InvestmentMode) -> YearlyReturn {
        let (return_pct, invested) = match mode {
            InvestmentMode::Lumpsum => {
                let pct = if self.start_value > 0.0 {
                    (self.end_value - self.start_value) / self.start_value * 100.0
                } else {
                    0.0
                };
                (pct, None)
            }
            InvestmentMode::Periodic => {
                let pct = if self.end_invested > 0.0 {
                    (self.end_value - self.end_invested) / self.end_invested * 100.0
                } else {
                    0.0
                };
                (pct, Some(self.end_invested))
            }
        };

        YearlyReturn {
            year,
            return_pct,
            start_date: self.start_date,
            end_date: self.end_date,
            start_value: self.start_value,
            end_value: self.end_value,
            invested,
        }
    }
}

/// Bucket valued dates by calendar year and compute each year's return
pub fn bucket_by_year(points: &[ValuedDate], mode: InvestmentMode) -> BTreeMap<i32, YearlyReturn> {
    let mut buckets: BTreeMap<i32, YearBucket> = BTreeMap::new();
    for point in points {
        buckets
            .entry(point.date.year())
            .and_modify(|bucket| bucket.extend(point))
            .or_insert_with(|| YearBucket::open(point));
    }

    buckets
        .into_iter()
        .map(|(year, bucket)| (year, bucket.into_return(year, mode)))
        .collect()
}

/// Per-year returns for one basket, or `None` if it has no valued dates
pub fn yearly_returns<P: NavProvider + ?Sized>(
    simulator: &Simulator<'_, P>,
    basket: &Basket,
    query: &Query,
) -> Option<BTreeMap<i32, YearlyReturn>> {
    let start = simulator.effective_start(basket)?;
    let simulation = match query.mode {
        InvestmentMode::Lumpsum => simulator.lumpsum(basket, query.amount, start, start)?,
        InvestmentMode::Periodic => {
            // Contributions stay on the calendar's schedule; those due before
            // every fund has history are caught up from `start`
            let anchor = simulator.calendar().actual_start();
            simulator.periodic(basket, query.amount, anchor, start)?
        }
    };
    if simulation.is_empty() {
        return None;
    }
    Some(bucket_by_year(&simulation.points, query.mode))
}

/// Baskets ordered by return within each calendar year
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct YearlyRankings {
    years: BTreeMap<i32, Vec<RankedBasket>>,
}

impl YearlyRankings {
    /// Rank baskets per year, highest return first.
    ///
    /// Ties keep the order in which baskets were supplied.
    pub fn from_returns<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a Basket, &'a BTreeMap<i32, YearlyReturn>)>,
    {
        let mut years: BTreeMap<i32, Vec<RankedBasket>> = BTreeMap::new();
        for (basket, returns) in entries {
            for (year, ret) in returns {
                years.entry(*year).or_default().push(RankedBasket {
                    basket_id: basket.id,
                    basket_name: basket.name.clone(),
                    return_pct: ret.return_pct,
                    start_value: ret.start_value,
                    end_value: ret.end_value,
                });
            }
        }

        for ranked in years.values_mut() {
            // sort_by is stable
            ranked.sort_by(|a, b| {
                b.return_pct
                    .partial_cmp(&a.return_pct)
                    .unwrap_or(Ordering::Equal)
            });
        }

        Self { years }
    }

    pub fn years(&self) -> Vec<i32> {
        self.years.keys().copied().collect()
    }

    pub fn get(&self, year: i32) -> Option<&[RankedBasket]> {
        self.years.get(&year).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// Number of rank rows needed to show every year
    pub fn depth(&self) -> usize {
        self.years.values().map(Vec::len).max().unwrap_or(0)
    }

    /// Render the rank x year matrix as a formatted string
    pub fn render(&self) -> String {
        if self.years.is_empty() {
            return "No yearly data available for the selected period.".to_string();
        }

        let cell: usize = 28;
        let years = self.years();
        let width = 7 + years.len() * (cell + 3);
        let mut output = String::new();

        output.push_str(&format!("\n{}\n", "=".repeat(width)));
        output.push_str("YEARLY RANKINGS (return %)\n");
        output.push_str(&format!("{}\n", "=".repeat(width)));

        let header = years.iter().map(|y| format!("{:^cell$}", y)).join(" │ ");
        output.push_str(&format!("{:>4} │ {}\n", "Rank", header));
        output.push_str(&format!("{}\n", "-".repeat(width)));

        for rank in 0..self.depth() {
            let row = years
                .iter()
                .map(|year| match self.years[year].get(rank) {
                    Some(entry) => format_cell(entry, cell),
                    None => format!("{:^cell$}", "-"),
                })
                .join(" │ ");
            output.push_str(&format!("{:>4} │ {}\n", rank + 1, row));
        }

        output.push_str(&format!("{}\n", "=".repeat(width)));
        output
    }
}

fn format_cell(entry: &RankedBasket, width: usize) -> String {
    let name: String = entry.basket_name.chars().take(width - 10).collect();
    format!(
        "{:<name_w$}{:>9.2}%",
        name,
        entry.return_pct,
        name_w = width - 10
    )
}
