//! Backtesting engine
//!
//! Evaluates baskets against a benchmark-driven trading calendar and turns
//! raw simulations into performance results: drawdown series, absolute
//! return, and CAGR (lumpsum) or XIRR (periodic).
//!
//! Every basket run is independent and only reads NAV data, so multi-basket
//! queries are spread across threads with rayon. Output order always matches
//! input order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info};

use crate::drawdown::DrawdownTracker;
use crate::nav::NavProvider;
use crate::simulator::{Simulation, Simulator, TradingCalendar};
use crate::xirr::xirr;
use crate::yearly::{self, YearlyRankings};
use crate::{
    Basket, CashFlow, FundId, InvestmentMode, PerformanceResult, PerformanceStats, Query,
    TimeSeriesPoint, YearlyReturn,
};

const DAYS_PER_YEAR: f64 = 365.25;

/// Backtest engine bound to a NAV provider and a benchmark fund
pub struct Backtester<'a, P: NavProvider + ?Sized> {
    provider: &'a P,
    benchmark: FundId,
}

impl<'a, P: NavProvider + ?Sized> Backtester<'a, P> {
    pub fn new(provider: &'a P, benchmark: FundId) -> Self {
        Backtester {
            provider,
            benchmark,
        }
    }

    pub fn benchmark(&self) -> &FundId {
        &self.benchmark
    }

    /// Trading calendar for a query, or `None` if the benchmark has no data
    /// in the requested window
    pub fn calendar(&self, query: &Query) -> Option<TradingCalendar> {
        let Some(benchmark) = self.provider.series(&self.benchmark) else {
            debug!("Benchmark {} has no NAV history", self.benchmark);
            return None;
        };
        TradingCalendar::resolve(benchmark, query.target_start(), query.target_end())
    }

    /// Evaluate one basket. `None` means the basket cannot be evaluated for
    /// this query (missing fund history or no valued dates).
    pub fn run(&self, basket: &Basket, query: &Query) -> Option<PerformanceResult> {
        let calendar = self.calendar(query)?;
        self.run_on(&calendar, basket, query)
    }

    fn run_on(
        &self,
        calendar: &TradingCalendar,
        basket: &Basket,
        query: &Query,
    ) -> Option<PerformanceResult> {
        let simulator = Simulator::new(self.provider, calendar);
        let simulation = match query.mode {
            InvestmentMode::Lumpsum => simulator.lumpsum(
                basket,
                query.amount,
                query.target_start(),
                calendar.actual_start(),
            )?,
            InvestmentMode::Periodic => simulator.periodic(
                basket,
                query.amount,
                calendar.actual_start(),
                calendar.actual_start(),
            )?,
        };

        let result = summarize(simulation, query, calendar);
        if result.is_none() {
            debug!("Basket '{}' has no valued dates for this query", basket.name);
        }
        result
    }

    /// Evaluate every basket, in parallel, skipping those without a result
    pub fn run_all(&self, baskets: &[Basket], query: &Query) -> Vec<BasketPerformance> {
        let Some(calendar) = self.calendar(query) else {
            info!("No trading dates for benchmark {} in the requested window", self.benchmark);
            return Vec::new();
        };
        info!(
            "Evaluating {} baskets over {} trading days from {}",
            baskets.len(),
            calendar.dates().len(),
            calendar.actual_start()
        );

        baskets
            .par_iter()
            .map(|basket| {
                self.run_on(&calendar, basket, query)
                    .map(|result| BasketPerformance {
                        basket_id: basket.id,
                        basket_name: basket.name.clone(),
                        result,
                    })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }

    /// Calendar-year returns for one basket
    pub fn yearly_returns(
        &self,
        basket: &Basket,
        query: &Query,
    ) -> Option<BTreeMap<i32, YearlyReturn>> {
        let calendar = self.calendar(query)?;
        yearly::yearly_returns(&Simulator::new(self.provider, &calendar), basket, query)
    }

    /// Rank baskets within each calendar year of the query window
    pub fn yearly_rankings(&self, baskets: &[Basket], query: &Query) -> YearlyRankings {
        let Some(calendar) = self.calendar(query) else {
            return YearlyRankings::default();
        };
        let simulator = Simulator::new(self.provider, &calendar);

        let returns: Vec<Option<BTreeMap<i32, YearlyReturn>>> = baskets
            .par_iter()
            .map(|basket| yearly::yearly_returns(&simulator, basket, query))
            .collect();

        YearlyRankings::from_returns(
            baskets
                .iter()
                .zip(&returns)
                .filter_map(|(basket, r)| r.as_ref().map(|r| (basket, r))),
        )
    }
}

/// Turn a simulation into a performance result, or `None` if nothing was valued
fn summarize(
    simulation: Simulation,
    query: &Query,
    calendar: &TradingCalendar,
) -> Option<PerformanceResult> {
    let last = *simulation.last()?;

    let mut tracker = DrawdownTracker::new();
    let series: Vec<TimeSeriesPoint> = simulation
        .points
        .iter()
        .map(|p| TimeSeriesPoint {
            date: p.date,
            value: p.value,
            drawdown_pct: tracker.update(p.date, p.value),
        })
        .collect();
    let drawdown = tracker.finish();

    let final_value = last.value;
    let (initial, annualized_pct, cash_flows) = match query.mode {
        InvestmentMode::Lumpsum => {
            let initial = query.amount;
            let years = (last.date - calendar.actual_start()).num_days() as f64 / DAYS_PER_YEAR;
            let cagr = if years > 0.0 {
                ((final_value / initial).powf(1.0 / years) - 1.0) * 100.0
            } else {
                0.0
            };
            (initial, cagr, Vec::new())
        }
        InvestmentMode::Periodic => {
            let mut flows = simulation.contributions;
            flows.push(CashFlow::new(last.date, final_value));
            (simulation.total_invested, xirr(&flows), flows)
        }
    };

    let abs_return_pct = if initial > 0.0 {
        (final_value / initial - 1.0) * 100.0
    } else {
        0.0
    };

    Some(PerformanceResult {
        series,
        stats: PerformanceStats {
            initial,
            final_value,
            abs_return_pct,
            annualized_pct,
            max_drawdown_pct: drawdown.max_drawdown_pct,
            avg_drawdown_run_days: drawdown.avg_run_days,
            max_drawdown_run_days: drawdown.max_run_days,
        },
        holdings: simulation.holdings,
        cash_flows,
    })
}

/// A basket's result within a multi-basket query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasketPerformance {
    pub basket_id: u32,
    pub basket_name: String,
    #[serde(flatten)]
    pub result: PerformanceResult,
}

// =============================================================================
// Sorting
// =============================================================================

/// Column to order a results table by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    FinalValue,
    AbsReturn,
    Annualized,
    MaxDrawdown,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "final" | "value" => Ok(SortKey::FinalValue),
            "abs" | "return" => Ok(SortKey::AbsReturn),
            "cagr" | "xirr" | "annualized" => Ok(SortKey::Annualized),
            "mdd" | "drawdown" => Ok(SortKey::MaxDrawdown),
            other => Err(format!(
                "unknown sort key '{}' (name, final, abs, annualized, drawdown)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Stable sort of results by one column
pub fn sort_performances(results: &mut [BasketPerformance], key: SortKey, direction: SortDirection) {
    results.sort_by(|a, b| {
        let ordering = match key {
            SortKey::Name => a.basket_name.cmp(&b.basket_name),
            SortKey::FinalValue => cmp_f64(a.result.stats.final_value, b.result.stats.final_value),
            SortKey::AbsReturn => {
                cmp_f64(a.result.stats.abs_return_pct, b.result.stats.abs_return_pct)
            }
            SortKey::Annualized => {
                cmp_f64(a.result.stats.annualized_pct, b.result.stats.annualized_pct)
            }
            SortKey::MaxDrawdown => {
                cmp_f64(a.result.stats.max_drawdown_pct, b.result.stats.max_drawdown_pct)
            }
        };
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}
