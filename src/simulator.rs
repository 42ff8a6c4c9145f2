//! Holdings simulator
//!
//! Values a basket on every date of the trading calendar under either a
//! single upfront purchase (lumpsum) or a monthly contribution plan (SIP).
//!
//! Each run builds its own holdings from the basket snapshot; the basket and
//! the NAV histories are only read. A basket that cannot be priced (a weighted
//! fund with no history) yields `None`, and a date on which a held fund has no
//! price at or before it is dropped rather than valued at zero.

use chrono::{Months, NaiveDate};
use tracing::debug;

use crate::nav::{NavProvider, NavSeries};
use crate::{Basket, CashFlow, FundId, HoldingSnapshot};

/// Master timeline for a query: the benchmark's dates in
/// `[actual_start, target_end]`
#[derive(Debug, Clone, PartialEq)]
pub struct TradingCalendar {
    actual_start: NaiveDate,
    dates: Vec<NaiveDate>,
}

impl TradingCalendar {
    /// Resolve the calendar from the benchmark history.
    ///
    /// The actual start is the benchmark's last date on or before
    /// `target_start` (or its inception if the request predates it).
    /// Returns `None` when no benchmark date falls inside the window.
    pub fn resolve(
        benchmark: &NavSeries,
        target_start: NaiveDate,
        target_end: NaiveDate,
    ) -> Option<Self> {
        let actual_start = benchmark.purchase_nav(target_start)?.date;
        let dates = benchmark.dates_between(actual_start, target_end);
        if dates.is_empty() {
            return None;
        }
        Some(Self {
            actual_start,
            dates,
        })
    }

    pub fn from_dates(actual_start: NaiveDate, dates: Vec<NaiveDate>) -> Self {
        Self {
            actual_start,
            dates,
        }
    }

    pub fn actual_start(&self) -> NaiveDate {
        self.actual_start
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Per-run position in one fund
#[derive(Debug, Clone)]
struct Holding<'a> {
    fund_id: FundId,
    weight: f64,
    units: f64,
    series: &'a NavSeries,
}

impl Holding<'_> {
    fn snapshot(&self) -> HoldingSnapshot {
        HoldingSnapshot {
            fund_id: self.fund_id.clone(),
            weight: self.weight,
            units: self.units,
        }
    }
}

/// A date the portfolio could be valued on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValuedDate {
    pub date: NaiveDate,
    pub value: f64,
    /// Cumulative amount invested as of this date
    pub invested: f64,
}

/// Raw output of one simulation run
#[derive(Debug, Clone, Default)]
pub struct Simulation {
    pub points: Vec<ValuedDate>,
    pub holdings: Vec<HoldingSnapshot>,
    /// Contribution outflows (SIP only), in date order
    pub contributions: Vec<CashFlow>,
    pub total_invested: f64,
}

impl Simulation {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&ValuedDate> {
        self.points.last()
    }
}

/// Runs basket simulations against one trading calendar
pub struct Simulator<'a, P: NavProvider + ?Sized> {
    provider: &'a P,
    calendar: &'a TradingCalendar,
}

impl<'a, P: NavProvider + ?Sized> Simulator<'a, P> {
    pub fn new(provider: &'a P, calendar: &'a TradingCalendar) -> Self {
        Self { provider, calendar }
    }

    pub fn calendar(&self) -> &TradingCalendar {
        self.calendar
    }

    /// Empty holdings for every weighted fund, or `None` if any lacks history
    fn holdings(&self, basket: &Basket) -> Option<Vec<Holding<'a>>> {
        basket
            .weighted_funds()
            .map(|(fund_id, weight)| {
                let series = self.provider.series(fund_id);
                if series.is_none() {
                    debug!("Basket '{}': no NAV history for fund {}", basket.name, fund_id);
                }
                Some(Holding {
                    fund_id: fund_id.clone(),
                    weight,
                    units: 0.0,
                    series: series?,
                })
            })
            .collect()
    }

    /// First date every weighted fund has history for: the later of the
    /// calendar start and the latest fund inception.
    pub fn effective_start(&self, basket: &Basket) -> Option<NaiveDate> {
        let mut start = self.calendar.actual_start;
        for (fund_id, _) in basket.weighted_funds() {
            let inception = self.provider.series(fund_id)?.inception()?;
            start = start.max(inception);
        }
        Some(start)
    }

    /// Single purchase priced on or before `purchase_date`, valued on every
    /// calendar date from `from` onwards.
    pub fn lumpsum(
        &self,
        basket: &Basket,
        amount: f64,
        purchase_date: NaiveDate,
        from: NaiveDate,
    ) -> Option<Simulation> {
        let mut holdings = self.holdings(basket)?;
        for holding in &mut holdings {
            let Some(purchase) = holding.series.purchase_nav(purchase_date) else {
                debug!(
                    "Basket '{}': no purchase NAV for fund {}",
                    basket.name, holding.fund_id
                );
                return None;
            };
            holding.units = (amount * holding.weight / 100.0) / purchase.nav;
        }

        let points = self
            .calendar
            .dates
            .iter()
            .filter(|date| **date >= from)
            .filter_map(|&date| {
                value_on(&holdings, date).map(|value| ValuedDate {
                    date,
                    value,
                    invested: amount,
                })
            })
            .collect();

        Some(Simulation {
            points,
            holdings: holdings.iter().map(Holding::snapshot).collect(),
            contributions: Vec::new(),
            total_invested: amount,
        })
    }

    /// Monthly contributions of `amount`, the Nth due on `anchor + N months`.
    ///
    /// Calendar dates before `from` are ignored. On each remaining date at or
    /// past the next due date one contribution is made, so contributions that
    /// fell due before `from` (or inside a calendar gap) are caught up one per
    /// trading date. A date is only emitted once something has been invested.
    pub fn periodic(
        &self,
        basket: &Basket,
        amount: f64,
        anchor: NaiveDate,
        from: NaiveDate,
    ) -> Option<Simulation> {
        let mut holdings = self.holdings(basket)?;
        let mut contributions = Vec::new();
        let mut total_invested = 0.0;
        let mut next_due = anchor;
        let mut count: u32 = 0;
        let mut points = Vec::new();

        for &date in self.calendar.dates.iter().filter(|d| **d >= from) {
            if date >= next_due {
                for holding in &mut holdings {
                    if let Some(nav) = holding.series.valuation_nav(date) {
                        holding.units += (amount * holding.weight / 100.0) / nav;
                    }
                }
                contributions.push(CashFlow::new(date, -amount));
                total_invested += amount;
                count += 1;
                next_due = anchor
                    .checked_add_months(Months::new(count))
                    .unwrap_or(NaiveDate::MAX);
            }

            if total_invested <= 0.0 {
                continue;
            }
            if let Some(value) = value_on(&holdings, date) {
                points.push(ValuedDate {
                    date,
                    value,
                    invested: total_invested,
                });
            }
        }

        Some(Simulation {
            points,
            holdings: holdings.iter().map(Holding::snapshot).collect(),
            contributions,
            total_invested,
        })
    }
}

/// Portfolio value on `date`, or `None` if a fund with units has no price yet.
/// Funds with no units are skipped: they cannot affect the value.
fn value_on(holdings: &[Holding<'_>], date: NaiveDate) -> Option<f64> {
    let mut total = 0.0;
    for holding in holdings {
        match holding.series.valuation_nav(date) {
            Some(nav) => total += holding.units * nav,
            None if holding.units == 0.0 => {}
            None => return None,
        }
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::NavStore;
    use crate::NavObservation;
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn daily(start: NaiveDate, navs: &[f64]) -> NavSeries {
        NavSeries::new(
            navs.iter()
                .enumerate()
                .map(|(i, nav)| NavObservation::new(start + Duration::days(i as i64), *nav))
                .collect(),
        )
        .unwrap()
    }

    fn basket(weights: &[(&str, f64)]) -> Basket {
        Basket::new(
            1,
            "Test",
            weights.iter().map(|(id, w)| (FundId::new(id), *w)).collect(),
        )
    }

    #[test]
    fn test_calendar_resolution() {
        let bench = daily(d(2024, 1, 1), &[100.0; 10]);
        let cal = TradingCalendar::resolve(&bench, d(2024, 1, 4), d(2024, 1, 6)).unwrap();
        assert_eq!(cal.actual_start(), d(2024, 1, 4));
        assert_eq!(cal.dates().len(), 3);

        // Request before inception starts at inception
        let cal = TradingCalendar::resolve(&bench, d(2023, 6, 1), d(2024, 1, 2)).unwrap();
        assert_eq!(cal.actual_start(), d(2024, 1, 1));
        assert_eq!(cal.dates().len(), 2);

        // Window entirely before the data
        assert!(TradingCalendar::resolve(&bench, d(2023, 1, 1), d(2023, 2, 1)).is_none());
    }

    #[test]
    fn test_lumpsum_units_fixed() {
        let store: NavStore = vec![
            (FundId::new("a"), daily(d(2024, 1, 1), &[10.0, 11.0, 12.0])),
            (FundId::new("b"), daily(d(2024, 1, 1), &[50.0, 50.0, 40.0])),
        ]
        .into_iter()
        .collect();
        let cal = TradingCalendar::from_dates(
            d(2024, 1, 1),
            vec![d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 3)],
        );
        let sim = Simulator::new(&store, &cal)
            .lumpsum(&basket(&[("a", 60.0), ("b", 40.0)]), 1000.0, d(2024, 1, 1), d(2024, 1, 1))
            .unwrap();

        assert_relative_eq!(sim.holdings[0].units, 60.0);
        assert_relative_eq!(sim.holdings[1].units, 8.0);
        let values: Vec<f64> = sim.points.iter().map(|p| p.value).collect();
        assert_relative_eq!(values[0], 1000.0);
        assert_relative_eq!(values[1], 60.0 * 11.0 + 8.0 * 50.0);
        assert_relative_eq!(values[2], 60.0 * 12.0 + 8.0 * 40.0);
    }

    #[test]
    fn test_missing_fund_invalidates_basket() {
        let store: NavStore = vec![(FundId::new("a"), daily(d(2024, 1, 1), &[10.0]))]
            .into_iter()
            .collect();
        let cal = TradingCalendar::from_dates(d(2024, 1, 1), vec![d(2024, 1, 1)]);
        let sim = Simulator::new(&store, &cal);
        let b = basket(&[("a", 50.0), ("missing", 50.0)]);
        assert!(sim.lumpsum(&b, 1000.0, d(2024, 1, 1), d(2024, 1, 1)).is_none());
        assert!(sim.periodic(&b, 1000.0, d(2024, 1, 1), d(2024, 1, 1)).is_none());
        assert!(sim.effective_start(&b).is_none());
    }

    #[test]
    fn test_lumpsum_drops_dates_before_fund_coverage() {
        // Fund b starts on day 2: purchase falls back to its inception price,
        // but days before it cannot be valued
        let store: NavStore = vec![
            (FundId::new("a"), daily(d(2024, 1, 1), &[10.0, 10.0, 10.0])),
            (FundId::new("b"), daily(d(2024, 1, 3), &[20.0])),
        ]
        .into_iter()
        .collect();
        let cal = TradingCalendar::from_dates(
            d(2024, 1, 1),
            vec![d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 3)],
        );
        let sim = Simulator::new(&store, &cal)
            .lumpsum(&basket(&[("a", 50.0), ("b", 50.0)]), 1000.0, d(2024, 1, 1), d(2024, 1, 1))
            .unwrap();
        assert_eq!(sim.points.len(), 1);
        assert_eq!(sim.points[0].date, d(2024, 1, 3));
        assert_relative_eq!(sim.points[0].value, 1000.0);
    }

    #[test]
    fn test_periodic_monthly_cadence() {
        let bench = daily(d(2024, 1, 1), &[100.0; 100]);
        let store: NavStore = vec![(FundId::new("a"), bench.clone())].into_iter().collect();
        let cal = TradingCalendar::resolve(&bench, d(2024, 1, 1), d(2024, 4, 9)).unwrap();
        let sim = Simulator::new(&store, &cal)
            .periodic(&basket(&[("a", 100.0)]), 5000.0, cal.actual_start(), cal.actual_start())
            .unwrap();

        let dates: Vec<NaiveDate> = sim.contributions.iter().map(|c| c.date).collect();
        assert_eq!(
            dates,
            vec![d(2024, 1, 1), d(2024, 2, 1), d(2024, 3, 1), d(2024, 4, 1)]
        );
        assert_relative_eq!(sim.total_invested, 20_000.0);
        assert_relative_eq!(sim.holdings[0].units, 200.0);
        assert_relative_eq!(sim.last().unwrap().value, 20_000.0);
    }

    #[test]
    fn test_periodic_contribution_rolls_to_next_trading_date() {
        // Feb 1 missing from the calendar: contribution lands on Feb 5
        let bench = NavSeries::new(vec![
            NavObservation::new(d(2024, 1, 1), 10.0),
            NavObservation::new(d(2024, 1, 31), 10.0),
            NavObservation::new(d(2024, 2, 5), 20.0),
            NavObservation::new(d(2024, 2, 6), 20.0),
        ])
        .unwrap();
        let store: NavStore = vec![(FundId::new("a"), bench.clone())].into_iter().collect();
        let cal = TradingCalendar::resolve(&bench, d(2024, 1, 1), d(2024, 2, 6)).unwrap();
        let sim = Simulator::new(&store, &cal)
            .periodic(&basket(&[("a", 100.0)]), 1000.0, cal.actual_start(), cal.actual_start())
            .unwrap();

        assert_eq!(sim.contributions.len(), 2);
        assert_eq!(sim.contributions[1].date, d(2024, 2, 5));
        assert_relative_eq!(sim.holdings[0].units, 100.0 + 50.0);
        assert_eq!(sim.points.len(), 4);
    }

    #[test]
    fn test_periodic_skips_unheld_fund_without_price() {
        // Fund b has no price at the first contribution, so nothing is bought
        // and its absence does not drop the date
        let store: NavStore = vec![
            (FundId::new("a"), daily(d(2024, 1, 1), &[10.0; 40])),
            (FundId::new("b"), daily(d(2024, 1, 20), &[5.0; 21])),
        ]
        .into_iter()
        .collect();
        let cal = TradingCalendar::from_dates(
            d(2024, 1, 1),
            (0..40).map(|i| d(2024, 1, 1) + Duration::days(i)).collect(),
        );
        let sim = Simulator::new(&store, &cal)
            .periodic(&basket(&[("a", 50.0), ("b", 50.0)]), 1000.0, d(2024, 1, 1), d(2024, 1, 1))
            .unwrap();

        assert_eq!(sim.points.len(), 40);
        assert_relative_eq!(sim.points[0].value, 500.0);
        assert_relative_eq!(sim.holdings[0].units, 100.0);
        assert_relative_eq!(sim.holdings[1].units, 100.0);
        assert_relative_eq!(sim.total_invested, 2000.0);
    }

    #[test]
    fn test_periodic_month_end_anchor_clamps() {
        // Each due date is anchor + N months, clamped to the month end
        let bench = daily(d(2024, 1, 31), &[10.0; 91]);
        let store: NavStore = vec![(FundId::new("a"), bench.clone())].into_iter().collect();
        let cal = TradingCalendar::resolve(&bench, d(2024, 1, 31), d(2024, 4, 30)).unwrap();
        let sim = Simulator::new(&store, &cal)
            .periodic(&basket(&[("a", 100.0)]), 1000.0, cal.actual_start(), cal.actual_start())
            .unwrap();

        let dates: Vec<NaiveDate> = sim.contributions.iter().map(|c| c.date).collect();
        assert_eq!(
            dates,
            vec![d(2024, 1, 31), d(2024, 2, 29), d(2024, 3, 31), d(2024, 4, 30)]
        );
    }

    #[test]
    fn test_periodic_catches_up_after_calendar_gap() {
        // Nothing trades in February or March: the missed contributions are
        // made one per trading date once the calendar resumes
        let dates = vec![
            d(2024, 1, 1),
            d(2024, 1, 2),
            d(2024, 4, 1),
            d(2024, 4, 2),
            d(2024, 4, 3),
            d(2024, 5, 1),
        ];
        let series = NavSeries::new(dates.iter().map(|&date| NavObservation::new(date, 10.0)).collect())
            .unwrap();
        let store: NavStore = vec![(FundId::new("a"), series)].into_iter().collect();
        let cal = TradingCalendar::from_dates(d(2024, 1, 1), dates);
        let sim = Simulator::new(&store, &cal)
            .periodic(&basket(&[("a", 100.0)]), 1000.0, d(2024, 1, 1), d(2024, 1, 1))
            .unwrap();

        let paid: Vec<NaiveDate> = sim.contributions.iter().map(|c| c.date).collect();
        assert_eq!(
            paid,
            vec![d(2024, 1, 1), d(2024, 4, 1), d(2024, 4, 2), d(2024, 4, 3), d(2024, 5, 1)]
        );
        assert_relative_eq!(sim.total_invested, 5000.0);
        assert_relative_eq!(sim.holdings[0].units, 500.0);
    }

    #[test]
    fn test_periodic_schedule_anchor_before_first_date() {
        // Schedule anchored on Jan 1 but valuation starts Mar 15: the Jan, Feb
        // and Mar contributions are caught up on Mar 15, 16 and 17
        let bench = daily(d(2024, 1, 1), &[10.0; 120]);
        let store: NavStore = vec![(FundId::new("a"), bench.clone())].into_iter().collect();
        let cal = TradingCalendar::resolve(&bench, d(2024, 1, 1), d(2024, 4, 29)).unwrap();
        let sim = Simulator::new(&store, &cal)
            .periodic(&basket(&[("a", 100.0)]), 1000.0, d(2024, 1, 1), d(2024, 3, 15))
            .unwrap();

        let paid: Vec<NaiveDate> = sim.contributions.iter().map(|c| c.date).collect();
        assert_eq!(
            paid,
            vec![d(2024, 3, 15), d(2024, 3, 16), d(2024, 3, 17), d(2024, 4, 1)]
        );
        assert_eq!(sim.points.first().map(|p| p.date), Some(d(2024, 3, 15)));
    }

    #[test]
    fn test_effective_start_shifts_to_latest_inception() {
        let store: NavStore = vec![
            (FundId::new("a"), daily(d(2024, 1, 1), &[10.0; 10])),
            (FundId::new("b"), daily(d(2024, 1, 5), &[10.0; 5])),
        ]
        .into_iter()
        .collect();
        let cal = TradingCalendar::from_dates(d(2024, 1, 2), vec![d(2024, 1, 2)]);
        let sim = Simulator::new(&store, &cal);
        assert_eq!(sim.effective_start(&basket(&[("a", 100.0)])), Some(d(2024, 1, 2)));
        assert_eq!(
            sim.effective_start(&basket(&[("a", 50.0), ("b", 50.0)])),
            Some(d(2024, 1, 5))
        );
    }
}
