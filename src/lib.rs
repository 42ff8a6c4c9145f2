//! Basket Backtest
//!
//! Portfolio performance analytics for mutual fund baskets: lumpsum and SIP
//! simulation over a benchmark trading calendar, drawdown analysis, CAGR and
//! XIRR, and calendar-year rankings across baskets.

pub mod backtest;
pub mod config;
pub mod data;
pub mod drawdown;
pub mod nav;
pub mod period;
pub mod simulator;
pub mod types;
pub mod xirr;
pub mod yearly;

pub use backtest::{BasketPerformance, Backtester, SortDirection, SortKey};
pub use config::Config;
pub use nav::{NavProvider, NavSeries, NavStore};
pub use period::{Period, Query};
pub use types::*;
pub use yearly::YearlyRankings;
