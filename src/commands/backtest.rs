//! Backtest command implementation

use anyhow::Result;
use basket_backtest::backtest::sort_performances;
use basket_backtest::{Backtester, BasketPerformance, InvestmentMode, Query, SortDirection, SortKey};
use serde::Serialize;
use tracing::{debug, info};

use super::QueryArgs;

#[derive(Serialize)]
struct Report<'a> {
    query: &'a Query,
    benchmark: &'a str,
    results: &'a [BasketPerformance],
}

pub fn run(args: QueryArgs, sort_by: Option<String>, ascending: bool) -> Result<()> {
    info!("Starting backtest");

    let session = args.load()?;
    let query = session.query;
    let backtester = Backtester::new(&session.store, session.config.benchmark.clone());
    info!("Benchmark calendar: fund {}", backtester.benchmark());

    info!("Running {} baskets...", session.baskets.len());
    let mut results = backtester.run_all(&session.baskets, &query);

    let skipped = session.baskets.len() - results.len();
    if skipped > 0 {
        info!("{} baskets skipped for missing NAV coverage", skipped);
    }

    if let Some(key) = sort_by {
        let key: SortKey = key.parse().map_err(anyhow::Error::msg)?;
        let direction = if ascending {
            SortDirection::Ascending
        } else {
            SortDirection::Descending
        };
        debug!("Sorting by {:?} {:?}", key, direction);
        sort_performances(&mut results, key, direction);
    }

    if args.json {
        let report = Report {
            query: &query,
            benchmark: backtester.benchmark().as_str(),
            results: &results,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let annualized = match query.mode {
        InvestmentMode::Lumpsum => "CAGR",
        InvestmentMode::Periodic => "XIRR",
    };
    let width = 108;

    // Print results
    println!("\n{}", "=".repeat(width));
    println!(
        "BACKTEST RESULTS: {} {} of ₹{:.2} as of {}",
        query.period, query.mode, query.amount, query.as_of
    );
    println!("{}", "=".repeat(width));

    if results.is_empty() {
        println!("No basket has NAV data for the selected period.");
        println!("{}", "=".repeat(width));
        return Ok(());
    }

    println!(
        "{:<36} {:>14} {:>14} {:>10} {:>8} {:>9} {:>7} {:>7}",
        "Basket", "Invested", "Final Value", "Return", annualized, "Max DD", "Avg DD", "Max DD"
    );
    println!(
        "{:<36} {:>14} {:>14} {:>10} {:>8} {:>9} {:>7} {:>7}",
        "", "", "", "", "", "", "days", "days"
    );
    println!("{}", "-".repeat(width));

    for r in &results {
        let s = &r.result.stats;
        let name: String = r.basket_name.chars().take(36).collect();
        println!(
            "{:<36} {:>14.2} {:>14.2} {:>9.2}% {:>7.2}% {:>8.2}% {:>7.0} {:>7}",
            name,
            s.initial,
            s.final_value,
            s.abs_return_pct,
            s.annualized_pct,
            s.max_drawdown_pct,
            s.avg_drawdown_run_days,
            s.max_drawdown_run_days
        );

        for holding in &r.result.holdings {
            let fund = session
                .config
                .fund_name(&holding.fund_id)
                .unwrap_or(holding.fund_id.as_str());
            debug!(
                "  {} [{:.2}%]: {:.4} units",
                fund, holding.weight, holding.units
            );
        }
    }
    println!("{}", "=".repeat(width));

    info!("Backtest completed successfully");

    Ok(())
}
