//! Rank command implementation

use anyhow::Result;
use basket_backtest::{Backtester, InvestmentMode};
use tracing::info;

use super::QueryArgs;

pub fn run(args: QueryArgs) -> Result<()> {
    info!("Starting yearly ranking");

    let session = args.load()?;
    let backtester = Backtester::new(&session.store, session.config.benchmark.clone());
    info!("Benchmark calendar: fund {}", backtester.benchmark());
    let rankings = backtester.yearly_rankings(&session.baskets, &session.query);
    info!("Ranked baskets across {} calendar years", rankings.years().len());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rankings)?);
        return Ok(());
    }

    println!("{}", rankings.render());
    if session.query.mode == InvestmentMode::Periodic {
        println!("SIP returns are cumulative to each year end, measured against total invested.");
    }

    Ok(())
}
