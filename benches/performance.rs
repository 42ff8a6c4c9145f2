//! Performance benchmarks for basket-backtest
//!
//! Run with: `cargo bench`
//! View results: `open target/criterion/report/index.html`

use basket_backtest::xirr::xirr;
use basket_backtest::{
    Backtester, Basket, CashFlow, FundId, InvestmentMode, NavObservation, NavSeries, NavStore,
    Period, Query,
};
use chrono::{Duration, Months, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const FUNDS: [&str; 4] = ["118741", "148726", "140088", "143494"];

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2014, 1, 1).unwrap()
}

/// Ten years of daily NAVs per fund
fn build_store() -> NavStore {
    FUNDS
        .iter()
        .enumerate()
        .map(|(f, id)| {
            let observations = (0..3650)
                .map(|i| {
                    let nav = 10.0 + f as f64 + (i as f64 * 0.003) + ((i as f64) / (20.0 + f as f64)).sin();
                    NavObservation::new(start() + Duration::days(i), nav)
                })
                .collect();
            (FundId::new(id), NavSeries::new(observations).unwrap())
        })
        .collect()
}

fn build_baskets() -> Vec<Basket> {
    (0..FUNDS.len())
        .map(|n| {
            let weight = 100.0 / (n + 1) as f64;
            let allocation = FUNDS[..=n].iter().map(|id| (FundId::new(id), weight)).collect();
            Basket::new(n as u32 + 1, format!("Basket {}", n + 1), allocation)
        })
        .collect()
}

fn benchmark_backtest(c: &mut Criterion) {
    let store = build_store();
    let baskets = build_baskets();
    let backtester = Backtester::new(&store, FundId::new(FUNDS[0]));
    let as_of = start() + Duration::days(3649);

    let lumpsum = Query::new(Period::years(10), InvestmentMode::Lumpsum, 100_000.0, as_of).unwrap();
    let sip = Query::new(Period::years(10), InvestmentMode::Periodic, 5_000.0, as_of).unwrap();

    c.bench_function("lumpsum_10y_4_baskets", |b| {
        b.iter(|| black_box(backtester.run_all(&baskets, &lumpsum)))
    });
    c.bench_function("sip_10y_4_baskets", |b| {
        b.iter(|| black_box(backtester.run_all(&baskets, &sip)))
    });
    c.bench_function("yearly_rankings_10y", |b| {
        b.iter(|| black_box(backtester.yearly_rankings(&baskets, &lumpsum)))
    });
}

fn benchmark_xirr(c: &mut Criterion) {
    let mut flows: Vec<CashFlow> = (0..120)
        .map(|n| CashFlow::new(start() + Months::new(n), -5_000.0))
        .collect();
    flows.push(CashFlow::new(start() + Months::new(120), 1_050_000.0));

    c.bench_function("xirr_120_flows", |b| b.iter(|| black_box(xirr(&flows))));
}

criterion_group!(benches, benchmark_backtest, benchmark_xirr);
criterion_main!(benches);
