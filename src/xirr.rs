//! Money-weighted return (XIRR)
//!
//! Newton-Raphson on the NPV of dated cash flows. This is a local root
//! finder: cash-flow patterns with no sign change have no root and the
//! result is whatever the clamped iteration ends on.

use crate::CashFlow;

const DAYS_PER_YEAR: f64 = 365.25;
const INITIAL_GUESS: f64 = 0.10;
const MAX_ITERATIONS: usize = 100;
const TOLERANCE: f64 = 1e-9;
const MIN_DERIVATIVE: f64 = 1e-10;
const MIN_RATE: f64 = -0.99;
const MAX_RATE: f64 = 10.0;

/// Annualized rate in percent for `flows`, ordered by date.
///
/// Returns 0 for fewer than two flows. Never fails: a vanishing derivative
/// or a non-converging iteration returns the last (clamped) rate.
pub fn xirr(flows: &[CashFlow]) -> f64 {
    let Some(first) = flows.first() else {
        return 0.0;
    };
    if flows.len() < 2 {
        return 0.0;
    }

    let t0 = first.date;
    let years: Vec<f64> = flows
        .iter()
        .map(|cf| (cf.date - t0).num_days() as f64 / DAYS_PER_YEAR)
        .collect();

    let mut rate = INITIAL_GUESS;

    for _ in 0..MAX_ITERATIONS {
        let mut npv = 0.0;
        let mut derivative = 0.0;

        for (cf, &t) in flows.iter().zip(&years) {
            let factor = (1.0 + rate).powf(t);
            npv += cf.amount / factor;
            derivative -= t * cf.amount / (factor * (1.0 + rate));
        }

        if derivative.abs() < MIN_DERIVATIVE {
            break;
        }

        let next = rate - npv / derivative;
        if (next - rate).abs() < TOLERANCE {
            return next * 100.0;
        }

        rate = next.clamp(MIN_RATE, MAX_RATE);
    }

    rate * 100.0
}
