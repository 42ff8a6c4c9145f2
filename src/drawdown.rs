//! Incremental drawdown tracking
//!
//! Fed one valued date at a time by the simulator. Tracks the running peak,
//! the deepest drawdown, and the length in days of each drawdown run (from the
//! first date below the peak until the date drawdown is back to zero).

use chrono::NaiveDate;

/// Round a percentage to 2 decimals
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Default)]
pub struct DrawdownTracker {
    peak: f64,
    max_drawdown: f64,
    /// Start date of the run currently open, if any
    run_start: Option<NaiveDate>,
    /// Durations (days) of closed, non-empty runs
    runs: Vec<i64>,
    last_date: Option<NaiveDate>,
}

/// Final drawdown statistics for a series
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DrawdownSummary {
    pub max_drawdown_pct: f64,
    pub avg_run_days: f64,
    pub max_run_days: i64,
}

impl DrawdownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the value for `date` and return its drawdown percentage (<= 0)
    pub fn update(&mut self, date: NaiveDate, value: f64) -> f64 {
        if value > self.peak {
            self.peak = value;
        }

        let drawdown = if self.peak > 0.0 {
            round2((value - self.peak) / self.peak * 100.0)
        } else {
            0.0
        };
        if drawdown < self.max_drawdown {
            self.max_drawdown = drawdown;
        }

        match self.run_start {
            None if drawdown < 0.0 => self.run_start = Some(date),
            Some(start) if drawdown == 0.0 => {
                self.close_run(start, date);
                self.run_start = None;
            }
            _ => {}
        }

        self.last_date = Some(date);
        drawdown
    }

    fn close_run(&mut self, start: NaiveDate, end: NaiveDate) {
        let days = (end - start).num_days();
        if days > 0 {
            self.runs.push(days);
        }
    }

    pub fn peak(&self) -> f64 {
        self.peak
    }

    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    /// Close any open run at the last seen date and summarise
    pub fn finish(mut self) -> DrawdownSummary {
        if let (Some(start), Some(last)) = (self.run_start.take(), self.last_date) {
            self.close_run(start, last);
        }

        let avg_run_days = if self.runs.is_empty() {
            0.0
        } else {
            self.runs.iter().sum::<i64>() as f64 / self.runs.len() as f64
        };

        DrawdownSummary {
            max_drawdown_pct: self.max_drawdown,
            avg_run_days,
            max_run_days: self.runs.iter().copied().max().unwrap_or(0),
        }
    }
}
