//! Core data types shared by the simulator, the stats layer and the CLI

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Tolerance applied when checking that basket weights sum to 100
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.1;

/// Fund identifier (scheme code) using Arc<str> for cheap cloning
///
/// Fund ids are cloned into holdings, cash-flow reports and ranking rows
/// for every basket in a query, so clones must not allocate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FundId(#[serde(with = "arc_str_serde")] std::sync::Arc<str>);

/// Custom serde for Arc<str>
mod arc_str_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S>(value: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Arc::from(s.as_str()))
    }
}

impl FundId {
    pub fn new(s: impl AsRef<str>) -> Self {
        FundId(std::sync::Arc::from(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FundId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FundId {
    fn from(value: &str) -> Self {
        FundId::new(value)
    }
}

/// A single NAV print for one fund
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavObservation {
    pub date: NaiveDate,
    pub nav: f64,
}

impl NavObservation {
    pub fn new(date: NaiveDate, nav: f64) -> Self {
        Self { date, nav }
    }
}

/// Investment style for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvestmentMode {
    /// Single upfront purchase held unchanged
    Lumpsum,
    /// Fixed monthly contribution (SIP)
    #[serde(alias = "sip")]
    Periodic,
}

impl InvestmentMode {
    /// Default contribution amount for the mode
    pub fn default_amount(self) -> f64 {
        match self {
            InvestmentMode::Lumpsum => 100_000.0,
            InvestmentMode::Periodic => 5_000.0,
        }
    }
}

impl std::str::FromStr for InvestmentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lumpsum" => Ok(InvestmentMode::Lumpsum),
            "periodic" | "sip" => Ok(InvestmentMode::Periodic),
            other => Err(format!(
                "unknown investment mode '{}', expected lumpsum or periodic",
                other
            )),
        }
    }
}

impl std::fmt::Display for InvestmentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvestmentMode::Lumpsum => write!(f, "lumpsum"),
            InvestmentMode::Periodic => write!(f, "periodic"),
        }
    }
}

// ============================================================================
// Baskets
// ============================================================================

/// Fund id -> weight (0-100). Ordered so simulation output is deterministic.
pub type Allocation = BTreeMap<FundId, f64>;

/// Validation errors for basket definitions
#[derive(Debug, Error, PartialEq)]
pub enum BasketValidationError {
    #[error("basket '{basket}': weight {weight} for fund {fund} must be within 0..=100")]
    WeightOutOfRange {
        basket: String,
        fund: FundId,
        weight: f64,
    },

    #[error("basket '{0}' has no fund with a non-zero weight")]
    EmptyAllocation(String),

    #[error("basket '{basket}': weights sum to {sum:.2}, expected 100")]
    WeightSum { basket: String, sum: f64 },
}

/// A named set of fund weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Basket {
    pub id: u32,
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Display colour, opaque to the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub allocation: Allocation,
}

fn default_active() -> bool {
    true
}

impl Basket {
    pub fn new(id: u32, name: impl Into<String>, allocation: Allocation) -> Self {
        Self {
            id,
            name: name.into(),
            active: true,
            color: None,
            allocation,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Funds the engine actually holds (zero weights are ignored)
    pub fn weighted_funds(&self) -> impl Iterator<Item = (&FundId, f64)> {
        self.allocation
            .iter()
            .filter(|(_, w)| **w != 0.0)
            .map(|(id, w)| (id, *w))
    }

    /// Check the allocation contract the engine relies on
    pub fn validate(&self) -> Result<(), BasketValidationError> {
        for (fund, weight) in &self.allocation {
            if !(0.0..=100.0).contains(weight) {
                return Err(BasketValidationError::WeightOutOfRange {
                    basket: self.name.clone(),
                    fund: fund.clone(),
                    weight: *weight,
                });
            }
        }

        if self.weighted_funds().next().is_none() {
            return Err(BasketValidationError::EmptyAllocation(self.name.clone()));
        }

        let sum: f64 = self.weighted_funds().map(|(_, w)| w).sum();
        if (sum - 100.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(BasketValidationError::WeightSum {
                basket: self.name.clone(),
                sum,
            });
        }

        Ok(())
    }
}

// ============================================================================
// Engine output
// ============================================================================

/// One valued date of a simulated portfolio
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
    /// Decline from the running peak, rounded to 2 decimals, always <= 0
    pub drawdown_pct: f64,
}

/// Dated signed amount. Negative = contribution, positive = valuation/withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CashFlow {
    pub date: NaiveDate,
    pub amount: f64,
}

impl CashFlow {
    pub fn new(date: NaiveDate, amount: f64) -> Self {
        Self { date, amount }
    }
}

/// Units held in one fund at the end of a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingSnapshot {
    pub fund_id: FundId,
    pub weight: f64,
    pub units: f64,
}

/// Summary statistics for one basket run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    /// Lumpsum amount, or total contributed in Periodic mode
    pub initial: f64,
    pub final_value: f64,
    pub abs_return_pct: f64,
    /// CAGR for Lumpsum, XIRR for Periodic
    pub annualized_pct: f64,
    pub max_drawdown_pct: f64,
    pub avg_drawdown_run_days: f64,
    pub max_drawdown_run_days: i64,
}

/// Full result for one basket under one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceResult {
    pub series: Vec<TimeSeriesPoint>,
    pub stats: PerformanceStats,
    pub holdings: Vec<HoldingSnapshot>,
    /// Contributions plus the closing valuation (Periodic mode only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cash_flows: Vec<CashFlow>,
}

/// One basket's outcome for a calendar year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyReturn {
    pub year: i32,
    pub return_pct: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_value: f64,
    pub end_value: f64,
    /// Cumulative contributions at year end (Periodic mode only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invested: Option<f64>,
}

/// One row of a year's ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedBasket {
    pub basket_id: u32,
    pub basket_name: String,
    pub return_pct: f64,
    pub start_value: f64,
    pub end_value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basket(weights: &[(&str, f64)]) -> Basket {
        let allocation = weights
            .iter()
            .map(|(id, w)| (FundId::new(id), *w))
            .collect();
        Basket::new(1, "Test", allocation)
    }

    #[test]
    fn test_valid_basket() {
        assert!(basket(&[("118741", 50.0), ("148726", 50.0)]).validate().is_ok());
        assert!(basket(&[("a", 33.0), ("b", 33.0), ("c", 34.0)]).validate().is_ok());
    }

    #[test]
    fn test_weight_sum_tolerance() {
        assert!(basket(&[("a", 50.05), ("b", 50.0)]).validate().is_ok());
        assert!(matches!(
            basket(&[("a", 50.0), ("b", 49.0)]).validate(),
            Err(BasketValidationError::WeightSum { .. })
        ));
    }

    #[test]
    fn test_zero_weights_ignored() {
        let b = basket(&[("a", 100.0), ("b", 0.0)]);
        assert!(b.validate().is_ok());
        let funds: Vec<_> = b.weighted_funds().map(|(id, _)| id.as_str()).collect();
        assert_eq!(funds, vec!["a"]);
    }

    #[test]
    fn test_out_of_range_weight() {
        assert!(matches!(
            basket(&[("a", 120.0), ("b", -20.0)]).validate(),
            Err(BasketValidationError::WeightOutOfRange { .. })
        ));
    }

    #[test]
    fn test_empty_allocation() {
        assert_eq!(
            basket(&[("a", 0.0)]).validate(),
            Err(BasketValidationError::EmptyAllocation("Test".to_string()))
        );
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("lumpsum".parse::<InvestmentMode>(), Ok(InvestmentMode::Lumpsum));
        assert_eq!("SIP".parse::<InvestmentMode>(), Ok(InvestmentMode::Periodic));
        assert!("weekly".parse::<InvestmentMode>().is_err());
    }

    #[test]
    fn test_fund_id_serde() {
        let id = FundId::new("118741");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"118741\"");
        let parsed: FundId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_basket_deserialize_sip_alias() {
        let mode: InvestmentMode = serde_json::from_str("\"sip\"").unwrap();
        assert_eq!(mode, InvestmentMode::Periodic);

        let b: Basket = serde_json::from_str(
            r#"{"id": 2, "name": "Mix", "allocation": {"118741": 50, "148726": 50}}"#,
        )
        .unwrap();
        assert!(b.active);
        assert_eq!(b.allocation.len(), 2);
    }
}
