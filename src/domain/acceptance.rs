//! Acceptance gate applied to an evaluation before it may join the model.

use std::fmt;

use super::metrics::EvaluationResult;

#[derive(Debug, Clone, PartialEq)]
pub struct AcceptanceThresholds {
    pub min_sharpe: f64,
    pub max_drawdown: f64,
    pub min_total_return: f64,
    pub min_profit_factor: f64,
    pub min_trades: usize,
}

impl Default for AcceptanceThresholds {
    fn default() -> Self {
        AcceptanceThresholds {
            min_sharpe: 0.5,
            max_drawdown: 20.0,
            min_total_return: 5.0,
            min_profit_factor: 1.3,
            min_trades: 30,
        }
    }
}

/// One threshold an evaluation missed.
#[derive(Debug, Clone, PartialEq)]
pub enum GateFailure {
    Sharpe { actual: f64, minimum: f64 },
    Drawdown { actual: f64, maximum: f64 },
    TotalReturn { actual: f64, minimum: f64 },
    ProfitFactor { actual: f64, minimum: f64 },
    Trades { actual: usize, minimum: usize },
}

impl fmt::Display for GateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateFailure::Sharpe { actual, minimum } => {
                write!(f, "sharpe ratio {actual:.2} below {minimum:.2}")
            }
            GateFailure::Drawdown { actual, maximum } => {
                write!(f, "max drawdown {actual:.2}% above {maximum:.2}%")
            }
            GateFailure::TotalReturn { actual, minimum } => {
                write!(f, "total return {actual:.2}% below {minimum:.2}%")
            }
            GateFailure::ProfitFactor { actual, minimum } => {
                write!(f, "profit factor {actual:.2} below {minimum:.2}")
            }
            GateFailure::Trades { actual, minimum } => {
                write!(f, "{actual} trades, need {minimum}")
            }
        }
    }
}

impl AcceptanceThresholds {
    /// Every threshold `result` misses; empty means it passes.
    pub fn failures(&self, result: &EvaluationResult) -> Vec<GateFailure> {
        let mut failures = Vec::new();
        if result.sharpe_ratio < self.min_sharpe {
            failures.push(GateFailure::Sharpe {
                actual: result.sharpe_ratio,
                minimum: self.min_sharpe,
            });
        }
        if result.max_drawdown > self.max_drawdown {
            failures.push(GateFailure::Drawdown {
                actual: result.max_drawdown,
                maximum: self.max_drawdown,
            });
        }
        if result.total_return < self.min_total_return {
            failures.push(GateFailure::TotalReturn {
                actual: result.total_return,
                minimum: self.min_total_return,
            });
        }
        if result.profit_factor < self.min_profit_factor {
            failures.push(GateFailure::ProfitFactor {
                actual: result.profit_factor,
                minimum: self.min_profit_factor,
            });
        }
        if result.number_of_trades < self.min_trades {
            failures.push(GateFailure::Trades {
                actual: result.number_of_trades,
                minimum: self.min_trades,
            });
        }
        failures
    }

    pub fn passes(&self, result: &EvaluationResult) -> bool {
        self.failures(result).is_empty()
    }
}
