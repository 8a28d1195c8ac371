//! Performance metrics over a pooled trade list.
//!
//! All inputs are per-trade percent returns. Compounding starts from a
//! portfolio of 100.

use serde::{Deserialize, Serialize};

use super::position::Trade;

pub const PROFIT_FACTOR_CAP: f64 = 10.0;

const START_VALUE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub sharpe_ratio: f64,
    /// Percent, never negative.
    pub max_drawdown: f64,
    /// Percent.
    pub total_return: f64,
    pub profit_factor: f64,
    pub number_of_trades: usize,
}

impl EvaluationResult {
    pub fn compute(trades: &[Trade]) -> Self {
        let returns: Vec<f64> = trades.iter().map(|t| t.profit).collect();
        EvaluationResult {
            sharpe_ratio: sharpe_ratio(&returns),
            max_drawdown: max_drawdown(&returns),
            total_return: total_return(&returns),
            profit_factor: profit_factor(&returns),
            number_of_trades: trades.len(),
        }
    }
}

/// mean / population stddev. Zero when undefined.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    if stddev == 0.0 { 0.0 } else { mean / stddev }
}

/// Largest peak-to-trough decline of the compounded curve, in percent.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut value = START_VALUE;
    let mut peak = START_VALUE;
    let mut max_dd = 0.0_f64;

    for r in returns {
        value *= 1.0 + r / 100.0;
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - value) / peak * 100.0);
        }
    }

    max_dd
}

/// Compounded return of the whole sequence, in percent.
pub fn total_return(returns: &[f64]) -> f64 {
    let final_value = returns
        .iter()
        .fold(START_VALUE, |value, r| value * (1.0 + r / 100.0));
    final_value - START_VALUE
}

/// Gross profit over gross loss, capped at [`PROFIT_FACTOR_CAP`].
///
/// With no losses the factor is 1 if anything was won and 0 otherwise.
pub fn profit_factor(returns: &[f64]) -> f64 {
    let gross_profit: f64 = returns.iter().filter(|r| **r > 0.0).map(|r| r.abs()).sum();
    let gross_loss: f64 = returns.iter().filter(|r| **r < 0.0).map(|r| r.abs()).sum();

    if gross_loss == 0.0 {
        return if gross_profit > 0.0 { 1.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(PROFIT_FACTOR_CAP)
}
