//! Strategy evaluation across several synthetic datasets.
//!
//! Each trial generates a series, runs the strategy over it in the sandbox
//! and simulates the resulting signals. Trials are independent and may run
//! in parallel; their trades are pooled in trial order so the metrics are
//! reproducible for identical inputs.

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;

use super::error::ZkquantError;
use super::market;
use super::metrics::EvaluationResult;
use super::position::Trade;
use super::runner::{self, WARMUP};
use super::simulation::{self, SimulationConfig};
use crate::ports::executor_port::StrategyExecutor;

/// Offset between consecutive trial seeds in [`SeedMode::Distinct`].
const SEED_STRIDE: u64 = 7919;

/// How trial seeds are derived from the base seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedMode {
    /// Trial `i` uses `base_seed + i * 7919`.
    Distinct,
    /// Every trial uses `base_seed`, so all trials see the same series.
    Fixed,
}

impl FromStr for SeedMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "distinct" => Ok(SeedMode::Distinct),
            "fixed" => Ok(SeedMode::Fixed),
            other => Err(format!("unknown seed mode '{other}' (expected distinct or fixed)")),
        }
    }
}

impl fmt::Display for SeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedMode::Distinct => write!(f, "distinct"),
            SeedMode::Fixed => write!(f, "fixed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatorConfig {
    pub datasets: usize,
    pub dataset_length: usize,
    pub warmup: usize,
    pub min_trades: usize,
    pub base_seed: u64,
    pub seed_mode: SeedMode,
    pub parallel: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig {
            datasets: 5,
            dataset_length: 1000,
            warmup: WARMUP,
            min_trades: 30,
            base_seed: 12345,
            seed_mode: SeedMode::Distinct,
            parallel: true,
        }
    }
}

impl EvaluatorConfig {
    pub fn trial_seed(&self, trial: usize) -> u64 {
        match self.seed_mode {
            SeedMode::Distinct => self
                .base_seed
                .wrapping_add((trial as u64).wrapping_mul(SEED_STRIDE)),
            SeedMode::Fixed => self.base_seed,
        }
    }
}

pub struct Evaluator<'a> {
    executor: &'a dyn StrategyExecutor,
    config: EvaluatorConfig,
    simulation: SimulationConfig,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        executor: &'a dyn StrategyExecutor,
        config: EvaluatorConfig,
        simulation: SimulationConfig,
    ) -> Self {
        Evaluator {
            executor,
            config,
            simulation,
        }
    }

    /// Generate, execute and simulate one dataset.
    pub fn run_trial(&self, code: &str, trial: usize) -> Result<Vec<Trade>, ZkquantError> {
        let seed = self.config.trial_seed(trial);
        tracing::debug!(trial, seed, "starting trial");

        let series = market::generate(seed, self.config.dataset_length)?;
        let signals = runner::run_strategy(self.executor, code, &series, self.config.warmup)?;
        let trades = simulation::simulate(&signals, &series, &self.simulation);

        tracing::debug!(trial, trades = trades.len(), "trial finished");
        Ok(trades)
    }

    /// Trades from every trial, concatenated in trial order.
    pub fn pooled_trades(&self, code: &str) -> Result<Vec<Trade>, ZkquantError> {
        let per_trial: Vec<Vec<Trade>> = if self.config.parallel {
            (0..self.config.datasets)
                .into_par_iter()
                .map(|trial| self.run_trial(code, trial))
                .collect::<Result<_, _>>()?
        } else {
            (0..self.config.datasets)
                .map(|trial| self.run_trial(code, trial))
                .collect::<Result<_, _>>()?
        };
        Ok(per_trial.into_iter().flatten().collect())
    }

    /// Evaluate `code`. Fails with `InsufficientTrades` before any metric is
    /// computed if the pooled trade count is below `min_trades`.
    pub fn evaluate(&self, code: &str) -> Result<EvaluationResult, ZkquantError> {
        tracing::info!(
            datasets = self.config.datasets,
            length = self.config.dataset_length,
            seed_mode = %self.config.seed_mode,
            "evaluating strategy"
        );

        let trades = self.pooled_trades(code)?;
        if trades.len() < self.config.min_trades {
            tracing::info!(trades = trades.len(), "not enough trades");
            return Err(ZkquantError::InsufficientTrades {
                trades: trades.len(),
                minimum: self.config.min_trades,
            });
        }

        let result = EvaluationResult::compute(&trades);
        tracing::info!(
            trades = result.number_of_trades,
            sharpe = result.sharpe_ratio,
            drawdown = result.max_drawdown,
            total_return = result.total_return,
            profit_factor = result.profit_factor,
            "evaluation complete"
        );
        Ok(result)
    }
}
