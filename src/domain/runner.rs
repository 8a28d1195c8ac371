//! Turns a sandboxed execution into a clean signal sequence.

use super::error::ExecutionFailure;
use super::market::MarketSeries;
use super::signal::{Signal, StepOutcome};
use crate::ports::executor_port::{ExecutionRequest, StrategyExecutor};

pub const WARMUP: usize = 50;

/// Run `source` over `series` and return one signal per point.
///
/// Step errors are logged and become [`Signal::None`]; indices below `warmup`
/// are always `None` whatever the executor returned for them.
pub fn run_strategy(
    executor: &dyn StrategyExecutor,
    source: &str,
    series: &MarketSeries,
    warmup: usize,
) -> Result<Vec<Signal>, ExecutionFailure> {
    let outcomes = executor.execute(ExecutionRequest {
        source,
        series,
        warmup,
    })?;

    if outcomes.len() != series.len() {
        return Err(ExecutionFailure::LengthMismatch {
            expected: series.len(),
            actual: outcomes.len(),
        });
    }

    let mut step_errors = 0usize;
    let signals = outcomes
        .iter()
        .enumerate()
        .map(|(i, outcome)| {
            if i < warmup {
                return Signal::None;
            }
            if let StepOutcome::StepError(detail) = outcome {
                step_errors += 1;
                tracing::warn!(index = i, %detail, "strategy raised during step");
            }
            outcome.signal()
        })
        .collect();

    if step_errors > 0 {
        tracing::debug!(step_errors, "step errors folded into no-signal");
    }
    Ok(signals)
}
