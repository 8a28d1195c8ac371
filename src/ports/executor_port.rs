//! Strategy execution port.

use crate::domain::error::ExecutionFailure;
use crate::domain::market::MarketSeries;
use crate::domain::signal::StepOutcome;

/// One sandboxed run: evaluate `source` against every prefix of `series`.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionRequest<'a> {
    pub source: &'a str,
    pub series: &'a MarketSeries,
    /// Indices below this are never evaluated.
    pub warmup: usize,
}

/// Capability to run untrusted strategy code.
///
/// Implementations must return exactly one outcome per series point, keep no
/// state between calls, and report a failure of the whole run as an
/// [`ExecutionFailure`] rather than as per-step errors.
pub trait StrategyExecutor: Send + Sync {
    fn execute(&self, request: ExecutionRequest<'_>) -> Result<Vec<StepOutcome>, ExecutionFailure>;
}
