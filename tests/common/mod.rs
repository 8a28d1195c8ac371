#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use zkquant::domain::error::{ExecutionFailure, ZkquantError};
use zkquant::domain::master_model::{MasterModel, StrategyEntry};
use zkquant::domain::metrics::EvaluationResult;
use zkquant::domain::signal::{Signal, StepOutcome};
use zkquant::ports::executor_port::{ExecutionRequest, StrategyExecutor};
use zkquant::ports::model_store_port::ModelStore;

/// In-process stand-in for the sandbox. The "source" is ignored; each
/// point's outcome comes from `script(index, prices_so_far)`.
pub struct ScriptedExecutor {
    script: Box<dyn Fn(usize, &[f64]) -> StepOutcome + Send + Sync>,
    pub calls: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new(script: impl Fn(usize, &[f64]) -> StepOutcome + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
        }
    }

    /// Alternates buy and sell every `gap` points after `from`.
    pub fn flipper(from: usize, gap: usize) -> Self {
        Self::new(move |i, _| {
            if i < from || (i - from) % gap != 0 {
                StepOutcome::NoSignal
            } else if ((i - from) / gap) % 2 == 0 {
                StepOutcome::Signal(Signal::Buy)
            } else {
                StepOutcome::Signal(Signal::Sell)
            }
        })
    }

    /// Buys on a rise and sells on a fall, checked every `gap` points.
    pub fn momentum(gap: usize) -> Self {
        Self::new(move |i, prices| {
            if i == 0 || i % gap != 0 {
                return StepOutcome::NoSignal;
            }
            if prices[i] > prices[i - 1] {
                StepOutcome::Signal(Signal::Buy)
            } else {
                StepOutcome::Signal(Signal::Sell)
            }
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl StrategyExecutor for ScriptedExecutor {
    fn execute(&self, request: ExecutionRequest<'_>) -> Result<Vec<StepOutcome>, ExecutionFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prices = request.series.prices();
        Ok((0..prices.len())
            .map(|i| (self.script)(i, &prices[..=i]))
            .collect())
    }
}

pub struct FailingExecutor(pub ExecutionFailure);

impl StrategyExecutor for FailingExecutor {
    fn execute(
        &self,
        _request: ExecutionRequest<'_>,
    ) -> Result<Vec<StepOutcome>, ExecutionFailure> {
        Err(self.0.clone())
    }
}

/// A `ModelStore` kept in memory, shareable with the test body.
#[derive(Default)]
pub struct MemoryStore {
    pub saved: Mutex<Option<MasterModel>>,
    pub saves: AtomicUsize,
    pub fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn saved_len(&self) -> Option<usize> {
        self.saved.lock().unwrap().as_ref().map(MasterModel::len)
    }
}

pub struct SharedStore(pub Arc<MemoryStore>);

impl ModelStore for SharedStore {
    fn load(&self) -> Result<Option<MasterModel>, ZkquantError> {
        Ok(self.0.saved.lock().unwrap().clone())
    }

    fn save(&self, model: &MasterModel) -> Result<(), ZkquantError> {
        if self.0.fail_saves.load(Ordering::SeqCst) {
            return Err(ZkquantError::Persistence {
                path: "memory".into(),
                reason: "write refused".into(),
            });
        }
        self.0.saves.fetch_add(1, Ordering::SeqCst);
        *self.0.saved.lock().unwrap() = Some(model.clone());
        Ok(())
    }
}

pub fn metrics(
    sharpe: f64,
    drawdown: f64,
    total_return: f64,
    profit_factor: f64,
) -> EvaluationResult {
    EvaluationResult {
        sharpe_ratio: sharpe,
        max_drawdown: drawdown,
        total_return,
        profit_factor,
        number_of_trades: 40,
    }
}

pub fn entry(code: &str, result: EvaluationResult) -> StrategyEntry {
    StrategyEntry::new(code, result)
}

pub fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
