//! Serialised, persisted access to the master model.
//!
//! The registry owns the only mutable copy of the model. Every mutation takes
//! the lock, updates the model and saves it before releasing, so writes
//! never interleave and the store always lags memory by at most one failed
//! save.

use std::sync::{Mutex, MutexGuard};

use super::error::ZkquantError;
use super::master_model::{MasterModel, StrategyEntry};
use crate::ports::model_store_port::ModelStore;

/// Result of a uniqueness-checked insert.
#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added(MasterModel),
    Duplicate,
}

pub struct ModelRegistry {
    model: Mutex<MasterModel>,
    store: Box<dyn ModelStore>,
}

impl ModelRegistry {
    /// Load the persisted model, falling back to an empty one if it cannot be read.
    pub fn open(store: Box<dyn ModelStore>) -> Self {
        let model = match store.load() {
            Ok(Some(model)) => {
                tracing::info!(strategies = model.len(), "master model loaded");
                model
            }
            Ok(None) => {
                tracing::info!("no persisted master model, starting empty");
                MasterModel::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load master model, starting empty");
                MasterModel::new()
            }
        };
        Self::with_model(model, store)
    }

    pub fn with_model(model: MasterModel, store: Box<dyn ModelStore>) -> Self {
        ModelRegistry {
            model: Mutex::new(model),
            store,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MasterModel>, ZkquantError> {
        self.model.lock().map_err(|_| ZkquantError::StatePoisoned)
    }

    /// A copy of the current in-memory model.
    pub fn snapshot(&self) -> Result<MasterModel, ZkquantError> {
        Ok(self.lock()?.clone())
    }

    pub fn contains_code(&self, code: &str) -> Result<bool, ZkquantError> {
        Ok(self.lock()?.contains_code(code))
    }

    /// Append `entry`, recompute, persist. On a save failure the in-memory
    /// model keeps the entry and the error is returned.
    pub fn add_strategy(&self, entry: StrategyEntry) -> Result<MasterModel, ZkquantError> {
        let mut model = self.lock()?;
        model.add_strategy(entry);
        tracing::info!(strategies = model.len(), "strategy added to master model");
        self.store.save(&model)?;
        Ok(model.clone())
    }

    /// Like [`add_strategy`](Self::add_strategy) but refuses code already present.
    /// The check and the insert happen under one lock.
    pub fn add_unique(&self, entry: StrategyEntry) -> Result<AddOutcome, ZkquantError> {
        let mut model = self.lock()?;
        if model.contains_code(&entry.code) {
            return Ok(AddOutcome::Duplicate);
        }
        model.add_strategy(entry);
        tracing::info!(strategies = model.len(), "strategy added to master model");
        self.store.save(&model)?;
        Ok(AddOutcome::Added(model.clone()))
    }

    pub fn clear(&self) -> Result<(), ZkquantError> {
        let mut model = self.lock()?;
        let removed = model.len();
        model.clear();
        tracing::info!(removed, "master model cleared");
        self.store.save(&model)
    }

    /// Persist the current in-memory model, e.g. after a failed save.
    pub fn flush(&self) -> Result<(), ZkquantError> {
        let model = self.lock()?;
        self.store.save(&model)
    }
}
