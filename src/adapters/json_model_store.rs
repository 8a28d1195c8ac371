//! JSON file store for the master model.
//!
//! The whole document is rewritten on every save: it is serialised into a
//! temp file in the target directory and renamed over the old one.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use tempfile::NamedTempFile;

use crate::domain::error::ZkquantError;
use crate::domain::master_model::MasterModel;
use crate::ports::model_store_port::ModelStore;

pub const DEFAULT_MODEL_PATH: &str = "data/masterModel.json";

pub struct JsonModelStore {
    path: PathBuf,
}

impl JsonModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn error(&self, reason: impl ToString) -> ZkquantError {
        ZkquantError::Persistence {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl ModelStore for JsonModelStore {
    fn load(&self) -> Result<Option<MasterModel>, ZkquantError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.error(e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| self.error(format!("invalid model document: {e}")))
    }

    fn save(&self, model: &MasterModel) -> Result<(), ZkquantError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| self.error(e))?;

        let json = serde_json::to_string_pretty(model).map_err(|e| self.error(e))?;
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| self.error(e))?;
        tmp.write_all(json.as_bytes()).map_err(|e| self.error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.error(e))?;
        tmp.persist(&self.path).map_err(|e| self.error(e.error))?;

        tracing::debug!(path = %self.path.display(), strategies = model.len(), "model saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::master_model::StrategyEntry;
    use crate::domain::metrics::EvaluationResult;

    fn sample_model() -> MasterModel {
        let mut model = MasterModel::new();
        model.add_strategy(StrategyEntry::new(
            "def strategy(p, t): return 'buy'",
            EvaluationResult {
                sharpe_ratio: 1.0,
                max_drawdown: 5.0,
                total_return: 10.0,
                profit_factor: 2.0,
                number_of_trades: 31,
            },
        ));
        model
    }

    #[test]
    fn load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonModelStore::new(dir.path().join("model.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_restores_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonModelStore::new(dir.path().join("nested/data/model.json"));
        let model = sample_model();

        store.save(&model).unwrap();
        assert_eq!(store.load().unwrap(), Some(model));
    }

    #[test]
    fn save_overwrites_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonModelStore::new(dir.path().join("model.json"));
        store.save(&sample_model()).unwrap();
        store.save(&MasterModel::new()).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert!(loaded.is_empty());
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn corrupt_document_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, "{ not json").unwrap();

        let err = JsonModelStore::new(&path).load().unwrap_err();
        assert!(matches!(err, ZkquantError::Persistence { .. }));
    }

    #[test]
    fn document_is_pretty_json_with_top_level_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        JsonModelStore::new(&path).save(&sample_model()).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value["strategies"].is_array());
        assert!(value["scores"].is_object());
        assert!(raw.contains('\n'));
    }
}
