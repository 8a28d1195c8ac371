//! Master model persistence port.

use crate::domain::error::ZkquantError;
use crate::domain::master_model::MasterModel;

pub trait ModelStore: Send + Sync {
    /// Read the persisted model. `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<MasterModel>, ZkquantError>;

    /// Replace the persisted model with `model`. Readers must never observe a
    /// partially written document.
    fn save(&self, model: &MasterModel) -> Result<(), ZkquantError>;
}
