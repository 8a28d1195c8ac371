//! Port traits implemented by [`crate::adapters`].

pub mod config_port;
pub mod executor_port;
pub mod model_store_port;
