//! zkquant: evaluation and aggregation of user-submitted trading strategies.
//!
//! Strategies are scored against synthetic regime-switching markets, gated on
//! risk-adjusted metrics, and blended into a persisted master model with
//! per-risk-tier weights.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
