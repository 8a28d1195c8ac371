//! Core domain types and logic.

pub mod market;
pub mod signal;
pub mod runner;
pub mod position;
pub mod simulation;
pub mod metrics;
pub mod acceptance;
pub mod evaluator;
pub mod master_model;
pub mod registry;
pub mod submission;
pub mod config_validation;
pub mod error;
