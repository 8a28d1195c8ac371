//! Strategy submission: evaluate, gate, and add to the master model.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::acceptance::{AcceptanceThresholds, GateFailure};
use super::error::ZkquantError;
use super::evaluator::Evaluator;
use super::master_model::{MasterModel, StrategyEntry};
use super::metrics::EvaluationResult;
use super::registry::{AddOutcome, ModelRegistry};

/// What to do with a submission whose code is already in the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    #[default]
    Reject,
    Allow,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(DuplicatePolicy::Reject),
            "allow" => Ok(DuplicatePolicy::Allow),
            other => Err(format!("unknown duplicate policy '{other}' (expected reject or allow)")),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicatePolicy::Reject => write!(f, "reject"),
            DuplicatePolicy::Allow => write!(f, "allow"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    /// Same code already accepted; nothing was evaluated or stored.
    Duplicate,
    Rejected {
        result: EvaluationResult,
        failures: Vec<GateFailure>,
    },
    Accepted {
        result: EvaluationResult,
        model: MasterModel,
    },
}

impl SubmissionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionOutcome::Accepted { .. })
    }

    pub fn report(&self) -> Option<EvaluationReport> {
        match self {
            SubmissionOutcome::Duplicate => None,
            SubmissionOutcome::Rejected { result, .. } => Some(EvaluationReport {
                metrics: *result,
                passed: false,
                duplicate: Some(false),
                master_model: None,
            }),
            SubmissionOutcome::Accepted { result, model } => Some(EvaluationReport {
                metrics: *result,
                passed: true,
                duplicate: Some(false),
                master_model: Some(model.clone()),
            }),
        }
    }
}

/// JSON shape printed by `evaluate --json` and `submit --json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReport {
    pub metrics: EvaluationResult,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_model: Option<MasterModel>,
}

impl EvaluationReport {
    pub fn evaluation(result: EvaluationResult, thresholds: &AcceptanceThresholds) -> Self {
        EvaluationReport {
            metrics: result,
            passed: thresholds.passes(&result),
            duplicate: None,
            master_model: None,
        }
    }
}

/// Evaluate `code` and, if it clears every threshold, add it to the model.
///
/// `InsufficientTrades` and execution failures are returned as errors; a
/// strategy that was scored but missed a threshold is `Rejected`.
pub fn submit(
    evaluator: &Evaluator<'_>,
    registry: &ModelRegistry,
    thresholds: &AcceptanceThresholds,
    policy: DuplicatePolicy,
    code: &str,
) -> Result<SubmissionOutcome, ZkquantError> {
    if policy == DuplicatePolicy::Reject && registry.contains_code(code)? {
        tracing::info!("strategy already in master model, skipping evaluation");
        return Ok(SubmissionOutcome::Duplicate);
    }

    let result = evaluator.evaluate(code)?;
    let failures = thresholds.failures(&result);
    if !failures.is_empty() {
        for failure in &failures {
            tracing::info!(%failure, "acceptance gate failed");
        }
        return Ok(SubmissionOutcome::Rejected { result, failures });
    }

    let entry = StrategyEntry::new(code, result);
    let model = match policy {
        DuplicatePolicy::Allow => registry.add_strategy(entry)?,
        DuplicatePolicy::Reject => match registry.add_unique(entry)? {
            AddOutcome::Added(model) => model,
            AddOutcome::Duplicate => return Ok(SubmissionOutcome::Duplicate),
        },
    };
    Ok(SubmissionOutcome::Accepted { result, model })
}
