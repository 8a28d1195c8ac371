//! Configuration validation.
//!
//! Every key is optional; these checks apply to the value that will be used,
//! whether it came from the file or from the built-in default.

use crate::domain::error::ZkquantError;
use crate::domain::evaluator::SeedMode;
use crate::domain::submission::DuplicatePolicy;
use crate::ports::config_port::ConfigPort;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), ZkquantError> {
    validate_evaluation_config(config)?;
    validate_simulation_config(config)?;
    validate_acceptance_config(config)?;
    validate_sandbox_config(config)?;
    validate_model_config(config)?;
    Ok(())
}

pub fn validate_evaluation_config(config: &dyn ConfigPort) -> Result<(), ZkquantError> {
    validate_positive_int(config, "evaluation", "datasets", 5)?;
    validate_positive_int(config, "evaluation", "dataset_length", 1000)?;
    validate_warmup(config)?;
    validate_non_negative_int(config, "evaluation", "min_trades", 30)?;
    validate_non_negative_int(config, "evaluation", "base_seed", 12345)?;
    if let Some(mode) = config.get_string("evaluation", "seed_mode") {
        mode.parse::<SeedMode>()
            .map_err(|reason| ZkquantError::invalid("evaluation", "seed_mode", reason))?;
    }
    Ok(())
}

pub fn validate_simulation_config(config: &dyn ConfigPort) -> Result<(), ZkquantError> {
    validate_position_size(config)?;
    validate_non_negative_int(config, "simulation", "min_trade_interval_days", 5)?;
    validate_positive_int(config, "simulation", "max_consecutive_losses", 3)?;
    validate_positive_int(config, "simulation", "max_total_losses", 8)?;
    validate_positive_int(config, "simulation", "win_streak_threshold", 5)?;
    validate_multiplier(config)?;
    Ok(())
}

pub fn validate_acceptance_config(config: &dyn ConfigPort) -> Result<(), ZkquantError> {
    let drawdown = config.get_double("acceptance", "max_drawdown", 20.0);
    if !(0.0..=100.0).contains(&drawdown) {
        return Err(ZkquantError::invalid(
            "acceptance",
            "max_drawdown",
            "max_drawdown must be between 0 and 100",
        ));
    }
    let profit_factor = config.get_double("acceptance", "min_profit_factor", 1.3);
    if profit_factor < 0.0 {
        return Err(ZkquantError::invalid(
            "acceptance",
            "min_profit_factor",
            "min_profit_factor must be non-negative",
        ));
    }
    validate_non_negative_int(config, "acceptance", "min_trades", 30)?;
    Ok(())
}

pub fn validate_sandbox_config(config: &dyn ConfigPort) -> Result<(), ZkquantError> {
    if let Some(interpreter) = config.get_string("sandbox", "interpreter") {
        if interpreter.trim().is_empty() {
            return Err(ZkquantError::invalid(
                "sandbox",
                "interpreter",
                "interpreter must not be empty",
            ));
        }
    }
    if let Some(entry) = config.get_string("sandbox", "entry_function") {
        if !is_identifier(entry.trim()) {
            return Err(ZkquantError::invalid(
                "sandbox",
                "entry_function",
                format!("'{entry}' is not a valid function name"),
            ));
        }
    }
    validate_positive_int(config, "sandbox", "timeout_secs", 120)?;
    let step = config.get_double("sandbox", "step_timeout_secs", 2.0);
    if step <= 0.0 {
        return Err(ZkquantError::invalid(
            "sandbox",
            "step_timeout_secs",
            "step_timeout_secs must be positive",
        ));
    }
    Ok(())
}

pub fn validate_model_config(config: &dyn ConfigPort) -> Result<(), ZkquantError> {
    if let Some(path) = config.get_string("model", "path") {
        if path.trim().is_empty() {
            return Err(ZkquantError::invalid("model", "path", "path must not be empty"));
        }
    }
    if let Some(policy) = config.get_string("model", "duplicates") {
        policy
            .parse::<DuplicatePolicy>()
            .map_err(|reason| ZkquantError::invalid("model", "duplicates", reason))?;
    }
    Ok(())
}

fn validate_positive_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<(), ZkquantError> {
    if config.get_int(section, key, default) <= 0 {
        return Err(ZkquantError::invalid(section, key, format!("{key} must be positive")));
    }
    Ok(())
}

fn validate_non_negative_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<(), ZkquantError> {
    if config.get_int(section, key, default) < 0 {
        return Err(ZkquantError::invalid(
            section,
            key,
            format!("{key} must be non-negative"),
        ));
    }
    Ok(())
}

fn validate_warmup(config: &dyn ConfigPort) -> Result<(), ZkquantError> {
    let warmup = config.get_int("evaluation", "warmup", 50);
    let length = config.get_int("evaluation", "dataset_length", 1000);
    if warmup < 0 {
        return Err(ZkquantError::invalid(
            "evaluation",
            "warmup",
            "warmup must be non-negative",
        ));
    }
    if warmup >= length {
        return Err(ZkquantError::invalid(
            "evaluation",
            "warmup",
            format!("warmup ({warmup}) must be shorter than dataset_length ({length})"),
        ));
    }
    Ok(())
}

fn validate_position_size(config: &dyn ConfigPort) -> Result<(), ZkquantError> {
    let value = config.get_double("simulation", "position_size", 0.10);
    if value <= 0.0 || value > 1.0 {
        return Err(ZkquantError::invalid(
            "simulation",
            "position_size",
            "position_size must be in (0, 1]",
        ));
    }
    Ok(())
}

fn validate_multiplier(config: &dyn ConfigPort) -> Result<(), ZkquantError> {
    let value = config.get_double("simulation", "win_streak_multiplier", 1.5);
    if value < 1.0 {
        return Err(ZkquantError::invalid(
            "simulation",
            "win_streak_multiplier",
            "win_streak_multiplier must be at least 1",
        ));
    }
    Ok(())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
