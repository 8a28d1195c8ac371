//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_model_store::{JsonModelStore, DEFAULT_MODEL_PATH};
use crate::adapters::subprocess_executor::{SandboxConfig, SubprocessExecutor};
use crate::domain::acceptance::AcceptanceThresholds;
use crate::domain::config_validation::validate_config;
use crate::domain::error::ZkquantError;
use crate::domain::evaluator::{Evaluator, EvaluatorConfig, SeedMode};
use crate::domain::market;
use crate::domain::master_model::{MasterModel, PortfolioEntry, RiskTier};
use crate::domain::metrics::EvaluationResult;
use crate::domain::registry::ModelRegistry;
use crate::domain::simulation::SimulationConfig;
use crate::domain::submission::{self, DuplicatePolicy, EvaluationReport, SubmissionOutcome};
use crate::ports::config_port::ConfigPort;

/// Exit code for a strategy that was scored but missed a threshold.
pub const EXIT_REJECTED: u8 = 10;
/// Exit code for a submission whose code is already in the model.
pub const EXIT_DUPLICATE: u8 = 11;

pub const STRATEGY_TEMPLATE: &str = include_str!("../templates/strategy.py");

#[derive(Parser, Debug)]
#[command(
    name = "zkquant",
    about = "Evaluate trading strategies on synthetic markets and blend them into a master model"
)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score a strategy without touching the master model
    Evaluate {
        #[arg(short, long)]
        strategy: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Score a strategy and add it to the master model if it passes
    Submit {
        #[arg(short, long)]
        strategy: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Show the master model, or one risk tier's portfolio
    Show {
        #[arg(short, long)]
        risk: Option<RiskTier>,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Remove every strategy from the master model
    Clear {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Write a synthetic market series as CSV
    Generate {
        #[arg(long, default_value_t = 12345)]
        seed: u64,
        #[arg(long, default_value_t = 1000)]
        length: usize,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print an example strategy
    Template,
}

/// Everything the commands need, resolved from one config source.
#[derive(Debug, Clone)]
pub struct Settings {
    pub evaluation: EvaluatorConfig,
    pub simulation: SimulationConfig,
    pub acceptance: AcceptanceThresholds,
    pub sandbox: SandboxConfig,
    pub model_path: PathBuf,
    pub duplicates: DuplicatePolicy,
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Evaluate {
            strategy,
            config,
            json,
        } => run_evaluate(&strategy, config.as_deref(), json),
        Command::Submit {
            strategy,
            config,
            json,
        } => run_submit(&strategy, config.as_deref(), json),
        Command::Show { risk, config, json } => run_show(risk, config.as_deref(), json),
        Command::Clear { config } => run_clear(config.as_deref()),
        Command::Generate {
            seed,
            length,
            output,
        } => run_generate(seed, length, output.as_deref()),
        Command::Template => {
            print!("{STRATEGY_TEMPLATE}");
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, ZkquantError> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading config");
            FileConfigAdapter::from_file(path)
        }
        None => Ok(FileConfigAdapter::empty()),
    }
}

pub fn load_settings(path: Option<&Path>) -> Result<Settings, ZkquantError> {
    let adapter = load_config(path)?;
    build_settings(&adapter)
}

pub fn build_settings(adapter: &dyn ConfigPort) -> Result<Settings, ZkquantError> {
    validate_config(adapter)?;
    let (model_path, duplicates) = build_model_settings(adapter)?;
    Ok(Settings {
        evaluation: build_evaluator_config(adapter)?,
        simulation: build_simulation_config(adapter)?,
        acceptance: build_thresholds(adapter)?,
        sandbox: build_sandbox_config(adapter)?,
        model_path,
        duplicates,
    })
}

fn count<T: TryFrom<i64>>(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<T, ZkquantError> {
    let value = adapter.get_int(section, key, default);
    T::try_from(value)
        .map_err(|_| ZkquantError::invalid(section, key, format!("{value} is out of range")))
}

pub fn build_evaluator_config(adapter: &dyn ConfigPort) -> Result<EvaluatorConfig, ZkquantError> {
    let defaults = EvaluatorConfig::default();
    let seed_mode = match adapter.get_string("evaluation", "seed_mode") {
        Some(s) => s
            .parse::<SeedMode>()
            .map_err(|reason| ZkquantError::invalid("evaluation", "seed_mode", reason))?,
        None => defaults.seed_mode,
    };
    Ok(EvaluatorConfig {
        datasets: count(adapter, "evaluation", "datasets", defaults.datasets as i64)?,
        dataset_length: count(
            adapter,
            "evaluation",
            "dataset_length",
            defaults.dataset_length as i64,
        )?,
        warmup: count(adapter, "evaluation", "warmup", defaults.warmup as i64)?,
        min_trades: count(adapter, "evaluation", "min_trades", defaults.min_trades as i64)?,
        base_seed: count(adapter, "evaluation", "base_seed", defaults.base_seed as i64)?,
        seed_mode,
        parallel: adapter.get_bool("evaluation", "parallel", defaults.parallel),
    })
}

pub fn build_simulation_config(adapter: &dyn ConfigPort) -> Result<SimulationConfig, ZkquantError> {
    let defaults = SimulationConfig::default();
    Ok(SimulationConfig {
        position_size: adapter.get_double("simulation", "position_size", defaults.position_size),
        min_trade_interval_days: adapter.get_int(
            "simulation",
            "min_trade_interval_days",
            defaults.min_trade_interval_days,
        ),
        max_consecutive_losses: count(
            adapter,
            "simulation",
            "max_consecutive_losses",
            defaults.max_consecutive_losses.into(),
        )?,
        max_total_losses: count(
            adapter,
            "simulation",
            "max_total_losses",
            defaults.max_total_losses.into(),
        )?,
        win_streak_threshold: count(
            adapter,
            "simulation",
            "win_streak_threshold",
            defaults.win_streak_threshold.into(),
        )?,
        win_streak_multiplier: adapter.get_double(
            "simulation",
            "win_streak_multiplier",
            defaults.win_streak_multiplier,
        ),
    })
}

pub fn build_thresholds(adapter: &dyn ConfigPort) -> Result<AcceptanceThresholds, ZkquantError> {
    let defaults = AcceptanceThresholds::default();
    Ok(AcceptanceThresholds {
        min_sharpe: adapter.get_double("acceptance", "min_sharpe", defaults.min_sharpe),
        max_drawdown: adapter.get_double("acceptance", "max_drawdown", defaults.max_drawdown),
        min_total_return: adapter.get_double(
            "acceptance",
            "min_total_return",
            defaults.min_total_return,
        ),
        min_profit_factor: adapter.get_double(
            "acceptance",
            "min_profit_factor",
            defaults.min_profit_factor,
        ),
        min_trades: count(adapter, "acceptance", "min_trades", defaults.min_trades as i64)?,
    })
}

pub fn build_sandbox_config(adapter: &dyn ConfigPort) -> Result<SandboxConfig, ZkquantError> {
    let defaults = SandboxConfig::default();
    let interpreter_args = match adapter.get_string("sandbox", "interpreter_args") {
        Some(args) => args.split_whitespace().map(str::to_string).collect(),
        None => defaults.interpreter_args,
    };
    Ok(SandboxConfig {
        interpreter: adapter
            .get_string("sandbox", "interpreter")
            .map(|s| s.trim().to_string())
            .unwrap_or(defaults.interpreter),
        interpreter_args,
        entry_function: adapter
            .get_string("sandbox", "entry_function")
            .map(|s| s.trim().to_string())
            .unwrap_or(defaults.entry_function),
        timeout_secs: count(adapter, "sandbox", "timeout_secs", defaults.timeout_secs as i64)?,
        step_timeout_secs: adapter.get_double(
            "sandbox",
            "step_timeout_secs",
            defaults.step_timeout_secs,
        ),
    })
}

pub fn build_model_settings(
    adapter: &dyn ConfigPort,
) -> Result<(PathBuf, DuplicatePolicy), ZkquantError> {
    let path = adapter
        .get_string("model", "path")
        .map(|s| PathBuf::from(s.trim()))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH));
    let duplicates = match adapter.get_string("model", "duplicates") {
        Some(s) => s
            .parse::<DuplicatePolicy>()
            .map_err(|reason| ZkquantError::invalid("model", "duplicates", reason))?,
        None => DuplicatePolicy::default(),
    };
    Ok((path, duplicates))
}

pub fn open_registry(settings: &Settings) -> ModelRegistry {
    ModelRegistry::open(Box::new(JsonModelStore::new(&settings.model_path)))
}

fn read_strategy(path: &Path) -> Result<String, ZkquantError> {
    tracing::info!(path = %path.display(), "reading strategy");
    Ok(fs::read_to_string(path)?)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), ZkquantError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| ZkquantError::Io(std::io::Error::other(e)))?;
    println!("{text}");
    Ok(())
}

fn print_metrics(result: &EvaluationResult) {
    println!("Sharpe ratio:    {:.4}", result.sharpe_ratio);
    println!("Max drawdown:    {:.2}%", result.max_drawdown);
    println!("Total return:    {:.2}%", result.total_return);
    println!("Profit factor:   {:.4}", result.profit_factor);
    println!("Trades:          {}", result.number_of_trades);
}

/// First line of a strategy's code, shortened for listings.
pub fn summarize_code(code: &str) -> String {
    const MAX: usize = 60;
    let line = code
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    if line.chars().count() > MAX {
        let cut: String = line.chars().take(MAX - 3).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}

fn run_evaluate(
    strategy: &Path,
    config: Option<&Path>,
    json: bool,
) -> Result<ExitCode, ZkquantError> {
    let settings = load_settings(config)?;
    let code = read_strategy(strategy)?;
    let executor = SubprocessExecutor::new(settings.sandbox.clone());
    let evaluator = Evaluator::new(
        &executor,
        settings.evaluation.clone(),
        settings.simulation.clone(),
    );

    let result = evaluator.evaluate(&code)?;
    let failures = settings.acceptance.failures(&result);
    if json {
        print_json(&EvaluationReport::evaluation(result, &settings.acceptance))?;
    } else {
        print_metrics(&result);
        if failures.is_empty() {
            println!("\nPasses every acceptance threshold.");
        } else {
            println!("\nFails acceptance:");
            for failure in &failures {
                println!("  - {failure}");
            }
        }
    }

    Ok(if failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_REJECTED)
    })
}

fn run_submit(
    strategy: &Path,
    config: Option<&Path>,
    json: bool,
) -> Result<ExitCode, ZkquantError> {
    let settings = load_settings(config)?;
    let code = read_strategy(strategy)?;
    let executor = SubprocessExecutor::new(settings.sandbox.clone());
    let evaluator = Evaluator::new(
        &executor,
        settings.evaluation.clone(),
        settings.simulation.clone(),
    );
    let registry = open_registry(&settings);

    let outcome = submission::submit(
        &evaluator,
        &registry,
        &settings.acceptance,
        settings.duplicates,
        &code,
    )?;

    if json {
        match outcome.report() {
            Some(report) => print_json(&report)?,
            None => print_json(&serde_json::json!({ "duplicate": true, "passed": false }))?,
        }
    } else {
        match &outcome {
            SubmissionOutcome::Duplicate => {
                println!("This strategy is already in the master model.");
            }
            SubmissionOutcome::Rejected { result, failures } => {
                print_metrics(result);
                println!("\nRejected:");
                for failure in failures {
                    println!("  - {failure}");
                }
            }
            SubmissionOutcome::Accepted { result, model } => {
                print_metrics(result);
                println!(
                    "\nAccepted. The master model now holds {} strategies.",
                    model.len()
                );
            }
        }
    }

    Ok(match outcome {
        SubmissionOutcome::Duplicate => ExitCode::from(EXIT_DUPLICATE),
        SubmissionOutcome::Rejected { .. } => ExitCode::from(EXIT_REJECTED),
        SubmissionOutcome::Accepted { .. } => ExitCode::SUCCESS,
    })
}

#[derive(serde::Serialize)]
struct TierView<'a> {
    tier: RiskTier,
    score: f64,
    portfolio: &'a [PortfolioEntry],
}

fn print_model(model: &MasterModel) {
    if model.is_empty() {
        println!("The master model is empty.");
        return;
    }
    println!("{} strategies", model.len());
    for (i, entry) in model.strategies().iter().enumerate() {
        let w = &entry.weights;
        println!(
            "\n#{} {}\n   sharpe {:.3}  drawdown {:.2}%  return {:.2}%  pf {:.3}  trades {}\n   weights  low {:.4}  medium {:.4}  high {:.4}",
            i + 1,
            summarize_code(&entry.code),
            entry.metrics.sharpe_ratio,
            entry.metrics.max_drawdown,
            entry.metrics.total_return,
            entry.metrics.profit_factor,
            entry.metrics.number_of_trades,
            w.low,
            w.medium,
            w.high,
        );
    }
    let scores = model.scores();
    println!(
        "\nScores  low {:.4}  medium {:.4}  high {:.4}",
        scores.low, scores.medium, scores.high
    );
}

fn run_show(
    risk: Option<RiskTier>,
    config: Option<&Path>,
    json: bool,
) -> Result<ExitCode, ZkquantError> {
    let settings = load_settings(config)?;
    let model = open_registry(&settings).snapshot()?;

    match (risk, json) {
        (None, true) => print_json(&model)?,
        (None, false) => print_model(&model),
        (Some(tier), json) => {
            let portfolio = model.portfolio(tier);
            let score = model.scores().get(tier);
            if json {
                print_json(&TierView {
                    tier,
                    score,
                    portfolio: &portfolio,
                })?;
            } else {
                println!("{tier} risk portfolio (score {score:.4})");
                for entry in &portfolio {
                    println!("  {:>7.2}%  {}", entry.weight * 100.0, summarize_code(&entry.code));
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_clear(config: Option<&Path>) -> Result<ExitCode, ZkquantError> {
    let settings = load_settings(config)?;
    open_registry(&settings).clear()?;
    println!("Master model cleared.");
    Ok(ExitCode::SUCCESS)
}

fn run_generate(seed: u64, length: usize, output: Option<&Path>) -> Result<ExitCode, ZkquantError> {
    let series = market::generate(seed, length)?;
    match output {
        Some(path) => csv_adapter::write_series(path, &series)?,
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            csv_adapter::write_series_to(&mut lock, &series)
                .map_err(|e| ZkquantError::Io(std::io::Error::other(e)))?;
            lock.flush()?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
