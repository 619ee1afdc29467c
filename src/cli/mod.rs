//! Kolosal Forecast CLI Module
//!
//! Command-line interface for training per-key models and forecasting.

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

use crate::config::ForecastConfig;
use crate::service::{ForecastService, TrainRequest, DEFAULT_FORECAST_STEPS};
use crate::training::{Activation, Architecture};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn fmt_loss(loss: Option<f64>) -> String {
    loss.map(|l| format!("{:.6}", l)).unwrap_or_else(|| "n/a".to_string())
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kolosal-forecast")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Per-key sequence-model forecasting with autoregressive rollout")]
#[command(long_about = None)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory with one <KEY>.csv per series
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Artifact store root
    #[arg(long, global = true)]
    pub artifacts_dir: Option<PathBuf>,

    /// CSV column holding the observations
    #[arg(long, global = true)]
    pub value_column: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelChoice {
    Recurrent,
    Mlp,
    Linear,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train the model for a key on its full series
    Train {
        /// Series key, e.g. NVDA
        #[arg(short, long)]
        key: String,

        /// Observations per model input
        #[arg(short, long)]
        lookback: Option<usize>,

        #[arg(short, long)]
        epochs: Option<usize>,

        #[arg(long)]
        batch_size: Option<usize>,

        #[arg(long)]
        learning_rate: Option<f64>,

        /// Network family
        #[arg(short, long, value_enum)]
        model: Option<ModelChoice>,

        /// Hidden units (recurrent) or width of the single hidden layer (mlp).
        /// Applies to `--model` when given, else to the configured network.
        #[arg(long)]
        hidden_size: Option<usize>,

        /// Fraction of the most recent windows held out for validation
        #[arg(long)]
        validation_split: Option<f64>,
    },

    /// Forecast the next values of a key
    Predict {
        #[arg(short, long)]
        key: String,

        #[arg(short, long, default_value_t = DEFAULT_FORECAST_STEPS)]
        steps: usize,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the published model of a key, or list trained keys
    Info {
        #[arg(short, long)]
        key: Option<String>,
    },
}

impl Cli {
    /// Configuration file (or environment defaults) with flag overrides applied
    pub fn resolve_config(&self) -> anyhow::Result<ForecastConfig> {
        let mut config = match &self.config {
            Some(path) => ForecastConfig::load(path)?,
            None => ForecastConfig::default(),
        };
        if let Some(dir) = &self.data_dir {
            config = config.with_data_dir(dir.clone());
        }
        if let Some(dir) = &self.artifacts_dir {
            config = config.with_artifacts_dir(dir.clone());
        }
        if let Some(column) = &self.value_column {
            config = config.with_value_column(column.clone());
        }
        Ok(config)
    }
}

const DEFAULT_HIDDEN_SIZE: usize = 32;

/// Architecture selected by `--model` / `--hidden-size`, None when neither is given
pub fn resolve_architecture(
    configured: &Architecture,
    model: Option<ModelChoice>,
    hidden_size: Option<usize>,
) -> anyhow::Result<Option<Architecture>> {
    let architecture = match (model, hidden_size) {
        (None, None) => return Ok(None),
        (Some(choice), size) => architecture_for(choice, size.unwrap_or(DEFAULT_HIDDEN_SIZE)),
        (None, Some(size)) => match configured {
            Architecture::Recurrent { .. } => Architecture::Recurrent { hidden_size: size },
            Architecture::Mlp { activation, .. } => Architecture::Mlp {
                hidden_layers: vec![size],
                activation: *activation,
            },
            Architecture::Linear => Architecture::Linear,
        },
    };
    if matches!(architecture, Architecture::Linear) && hidden_size.is_some() {
        anyhow::bail!("--hidden-size has no effect on a linear model");
    }
    Ok(Some(architecture))
}

fn architecture_for(choice: ModelChoice, hidden_size: usize) -> Architecture {
    match choice {
        ModelChoice::Recurrent => Architecture::Recurrent { hidden_size },
        ModelChoice::Mlp => Architecture::Mlp {
            hidden_layers: vec![hidden_size],
            activation: Activation::ReLU,
        },
        ModelChoice::Linear => Architecture::Linear,
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
pub fn cmd_train(
    config: ForecastConfig,
    key: &str,
    lookback: Option<usize>,
    epochs: Option<usize>,
    batch_size: Option<usize>,
    learning_rate: Option<f64>,
    model: Option<ModelChoice>,
    hidden_size: Option<usize>,
    validation_split: Option<f64>,
) -> anyhow::Result<()> {
    section("Train");

    let architecture = resolve_architecture(&config.training.architecture, model, hidden_size)?;
    let service = ForecastService::from_config(config)?;
    let request = TrainRequest {
        lookback,
        epochs,
        batch_size,
        learning_rate,
        architecture,
        validation_split,
        time_budget: None,
    };

    step_run(&format!("Training {}", key.to_uppercase().cyan()));
    let start = Instant::now();
    let outcome = service.train(key, request)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    println!();
    kv("Key", &outcome.key);
    kv("Version", &outcome.version.to_string());
    kv("Observations", &outcome.n_observations_used.to_string());
    kv("Final loss", &fmt_loss(outcome.final_loss));
    if outcome.validation_loss.is_some() {
        kv("Validation loss", &fmt_loss(outcome.validation_loss));
    }
    println!();

    Ok(())
}

pub fn cmd_predict(config: ForecastConfig, key: &str, steps: usize, json: bool) -> anyhow::Result<()> {
    let service = ForecastService::from_config(config)?;
    let outcome = service.predict(key, steps)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    section("Predict");
    kv("Key", &outcome.key);
    kv("Steps", &outcome.steps.to_string());
    println!();
    for (i, value) in outcome.predictions.iter().enumerate() {
        println!("  {:>4}  {}", muted(&format!("t+{}", i + 1)), format!("{:.4}", value).white().bold());
    }
    println!();

    Ok(())
}

pub fn cmd_info(config: ForecastConfig, key: Option<&str>) -> anyhow::Result<()> {
    let service = ForecastService::from_config(config)?;

    let Some(key) = key else {
        section("Trained keys");
        let keys = service.trained_keys()?;
        if keys.is_empty() {
            println!("  {}", "No trained models".yellow());
        }
        for key in keys {
            let version = service.store().current_version(&key)?.unwrap_or(0);
            println!("  {} {} {}", ok("•"), key.white(), dim(&format!("v{}", version)));
        }
        println!();
        return Ok(());
    };

    let info = service.model_info(key)?;
    section(&format!("Model {}", info.metadata.key));
    kv("Version", &info.metadata.version.to_string());
    kv("Architecture", &info.metadata.architecture);
    kv("Parameters", &info.n_parameters.to_string());
    kv("Lookback", &info.lookback.to_string());
    kv("Scaling", &format!("[{}, {}]", info.scaling_min, info.scaling_max));
    kv("Trained at", &info.metadata.trained_at.to_rfc3339());
    kv("Observations", &info.metadata.n_observations.to_string());
    kv("Windows", &info.metadata.n_windows.to_string());
    kv("Epochs", &info.metadata.epochs.to_string());
    kv("Final loss", &fmt_loss(info.metadata.final_loss));
    if info.metadata.validation_loss.is_some() {
        kv("Validation loss", &fmt_loss(info.metadata.validation_loss));
    }
    println!();

    Ok(())
}
