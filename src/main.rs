//! Kolosal Forecast - Main Entry Point

use clap::Parser;
use kolosal_forecast::cli::{cmd_info, cmd_predict, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_forecast=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    match cli.command {
        Commands::Train {
            key,
            lookback,
            epochs,
            batch_size,
            learning_rate,
            model,
            hidden_size,
            validation_split,
        } => {
            cmd_train(
                config,
                &key,
                lookback,
                epochs,
                batch_size,
                learning_rate,
                model,
                hidden_size,
                validation_split,
            )?;
        }
        Commands::Predict { key, steps, json } => {
            cmd_predict(config, &key, steps, json)?;
        }
        Commands::Info { key } => {
            cmd_info(config, key.as_deref())?;
        }
    }

    Ok(())
}
