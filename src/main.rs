#![forbid(unsafe_code)]
use anyhow::{Context, Result};
use capplan::config::{self, load_configuration};
use capplan::features::{CPU_COLUMN, INSTANCE_COLUMN, MODE_COLUMN};
use capplan::persist::{load_pipeline, save_pipeline};
use capplan::source::{JsonlMetricsSource, MetricsSource, create_metrics_source};
use capplan::training::{Trainer, train_from_source};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{Level, event};

/// Capacity planning: forecast per interval counter rates
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch samples, train and evaluate a model, then save it
    Train {
        /// Maximum number of samples to fetch
        #[arg(long)]
        limit: Option<usize>,

        /// Where to save the fitted pipeline
        #[arg(long)]
        model_out: Option<PathBuf>,

        /// Metrics source connection string (postgres://, jsonl://)
        #[arg(long)]
        source: Option<String>,
    },
    /// Score the samples of a JSON lines file with a saved pipeline
    Predict {
        /// Saved pipeline
        #[arg(long)]
        model: Option<PathBuf>,

        /// JSON lines file of samples
        #[arg(long)]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;

    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Load configuration
    load_configuration().context("Failed to load configuration")?;
    let config = config::get().context("Failed to get configuration")?;
    let training_config = config
        .training()
        .context("Invalid training configuration")?;

    match args.command {
        Command::Train {
            limit,
            model_out,
            source,
        } => {
            let connection_string = source.unwrap_or_else(|| config.source_connection_string.clone());
            let limit = limit.unwrap_or(config.row_limit);
            let model_out = model_out.unwrap_or_else(|| PathBuf::from(&config.model_path));

            let source = create_metrics_source(&connection_string)
                .await
                .context("Failed to create metrics source")?;
            event!(Level::INFO, "Training from {} with at most {} rows", source.name(), limit);

            let outcome = train_from_source(source.as_ref(), &training_config, limit).await?;
            println!("Model evaluation:");
            println!("MAE : {:.4}", outcome.report.mae);
            println!("RMSE: {:.4}", outcome.report.rmse);

            save_pipeline(&outcome.pipeline, &model_out)?;
            println!("Model saved to {}", model_out.display());
            Ok(())
        }
        Command::Predict { model, input } => {
            let model = model.unwrap_or_else(|| PathBuf::from(&config.model_path));
            let pipeline = load_pipeline(&model)?;
            let samples = JsonlMetricsSource::new(&input)
                .fetch_samples(f64::NEG_INFINITY, usize::MAX)
                .await?;
            let trainer = Trainer::new(training_config)?;
            let (grid, predictions) = trainer
                .predict(&pipeline, &samples)
                .context("Failed to score samples")?;

            let cell = |column: &str, row: usize| {
                grid.values(column)
                    .and_then(|values| values.category_at(row))
                    .unwrap_or_default()
            };
            for (row, prediction) in predictions.iter().enumerate() {
                println!(
                    "{}\t{}\t{}\t{}\t{:.6}",
                    cell(&trainer.config().timestamp_column, row),
                    cell(INSTANCE_COLUMN, row),
                    cell(CPU_COLUMN, row),
                    cell(MODE_COLUMN, row),
                    prediction
                );
            }
            Ok(())
        }
    }
}
