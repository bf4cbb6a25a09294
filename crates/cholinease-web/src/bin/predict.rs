//! Headless batch prediction: reads a SMILES file and writes the prediction CSV.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use cholinease_bioactivity::{BioactivityPipeline, SmilesBatch};
use cholinease_common::Config;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Predict pIC50 against acetylcholinesterase for a file of SMILES
#[derive(Parser)]
#[command(name = "cholinease-predict")]
#[command(about = "Batch pIC50 prediction with PaDEL fingerprints", long_about = None)]
struct Cli {
    /// Input file, one SMILES per line (.smi or .txt)
    input: PathBuf,

    /// Where to write the CSV; stdout when omitted
    output: Option<PathBuf>,

    /// Configuration file (defaults to ./cholinease.toml)
    #[arg(long, env = "CHOLINEASE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the compound limit from the configuration
    #[arg(long)]
    max_compounds: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(max) = cli.max_compounds {
        config.pipeline.max_compounds = max;
        config.validate()?;
    }

    let text = tokio::fs::read_to_string(&cli.input)
        .await
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let batch = SmilesBatch::parse(&text, config.pipeline.max_compounds)?;
    if batch.truncated() > 0 {
        warn!("{} compounds beyond the limit of {} were skipped", batch.truncated(), batch.len());
    }

    let pipeline = BioactivityPipeline::from_config(&config);
    let outcome = pipeline.predict(&batch).await;
    for fp in &outcome.fingerprints {
        if fp.ok {
            info!("{}", fp.message);
        } else {
            error!("{}", fp.message);
        }
    }

    let report = outcome.result?;
    let csv = report.to_csv()?;
    match &cli.output {
        Some(path) => {
            tokio::fs::write(path, csv)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!("Wrote {} predictions to {}", report.rows.len(), path.display());
        }
        None => print!("{}", csv),
    }
    Ok(())
}
