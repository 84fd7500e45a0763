//! loginsight - Main Entry Point

use clap::Parser;
use loginsight::cli::{cmd_detect, cmd_generate, cmd_info, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loginsight=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect {
            data,
            contamination,
            trees,
            sample_size,
            seed,
            output,
            plot,
        } => {
            cmd_detect(
                &data,
                contamination,
                trees,
                sample_size,
                seed,
                output.as_ref(),
                plot.as_ref(),
            )?;
        }
        Commands::Generate {
            normal,
            anomalies,
            seed,
            output,
        } => {
            cmd_generate(normal, anomalies, seed, &output)?;
        }
        Commands::Info { data } => {
            cmd_info(&data)?;
        }
    }

    Ok(())
}
