use anyhow::Result;
use clap::{Parser, Subcommand};
use sheetsage_core::AnalysisState;
use std::path::PathBuf;

mod api;
mod config;
mod jobs;

use config::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "sheetsage")]
#[command(about = "Spreadsheet analysis agent - API server and pipeline runner", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "sheetsage.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080", env = "PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Run a single analysis with the configured defaults and exit
    Analyze {
        /// Spreadsheet to analyze (defaults to the configured one)
        #[arg(long)]
        spreadsheet_id: Option<String>,

        /// Free-text context for the insight prompt
        #[arg(long)]
        context: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sheetsage=info,tower_http=debug".into()),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = ServerConfig::load(&args.config)?;

    match args.command {
        Command::Serve { port, host } => {
            tracing::info!("Starting sheetsage analysis service");

            let addr = format!("{}:{}", host, port);
            tracing::info!("Starting API server on {}", addr);

            api::serve(&addr, config).await?;
        }
        Command::Analyze {
            spreadsheet_id,
            context,
        } => {
            run_once(config, spreadsheet_id, context).await?;
        }
    }

    Ok(())
}

/// One-shot pipeline run from the command line.
async fn run_once(
    config: ServerConfig,
    spreadsheet_id: Option<String>,
    context: Option<String>,
) -> Result<()> {
    let mut analysis = config.analysis.to_config();
    if let Some(id) = spreadsheet_id {
        analysis.spreadsheet_id = id;
    }
    if let Some(ctx) = context {
        analysis.context = ctx;
    }
    analysis.validate()?;

    tracing::info!(
        spreadsheet_id = %analysis.spreadsheet_id,
        read_range = %analysis.read_range,
        model = %analysis.model,
        service_url = %analysis.service_url,
        "invoking analysis pipeline"
    );

    let pipeline = config::default_pipeline();
    let final_state = pipeline.run(AnalysisState::new(analysis)).await;

    match final_state.into_outcome() {
        Ok(outcome) => {
            tracing::info!(rows_read = outcome.rows_read, "analysis completed");
            println!("{}", outcome.insights);
            Ok(())
        }
        Err(error) => {
            tracing::error!(error = %error, "analysis failed");
            std::process::exit(1);
        }
    }
}
