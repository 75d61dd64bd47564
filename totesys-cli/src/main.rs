use std::process;

use clap::Parser;
use totesys_cli::cli::{Cli, Commands};
use totesys_cli::errors::OrchestrationError;
use totesys_cli::Pipeline;
use totesys_types::log::error;
use totesys_types::models::Config;
use totesys_types::report::StageResponse;
use totesys_types::serde_json;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        error!("{e}");
        // Mirror the deployed surface: errors still produce a response.
        if let Ok(json) = serde_json::to_string(&StageResponse::internal_error()) {
            println!("{json}");
        }
        process::exit(1);
    }
}

#[tokio::main]
async fn run() -> Result<(), OrchestrationError> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config_path)?;
    let pipeline = Pipeline::new(config).await;

    let responses = match cli.cmd {
        Commands::Extract => vec![pipeline.extract().await?],
        Commands::Transform => vec![pipeline.transform().await?],
        Commands::Load => vec![pipeline.load().await?],
        Commands::Run => pipeline.run_all().await?,
    };
    for response in responses {
        println!("{}", serde_json::to_string(&response)?);
    }
    Ok(())
}
