mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use leafwatch::config::Config;
use leafwatch::ledger::ResultLog;
use leafwatch::observability::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::load().map_err(|e| format!("Failed to load config: {}", e))?;

    match cli.command {
        Commands::Server(args) => leafwatch::api::run(config, args.address).await?,
        Commands::ResetLog(args) => {
            if !args.yes {
                return Err(format!(
                    "refusing to reset {} without --yes",
                    config.ledger.path.display()
                )
                .into());
            }
            ResultLog::recreate(&config.ledger.path)?;
            info!(path = %config.ledger.path.display(), "Result log reset");
        }
        Commands::Config => print!("{}", config.to_toml()?),
    }

    Ok(())
}
