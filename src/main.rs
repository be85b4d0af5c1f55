use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use litellm_exporter::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let config_path = args.config.as_deref();

    // `start` initializes tracing itself once LOG_LEVEL/LOG_FORMAT are known
    let command = args.get_command();
    if !matches!(command, cli::Commands::Start) {
        init_tracing("info", "text");
    }

    match command {
        cli::Commands::Start => {
            commands::start::execute(config_path).await?;
        }
        cli::Commands::Test { skip_db } => {
            commands::test::execute(config_path, skip_db).await?;
        }
        cli::Commands::Config { action } => match action {
            cli::ConfigCommands::Show => commands::config::show(config_path)?,
        },
        cli::Commands::Version => {
            println!("LiteLLM Exporter v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
