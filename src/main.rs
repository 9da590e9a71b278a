use anyhow::Context;
use clap::Parser;

use giftcourier::adapter::inbound::cli::command::{Cli, Commands};
use giftcourier::adapter::inbound::cli::output::{self, OutputConfig};
use giftcourier::adapter::inbound::cli::{catalog, check, messages};

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    output::configure(OutputConfig {
        json: cli.json,
        quiet: cli.quiet,
    });

    let config = cli.config.display().to_string();
    match cli.command {
        Commands::Check => {
            let problems = check::execute(&cli.config)
                .with_context(|| format!("check failed for {config}"))?;
            if problems > 0 {
                std::process::exit(2);
            }
        }
        Commands::Catalog => {
            catalog::execute(&cli.config).with_context(|| format!("cannot list catalog for {config}"))?;
        }
        Commands::Messages => {
            messages::execute(&cli.config)
                .with_context(|| format!("cannot list messages for {config}"))?;
        }
    }
    Ok(())
}
