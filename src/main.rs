mod chart;
mod cli;
mod config;
mod error;
mod model;
mod persister;
mod storage;
mod timeline;
mod tracker;

use anyhow::Result;
use env_logger::Env;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match cli::parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e:#}\n");
            cli::print_help();
            std::process::exit(2);
        }
    };
    if command == cli::Command::Help {
        cli::print_help();
        return Ok(());
    }

    let config = config::load_config()?;

    // Storage must be reachable before any command runs
    let storage = match storage::resolve_storage(&config.storage).await {
        Ok(storage) => storage,
        Err(e) => {
            log::error!("Failed to initialize storage: {e}");
            std::process::exit(1);
        }
    };
    log::info!("Using {} storage", storage.name());

    if let Err(e) = cli::run(command, &config, storage.as_ref()).await {
        eprintln!("Error: {}", e.report());
        std::process::exit(1);
    }
    Ok(())
}
