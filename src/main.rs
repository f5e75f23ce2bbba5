// src/main.rs — shaderloop entry point

use clap::Parser;

use shaderloop::cli::{Cli, Commands};
use shaderloop::infra::config::Config;
use shaderloop::infra::logger;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging (RUST_LOG still wins)
    logger::init_logging(if cli.verbose { "debug" } else { "warn" });

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Load config (falls back to defaults if no config.toml)
    let config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };

    match cli.command {
        Commands::Parse { file } => shaderloop::cli::parse::run_parse(file.as_deref()),
        Commands::Generate { prompt, model, raw } => {
            let prompt = prompt.join(" ");
            shaderloop::cli::generate::run_generate(&config, &prompt, model.as_deref(), raw).await
        }
        Commands::History { all, limit } => shaderloop::cli::history::show_history(all, limit),
        Commands::Config => shaderloop::cli::config::show_config(&config, cli.config.as_deref()),
    }
}
