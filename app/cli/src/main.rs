//! `cradle` binary entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cradle_cli::args::Args;
use cradle_cli::artifacts;
use cradle_cli::config;
use cradle_cli::driver;
use cradle_cli::exit_codes;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err:#}");
            std::process::exit(exit_codes::CONFIG_ERROR);
        }
    };

    if let Ok(Some(prompt)) = args.resolve_prompt() {
        if let Some(history) = artifacts::default_history_path() {
            if let Err(err) = artifacts::append_history(&history, &prompt) {
                tracing::warn!(error = %err, "failed to update history file");
            }
        }
    }

    let model = match driver::model_source_from_args(&args) {
        Ok(model) => model,
        Err(err) => {
            eprintln!("config error: {err:#}");
            std::process::exit(exit_codes::CONFIG_ERROR);
        }
    };

    match driver::run(&args, config, model).await {
        Ok(report) => std::process::exit(report.exit_code),
        Err(err) => {
            eprintln!("fatal: {err:#}");
            std::process::exit(exit_codes::FATAL_TOOL_ERROR);
        }
    }
}
