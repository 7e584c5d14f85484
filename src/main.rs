mod capture;
mod cli;
mod combination;
mod daemon;
mod dispatcher;
mod engine;
mod event;
mod journal;
mod monitor;
mod visibility;

use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            engine,
            reader,
            capture_key,
            ignore_classes,
        } => {
            if let Err(e) =
                daemon::run(&engine, &reader, capture_key.as_deref(), ignore_classes).await
            {
                tracing::error!(error = %e, "run failed");
                eprintln!("selpopd run: {e}");
                std::process::exit(1);
            }
        }
        Command::Record { out } => {
            if let Err(e) = daemon::record(&out).await {
                tracing::error!(error = %e, "record failed");
                eprintln!("selpopd record: {e}");
                std::process::exit(1);
            }
        }
        Command::Replay {
            journal,
            engine,
            reader,
            capture_text,
        } => {
            if let Err(e) = daemon::replay(&journal, &engine, &reader, capture_text).await {
                tracing::error!(error = %e, "replay failed");
                eprintln!("selpopd replay: {e}");
                std::process::exit(1);
            }
        }
    }
}
