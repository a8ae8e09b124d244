//! `scandesk` entry point.

use clap::Parser;

mod commands;
mod console;
mod settings;
mod telemetry;

use commands::Cli;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    telemetry::init_tracing(cli.log_json);

    if let Err(e) = cli.execute().await {
        eprintln!("✗ {e:#}");
        std::process::exit(1);
    }
}
