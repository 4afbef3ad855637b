//! `cleanbites` binary: API server and cache maintenance.

mod cli;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = cli::Cli::parse();
    cli::init_tracing(cli.log_json);
    cli::run(cli).await
}
