mod app;
mod cli;
mod domain;
mod infra;
mod transport;
mod usecases;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    app::run(cli).await
}
