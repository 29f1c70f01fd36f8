//! hourglass-node: run one Hourglass role until SIGINT or SIGTERM.

use anyhow::Result;
use clap::Parser;
use hourglass_node::{cancel_on_signal, run, Cli};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    hourglass::logging::init(cli.log_format.into());

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));
    run(cli, shutdown).await
}
