pub mod cli;
mod commands;

use clap::Parser;
use tracing::Instrument;

use cli::Cli;
use common::logger::{TraceId, init_logger, root_span};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger("eventctl", cli.json_logs);

    let span = root_span("eventctl", &TraceId::new());
    commands::run(cli).instrument(span).await
}
