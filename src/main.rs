mod cli;
mod commands;

use std::process::ExitCode;
use cli::CommandHandler;
use ntrip_client::logging;

#[tokio::main]
async fn main() -> ExitCode {
  let cli = CommandHandler::new();

  logging::init_logging(logging::level_for_verbosity(cli.verbosity()));

  cli.run().await
}
