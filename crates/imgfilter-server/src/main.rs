mod cli;
mod routes;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Logging is initialized inside run_from_args once config is known.
    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("imgfilter error: {:#}", err);
        std::process::exit(1);
    }
}
