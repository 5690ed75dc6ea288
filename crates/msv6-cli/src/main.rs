use clap::Parser;
use msv6_core::logging;

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging as early as possible; fall back to stderr if the state dir is unusable.
    if let Err(err) = logging::init_logging(cli.debug_logging()) {
        logging::init_logging_stderr(cli.debug_logging());
        tracing::warn!("log file unavailable, logging to stderr: {:#}", err);
    }

    match cli.run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("msv6 error: {:#}", err);
            std::process::exit(1);
        }
    }
}
