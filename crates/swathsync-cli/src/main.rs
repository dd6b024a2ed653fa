use swathsync_core::logging;

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    // Parse first so `--help` and usage errors never touch the log file.
    let cli = Cli::parse_or_exit();

    if let Err(err) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable, using stderr: {:#}", err);
    }

    if let Err(err) = cli.run().await {
        eprintln!("swathsync error: {:#}", err);
        std::process::exit(1);
    }
}
