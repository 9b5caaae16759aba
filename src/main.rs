//! dtovl entry point.
use std::process::exit;

use tracing_subscriber::EnvFilter;

use dtovl::{cli, error::OverlayError};

fn main() {
    let request = match cli::parse() {
        Ok(request) => request,
        Err(e) => fail(&e),
    };

    let default = if request.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .init();

    if let Err(e) = cli::dispatch(&request) {
        fail(&e);
    }
}

/// Print the error and exit non-zero, pointing usage mistakes at `--help`.
fn fail(e: &OverlayError) -> ! {
    eprintln!("dtovl: {e}");
    if e.is_usage() {
        eprintln!("Try 'dtovl --help' for more information.");
    }
    exit(e.exit_code());
}
