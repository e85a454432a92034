//! marsh CLI entry point.

use std::process::ExitCode;

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use marsh_repl::Repl;

fn main() -> ExitCode {
    // Respects RUST_LOG; logs go to stderr so they never mix into
    // pipeline output.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("marsh: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let mut repl = Repl::new()?;
    repl.run()
}
