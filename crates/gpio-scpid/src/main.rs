//! Entry point for the `gpio-scpid` server binary.

use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match gpio_scpid::run_server() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "gpio-scpid terminated");
            writeln!(io::stderr(), "gpio-scpid: {error}").ok();
            ExitCode::FAILURE
        }
    }
}
