#![deny(unsafe_code)]

#[path = "driver.rs"]
mod driver;

use std::{env, io, process::ExitCode};

use logging::LoggingSetup;

fn main() -> ExitCode {
    let args = match driver::parse_args(env::args_os()) {
        Ok(args) => args,
        Err(error) => return driver::report_usage_error(&error),
    };

    let setup = LoggingSetup::global();
    // Fails only when the host already installed a subscriber; that one wins.
    let _ = logging::init_tracing(setup);

    driver::run(&args, setup, io::stdin().lock())
}
