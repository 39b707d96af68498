//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use std::error::Error;

use geoingest_cli::CliError;
use geoingest_cli::logging::{LogFormat, init_logging};

fn main() {
    init_logging(LogFormat::from_env());
    match geoingest_cli::run() {
        Ok(()) => {}
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            let message = describe(&err);
            log::error!("{message}");
            eprintln!("geoingest: {message}");
            std::process::exit(1);
        }
    }
}

fn describe(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
