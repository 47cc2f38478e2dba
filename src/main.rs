use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use dotsync_cli::cli::{self, Command};
use dotsync_cli::commands;
use dotsync_cli::logging::{self, Logger};

fn main() -> ExitCode {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();
    logging::init_subscriber(args.verbose, args.command.name());
    let log = Arc::new(Logger::new(args.command.name()));

    let result = match &args.command {
        Command::Apply(opts) => commands::apply::run(&args.global, opts, &log, args.verbose),
        Command::Version => {
            commands::version::run();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log.error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
