use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;

use playsmf::commands::{self, logging::init_logging, Args, EXIT_FAILURE};

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_FAILURE),
            };
        }
    };

    init_logging(args.verbose, args.log_file.as_deref());
    commands::run(args)
}
