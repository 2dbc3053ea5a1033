use rdm_core::logging;

mod cli;
mod render;
mod ua;

use crate::cli::CliCommand;

fn main() {
    // File logging under the XDG state dir; stderr if that is unwritable.
    if logging::init_logging().is_err() {
        logging::init_logging_stderr();
    }

    if let Err(err) = CliCommand::run_from_args() {
        eprintln!("rdm error: {:#}", err);
        std::process::exit(1);
    }
}
