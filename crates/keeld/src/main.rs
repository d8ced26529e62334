use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match keeld::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let mut stderr = io::stderr().lock();
            if writeln!(stderr, "keeld: {error}").is_err() {
                return ExitCode::FAILURE;
            }
            let mut source = std::error::Error::source(&error);
            while let Some(cause) = source {
                if writeln!(stderr, "  caused by: {cause}").is_err() {
                    break;
                }
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
