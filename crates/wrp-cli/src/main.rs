mod cli;
mod logging;

use std::process::ExitCode;

fn main() -> ExitCode {
    logging::init();
    let code = cli::run_from_env();
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
