use std::process::ExitCode;

fn main() -> ExitCode {
    match flagledger::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
