use std::process::ExitCode;

fn main() -> ExitCode {
    ticketbooth_cli::run()
}
