use std::process::ExitCode;

fn main() -> ExitCode {
    pharmline_cli::run()
}
