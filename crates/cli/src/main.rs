use std::process::ExitCode;

fn main() -> ExitCode {
    groundline_cli::run()
}
