use std::process::ExitCode;

fn main() -> ExitCode {
    springbok::args::cli_main()
}
