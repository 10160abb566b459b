use clap::Parser;
use crossrev::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
