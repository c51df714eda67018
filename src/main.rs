use clap::Parser;
use image_convert::cli::{self, Cli};
use image_convert::worker;
use log::LevelFilter;
use std::process::ExitCode;

fn main() -> ExitCode {
    worker::run_if_worker();

    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();

    match cli::run(&cli) {
        Ok(code) => code,
        Err(e) => {
            log::debug!("{:?}", e);
            eprintln!("{}", cli::describe_error(&e));
            ExitCode::FAILURE
        }
    }
}
