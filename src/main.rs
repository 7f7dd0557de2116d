use std::process::ExitCode;

use brick_mason::{CliArgs, LoggingConfig, init_logging, run};
use clap::Parser;

fn main() -> anyhow::Result<ExitCode> {
    let logging_config = LoggingConfig::from_env();
    let _guard = init_logging(logging_config)?;

    let cli = CliArgs::parse();
    let succeeded = run(cli)?;

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
