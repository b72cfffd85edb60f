use std::process::ExitCode;

use anyhow::Result;
use clap::Parser as ClapParser;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;

use cli::command::{Cli, Commands, LogFormat};
use cli::info::cmd_info;
use cli::run::cmd_run;

mod cli;
mod config;
mod input;
mod sink;
pub(crate) mod timestamp;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let base_level = cli.loglevel.to_level_filter();

    let multi = MultiProgress::new();

    let mut env_builder = env_logger::Builder::from_default_env();
    env_builder.filter_level(base_level);
    match cli.log_format {
        LogFormat::Plain => {
            env_builder.format_timestamp_secs();
        }
        LogFormat::Json => {
            env_builder.format(|buf, record| {
                use std::io::Write;
                writeln!(
                    buf,
                    "{{\"ts\":{},\"lvl\":\"{}\",\"msg\":\"{}\"}}",
                    buf.timestamp(),
                    record.level(),
                    record.args()
                )
            });
        }
    }

    let pb = if cli.progress {
        let logger = env_builder.build();
        LogWrapper::new(multi.clone(), logger).try_init()?;
        Some(&multi)
    } else {
        env_builder.try_init()?;
        None
    };

    if let Some(describe) = option_env!("VERGEN_GIT_DESCRIBE") {
        log::debug!("{} {describe}", env!("CARGO_PKG_NAME"));
    }

    let code = match cli.command {
        Commands::Run(ref args) => cmd_run(args, &cli, pb)?,
        Commands::Info(ref args) => {
            cmd_info(args, &cli, pb)?;
            ExitCode::SUCCESS
        }
    };

    Ok(code)
}
