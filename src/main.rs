mod cli;
mod commands;
mod config;
mod paths;
mod progress;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::Config;
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Config file in effect, whether or not it exists yet
    pub config_path: PathBuf,
    /// File settings with command-line overrides applied
    pub config: Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "setsync", &mut io::stdout());
        return Ok(());
    }

    let config_path = match cli.config.as_deref() {
        Some(path) => paths::expand(path),
        None => paths::config_file()?,
    };
    let config = Config::load_from(&config_path)?
        .with_overrides(cli.endpoint.as_deref(), cli.user.as_deref());

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config_path,
        config,
    };

    match cli.command {
        Command::Diff(args) => commands::diff::run(&ctx, &args),
        Command::Sync(args) => commands::sync::run(&ctx, &args),
        Command::Register(args) => commands::register::register(&ctx, &args),
        Command::Ping => commands::register::ping(&ctx),
        Command::Config(cmd) => commands::config::run(&ctx, cmd),
        Command::Completions { .. } => Ok(()),
    }
}
