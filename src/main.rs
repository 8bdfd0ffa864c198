mod cli;
mod commands;
mod config;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::DscBridgeConfig;
use dsckit::SessionHandle;
use std::io;
use std::sync::Arc;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub config: DscBridgeConfig,
    /// Shared interpreter; started on first use
    pub session: Arc<SessionHandle>,
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
    let log_level = if cli.quiet {
        log::LevelFilter::Error
    } else {
        log_level
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "dscbridge", &mut io::stdout());
        return Ok(());
    }

    let config = DscBridgeConfig::load(cli.config.as_deref())?;
    let debug = log_level >= log::LevelFilter::Debug;
    let session = SessionHandle::global(config.powershell_config(cli.pwsh.as_deref(), debug));

    let ctx = Context {
        quiet: cli.quiet,
        config,
        session,
    };

    let result = match cli.command {
        Command::Get(args) => commands::get::run(&ctx, args),
        Command::Set(args) => commands::set::run(&ctx, commands::set::Verb::Set, args),
        Command::Create(args) => commands::set::run(&ctx, commands::set::Verb::Create, args),
        Command::Update(args) => commands::set::run(&ctx, commands::set::Verb::Update, args),
        Command::Delete(args) => commands::delete::run(&ctx, args),
        Command::Render(args) => commands::render::run(&ctx, args),
        Command::Types(cmd) => commands::types::run(cmd),
        Command::Completions { .. } => Ok(()),
    };

    ctx.session.shutdown();
    result
}
