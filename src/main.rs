mod activation;
mod catalog;
mod commands;
mod config;
mod error;
mod install;
mod inventory;
mod options;
mod platform;
mod resolver;
mod runtime;
mod shell;
mod utils;
mod version;

use clap::{CommandFactory, Parser};
use colored::Colorize;
use options::{Cli, Commands};
use platform::elevate::{ElevatedRunner, SudoRunner};

fn main() {
    let cli = Cli::parse();
    options::verbose::init(cli.verbose);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            if error::is_permission_denied(&err) {
                if let Some(code) = rerun_elevated() {
                    std::process::exit(code);
                }
            }
            eprintln!("{} {:#}", "error:".red(), err);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    if cli.version {
        options::version::show();
        return Ok(0);
    }
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(0);
    };

    let mut config = config::Config::load()?;
    let code = match command {
        Commands::Node { command } => commands::run_module(&mut config, "node", command)?,
        Commands::Go { command } => commands::run_module(&mut config, "go", command)?,
        Commands::Setup(selection) => {
            commands::env::setup(&mut config, &selection)?;
            0
        }
        Commands::Teardown(selection) => {
            commands::env::teardown(&config, &selection)?;
            0
        }
        Commands::Config { key, value } => {
            commands::config::execute(&mut config, key, value)?;
            0
        }
        Commands::Version => {
            options::version::show();
            0
        }
    };
    config.save()?;
    Ok(code)
}

/// Runs the whole command again under sudo, once.
fn rerun_elevated() -> Option<i32> {
    let runner = SudoRunner::detect();
    if !runner.available() {
        return None;
    }
    let exe = std::env::current_exe().ok()?;
    let args: Vec<String> = std::iter::once(exe.display().to_string())
        .chain(std::env::args().skip(1))
        .collect();
    match runner.rerun(&args) {
        Ok(code) => Some(code),
        Err(err) => {
            tracing::warn!("elevated retry failed: {err}");
            None
        }
    }
}
