mod cli_args;
mod commands;
mod fetch;
mod output;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use std::path::Path;
use std::process;

use cli_args::{Cli, Commands, ExclusionOpts, ProjectConfigOpts};
use codetext_core::{AppError, Config};

fn main() {
    let cli_args = Cli::parse();

    setup_logging(cli_args.quiet, cli_args.verbose);

    let quiet = cli_args.quiet;

    log::debug!("CLI args parsed: {:?}", cli_args);

    let exit_code = match run_app(cli_args, quiet) {
        Ok(_) => {
            log::info!("Application finished successfully.");
            0
        }
        Err(e) => {
            let exit_code = exit_code_for(&e);
            if !quiet || exit_code == 1 {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
            } else {
                log::error!("Application failed: {:#}", e);
            }
            exit_code
        }
    };
    log::debug!("Exiting with code {}", exit_code);
    process::exit(exit_code);
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<AppError>() {
        Some(AppError::Config(_)) => 1,
        Some(AppError::TomlParse(_)) => 1,
        Some(AppError::InvalidArgument(_)) => 1,
        Some(AppError::Traversal { .. }) => 2,
        Some(AppError::Io(_)) => 2,
        Some(AppError::FileRead { .. }) => 2,
        Some(AppError::WorkerPool(_)) => 2,
        Some(AppError::JsonSerialize(_)) => 6,
        Some(AppError::XmlSerialize(_)) => 6,
        Some(AppError::Cancelled) => 130,
        Some(_) => 1,
        None => 1,
    }
}

fn setup_logging(quiet: bool, verbose: u8) {
    let log_level = if quiet {
        log::LevelFilter::Off
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
    log::trace!("Logger initialized with level: {:?}", log_level);
}

fn run_app(cli: Cli, quiet: bool) -> Result<()> {
    match cli.command {
        None => {
            Cli::command().print_help()?;
        }
        Some(Commands::Generate(args)) => {
            log::debug!("Executing 'generate' command...");
            commands::generate::handle_generate_command(args, quiet)?;
        }
        Some(Commands::Rules(args)) => {
            log::debug!("Executing 'rules' command...");
            commands::rules::handle_rules_command(args)?;
        }
    }
    Ok(())
}

fn merge_exclusion_overrides(mut config: Config, exclusion: &ExclusionOpts) -> Config {
    log::trace!("Applying exclusion CLI overrides to config...");

    if !exclusion.exclude.is_empty() {
        let mut patterns = exclusion.exclude.clone();
        patterns.append(&mut config.exclude.patterns);
        config.exclude.patterns = patterns;
    }
    if exclusion.exclude_hidden {
        config.exclude.exclude_hidden = true;
    }
    if exclusion.no_default_excludes {
        config.exclude.use_defaults = false;
    }
    if let Some(rule_file) = &exclusion.rule_file {
        config.exclude.rule_file = rule_file.clone();
    }

    log::trace!("Config after CLI overrides: {:?}", config);
    config
}

/// Loads the project config and layers the command's exclusion flags on top.
pub fn load_config_for_command(
    project_root: &Path,
    project_opts: &ProjectConfigOpts,
    exclusion: &ExclusionOpts,
) -> Result<Config> {
    let config = Config::load(
        project_root,
        project_opts.config.as_deref(),
        project_opts.no_config,
    )
    .context("Failed to load configuration")?;
    Ok(merge_exclusion_overrides(config, exclusion))
}
