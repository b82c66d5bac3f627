use crate::cli_args::GenerateArgs;
use crate::load_config_for_command;
use crate::{fetch, output};
use anyhow::{Context, Result};
use codetext_core::pipeline::{self, PipelineOptions};
use codetext_core::{CancellationToken, Config, OutputKind};
use std::path::{Path, PathBuf};

pub fn handle_generate_command(args: GenerateArgs, quiet: bool) -> Result<()> {
    let input = fetch::resolve_input(args.project_config.input.as_deref(), quiet)
        .context("Failed to resolve input")?;
    let project_root = input.root();
    log::info!("Project root determined: {}", project_root.display());

    let config = apply_generate_overrides(
        load_config_for_command(project_root, &args.project_config, &args.exclusion)?,
        &args,
    );
    let mut options = PipelineOptions::from_config(&config, project_root)
        .context("Invalid content settings")?;

    let destination = args
        .output
        .as_deref()
        .map(|path| with_default_extension(path, options.output_kind));
    if let Some(pattern) = destination
        .as_deref()
        .and_then(|path| self_exclusion_pattern(path, project_root))
    {
        log::debug!("Excluding the output file itself: {}", pattern);
        options.cli_patterns.push(pattern);
    }

    let report = pipeline::run(project_root, &options, &CancellationToken::new())
        .with_context(|| format!("Failed to convert {}", project_root.display()))?;

    match &destination {
        Some(path) => output::write_to_file(path, &report.output)?,
        None => output::write_to_stdout(&report.output)?,
    }

    if !quiet {
        output::print_diagnostics(&report.diagnostics);
        output::print_summary(&report, destination.as_deref());
    }
    Ok(())
}

fn apply_generate_overrides(mut config: Config, args: &GenerateArgs) -> Config {
    if let Some(kind) = args.output_type {
        config.output.kind = kind.into();
    }
    if args.json_pretty {
        config.output.json_pretty = true;
    }
    if let Some(size) = &args.max_file_size {
        config.content.max_file_size = size.clone();
    }
    if let Some(jobs) = args.jobs {
        config.content.jobs = Some(jobs);
    }
    config
}

fn with_default_extension(path: &Path, kind: OutputKind) -> PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().is_none() {
        path.set_extension(kind.extension());
    }
    path
}

/// Anchored pattern naming `destination` when it lies inside the scan root,
/// so a rerun never reads its own previous output.
fn self_exclusion_pattern(destination: &Path, project_root: &Path) -> Option<String> {
    let absolute = std::path::absolute(destination).ok()?;
    let relative = absolute.strip_prefix(project_root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(format!("/{}", parts.join("/")))
}
