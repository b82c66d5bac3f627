use crate::cli_args::RulesArgs;
use crate::load_config_for_command;
use crate::{fetch, output};
use anyhow::{Context, Result};
use codetext_core::pipeline::{self, PipelineOptions};

pub fn handle_rules_command(args: RulesArgs) -> Result<()> {
    let input = fetch::resolve_input(args.project_config.input.as_deref(), true)
        .context("Failed to resolve input")?;
    let project_root = input.root();

    let config = load_config_for_command(project_root, &args.project_config, &args.exclusion)?;
    let options = PipelineOptions::from_config(&config, project_root)?;
    let rule_set = pipeline::rules_for(&options);
    log::debug!("Merged {} exclusion rules", rule_set.len());

    output::print_rules_table(&rule_set);
    output::print_diagnostics(rule_set.diagnostics());
    Ok(())
}
