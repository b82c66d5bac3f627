use crate::cancel::CancellationToken;
use crate::config::Config;
use crate::content::{self, ContentOptions};
use crate::error::{Diagnostic, Result};
use crate::render::{self, OutputKind, RenderOptions};
use crate::rules::{self, RuleSet};
use crate::tree::{DirectoryNode, TreeStats};
use crate::walker;
use std::path::{Path, PathBuf};

/// Everything a run needs besides the scan root.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub cli_patterns: Vec<String>,
    pub exclude_hidden: bool,
    pub use_defaults: bool,
    /// Project rule file; `None` skips the file source entirely.
    pub rule_file: Option<PathBuf>,
    pub content: ContentOptions,
    pub output_kind: OutputKind,
    pub render: RenderOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            cli_patterns: Vec::new(),
            exclude_hidden: false,
            use_defaults: true,
            rule_file: None,
            content: ContentOptions::default(),
            output_kind: OutputKind::default(),
            render: RenderOptions::default(),
        }
    }
}

impl PipelineOptions {
    /// Options as described by `config`; config patterns count as caller patterns.
    pub fn from_config(config: &Config, project_root: &Path) -> Result<Self> {
        Ok(Self {
            cli_patterns: config.exclude.patterns.clone(),
            exclude_hidden: config.exclude.exclude_hidden,
            use_defaults: config.exclude.use_defaults,
            rule_file: Some(config.rule_file_path(project_root)),
            content: config.content_options()?,
            output_kind: config.output.kind,
            render: config.render_options(),
        })
    }
}

#[derive(Debug)]
pub struct Report {
    pub output: Vec<u8>,
    pub stats: TreeStats,
    pub diagnostics: Vec<Diagnostic>,
    pub excluded: usize,
    pub rule_count: usize,
}

/// Loads the merged rule set for a run without walking anything.
pub fn rules_for(options: &PipelineOptions) -> RuleSet {
    let defaults = if options.use_defaults {
        rules::default_patterns()
    } else {
        log::debug!("Default exclusion patterns disabled.");
        Vec::new()
    };
    rules::load_rules(
        &defaults,
        options.rule_file.as_deref(),
        &options.cli_patterns,
        options.exclude_hidden,
    )
}

/// Walks, loads and classifies; stops short of serializing.
pub fn collect(
    project_root: &Path,
    options: &PipelineOptions,
    cancel: &CancellationToken,
) -> Result<(DirectoryNode, RuleSet, Vec<Diagnostic>, usize)> {
    let rule_set = rules_for(options);
    log::debug!("Using {} exclusion rules", rule_set.len());

    let outcome = walker::build_tree_with_cancel(project_root, &rule_set, cancel)?;
    let tree = content::load_contents(outcome.root, &options.content, cancel)?;

    let mut diagnostics = rule_set.diagnostics().to_vec();
    diagnostics.extend(outcome.diagnostics);
    Ok((tree, rule_set, diagnostics, outcome.excluded))
}

/// Runs the whole conversion and returns the rendered buffer. Nothing is
/// written anywhere; the caller decides where the bytes go.
pub fn run(
    project_root: &Path,
    options: &PipelineOptions,
    cancel: &CancellationToken,
) -> Result<Report> {
    let (tree, rule_set, diagnostics, excluded) = collect(project_root, options, cancel)?;
    let output = render::serialize_with_options(&tree, options.output_kind, &options.render)?;
    Ok(Report {
        output,
        stats: tree.stats(),
        diagnostics,
        excluded,
        rule_count: rule_set.len(),
    })
}
