use crate::error::Diagnostic;
use crate::pattern::{ExclusionRule, RuleSource};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

pub const DEFAULT_RULE_FILE: &str = ".exclude";

#[derive(Debug, Default, Deserialize)]
pub struct BuiltinExcludes {
    #[serde(default)]
    pub version_control: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub caches: Vec<String>,
    #[serde(default)]
    pub build_artifacts: Vec<String>,
}

impl BuiltinExcludes {
    pub fn patterns(&self) -> Vec<String> {
        self.version_control
            .iter()
            .chain(&self.dependencies)
            .chain(&self.caches)
            .chain(&self.build_artifacts)
            .cloned()
            .collect()
    }
}

static BUILTIN_EXCLUDES: Lazy<BuiltinExcludes> = Lazy::new(|| {
    let yaml_content = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/data/default_excludes.yaml"
    ));
    serde_yml::from_str(yaml_content).expect("Failed to parse embedded data/default_excludes.yaml")
});

pub fn get_builtin_excludes() -> &'static BuiltinExcludes {
    &BUILTIN_EXCLUDES
}

/// The built-in default patterns as a flat list.
pub fn default_patterns() -> Vec<String> {
    get_builtin_excludes().patterns()
}

/// The merged, read-only rule list threaded through the walk.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ExclusionRule>,
    diagnostics: Vec<Diagnostic>,
}

impl RuleSet {
    pub fn rules(&self) -> &[ExclusionRule] {
        &self.rules
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule (in priority order) that excludes the path, if any.
    pub fn first_match(&self, relative_path: &str, is_directory: bool) -> Option<&ExclusionRule> {
        self.rules
            .iter()
            .find(|rule| rule.matches(relative_path, is_directory))
    }

    pub fn is_excluded(&self, relative_path: &str, is_directory: bool) -> bool {
        self.first_match(relative_path, is_directory).is_some()
    }
}

/// Splits caller patterns on commas, trimming and dropping empty pieces.
pub fn split_cli_patterns(cli_patterns: &[String]) -> Vec<String> {
    cli_patterns
        .iter()
        .flat_map(|arg| arg.split(','))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// Parses rule file text: one pattern per line, `#` comments and blank lines ignored.
pub fn parse_rule_lines(content: &str) -> Vec<String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

/// Reads a project rule file. A missing file yields `Ok(None)`.
pub fn read_rule_file(path: &Path) -> io::Result<Option<Vec<String>>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(parse_rule_lines(&content))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Merges the three rule sources into one list ordered `cli`, `file`, `default`.
///
/// A pattern supplied by several sources is kept once, tagged with the most
/// specific source. Problems with the rule file or with individual patterns
/// are recorded as diagnostics; loading itself never fails.
pub fn load_rules(
    defaults: &[String],
    project_file: Option<&Path>,
    cli_patterns: &[String],
    exclude_hidden: bool,
) -> RuleSet {
    let mut diagnostics = Vec::new();

    let file_patterns = match project_file {
        Some(path) => match read_rule_file(path) {
            Ok(Some(patterns)) => {
                log::info!(
                    "Loaded {} exclusion patterns from {}",
                    patterns.len(),
                    path.display()
                );
                patterns
            }
            Ok(None) => {
                log::debug!("No rule file at {}", path.display());
                Vec::new()
            }
            Err(e) => {
                log::warn!("Could not read rule file {}: {}", path.display(), e);
                diagnostics.push(Diagnostic::RuleFileUnreadable {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let sources: [(RuleSource, Vec<String>); 3] = [
        (RuleSource::Cli, split_cli_patterns(cli_patterns)),
        (RuleSource::File, file_patterns),
        (
            RuleSource::Default,
            defaults
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect(),
        ),
    ];

    let mut seen = HashSet::new();
    let mut rules = Vec::new();
    for (source, patterns) in sources {
        if source == RuleSource::File && exclude_hidden {
            let hidden = ExclusionRule::hidden();
            if seen.insert(hidden.pattern().to_string()) {
                rules.push(hidden);
            }
        }
        for pattern in patterns {
            if !seen.insert(pattern.clone()) {
                log::trace!(
                    "Pattern \"{}\" already supplied by a more specific source",
                    pattern
                );
                continue;
            }
            let rule = ExclusionRule::new(pattern, source);
            if let Some(reason) = rule.glob_error() {
                diagnostics.push(Diagnostic::InvalidPattern {
                    pattern: rule.pattern().to_string(),
                    reason: reason.to_string(),
                });
            }
            rules.push(rule);
        }
    }

    log::info!("Active exclusion rules: {}", rules.len());
    log::debug!(
        "Exclusion patterns: {:?}",
        rules.iter().map(ExclusionRule::pattern).collect::<Vec<_>>()
    );
    RuleSet { rules, diagnostics }
}
