use globset::{GlobBuilder, GlobMatcher};
use serde::Serialize;
use std::fmt;

/// Where an exclusion rule came from. Ordered by priority, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    Default,
    File,
    Cli,
}

impl RuleSource {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleSource::Default => "default",
            RuleSource::File => "file",
            RuleSource::Cli => "cli",
        }
    }
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which kind of entry a rule can exclude on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTarget {
    /// Pattern ended with `/`: matches directories and everything beneath them.
    DirectoryOnly,
    Any,
}

#[derive(Debug, Clone)]
enum Matcher {
    /// Any path segment starting with `.`.
    Hidden,
    Pattern {
        stem: String,
        glob: Option<GlobMatcher>,
        /// For patterns ending in `/**`: matches the directory that roots the subtree.
        subtree: Option<GlobMatcher>,
        anchored: bool,
        has_separator: bool,
    },
}

/// One compiled exclusion pattern. Immutable once built.
#[derive(Debug, Clone)]
pub struct ExclusionRule {
    pattern: String,
    source: RuleSource,
    target: RuleTarget,
    matcher: Matcher,
    glob_error: Option<String>,
}

fn compile_segment_glob(pattern: &str) -> Result<GlobMatcher, globset::Error> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
}

fn has_glob_meta(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

impl ExclusionRule {
    /// Compiles `pattern`. A pattern that is not a valid glob still matches
    /// exactly; check [`ExclusionRule::glob_error`] to report it.
    pub fn new(pattern: impl Into<String>, source: RuleSource) -> Self {
        let pattern = pattern.into();
        let trimmed = pattern.trim();
        let target = if trimmed.ends_with('/') {
            RuleTarget::DirectoryOnly
        } else {
            RuleTarget::Any
        };

        let without_slash = trimmed.trim_end_matches('/');
        let anchored = without_slash.starts_with('/');
        let stem = without_slash.trim_start_matches('/').to_string();
        let has_separator = stem.contains('/');

        let mut glob_error = None;
        let glob = if has_glob_meta(&stem) {
            match compile_segment_glob(&stem) {
                Ok(matcher) => Some(matcher),
                Err(e) => {
                    log::warn!("Invalid glob pattern \"{}\": {}", pattern, e);
                    glob_error = Some(e.to_string());
                    None
                }
            }
        } else {
            None
        };

        let subtree = match (target, stem.strip_suffix("/**")) {
            (RuleTarget::Any, Some(root)) if glob_error.is_none() && !root.is_empty() => {
                compile_segment_glob(root).ok()
            }
            _ => None,
        };

        log::trace!(
            "Compiled exclusion rule \"{}\" (source: {}, target: {:?})",
            pattern,
            source,
            target
        );
        Self {
            pattern: trimmed.to_string(),
            source,
            target,
            matcher: Matcher::Pattern {
                stem,
                glob,
                subtree,
                anchored,
                has_separator,
            },
            glob_error,
        }
    }

    /// The synthesized rule behind `exclude_hidden`: any dot-prefixed segment.
    pub fn hidden() -> Self {
        Self {
            pattern: ".*".to_string(),
            source: RuleSource::Cli,
            target: RuleTarget::Any,
            matcher: Matcher::Hidden,
            glob_error: None,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn source(&self) -> RuleSource {
        self.source
    }

    pub fn target(&self) -> RuleTarget {
        self.target
    }

    pub fn glob_error(&self) -> Option<&str> {
        self.glob_error.as_deref()
    }

    /// Returns true when this rule excludes the entry at `relative_path`
    /// (POSIX separators, relative to the scan root).
    pub fn matches(&self, relative_path: &str, is_directory: bool) -> bool {
        let relative_path = relative_path.trim_matches('/');
        if relative_path.is_empty() {
            return false;
        }
        match &self.matcher {
            Matcher::Hidden => relative_path
                .split('/')
                .any(|segment| segment.starts_with('.') && segment != "." && segment != ".."),
            Matcher::Pattern {
                stem,
                glob,
                subtree,
                anchored,
                has_separator,
            } => match self.target {
                RuleTarget::Any => matches_any(
                    stem,
                    glob.as_ref(),
                    subtree.as_ref(),
                    *anchored,
                    *has_separator,
                    relative_path,
                    is_directory,
                ),
                RuleTarget::DirectoryOnly => matches_directory(
                    stem,
                    glob.as_ref(),
                    *anchored,
                    *has_separator,
                    relative_path,
                    is_directory,
                ),
            },
        }
    }
}

fn final_segment(relative_path: &str) -> &str {
    relative_path.rsplit('/').next().unwrap_or(relative_path)
}

fn stem_matches(stem: &str, glob: Option<&GlobMatcher>, candidate: &str) -> bool {
    stem == candidate || glob.is_some_and(|g| g.is_match(candidate))
}

fn matches_any(
    stem: &str,
    glob: Option<&GlobMatcher>,
    subtree: Option<&GlobMatcher>,
    anchored: bool,
    has_separator: bool,
    relative_path: &str,
    is_directory: bool,
) -> bool {
    let name = final_segment(relative_path);
    let bare = !anchored && !has_separator;

    if stem == relative_path || (bare && stem == name) {
        return true;
    }
    if let Some(glob) = glob {
        if glob.is_match(relative_path) || (bare && glob.is_match(name)) {
            return true;
        }
    }
    // `dir/**` with zero trailing segments names the directory itself.
    is_directory && subtree.is_some_and(|root| root.is_match(relative_path))
}

fn matches_directory(
    stem: &str,
    glob: Option<&GlobMatcher>,
    anchored: bool,
    has_separator: bool,
    relative_path: &str,
    is_directory: bool,
) -> bool {
    let segments: Vec<&str> = relative_path.split('/').collect();
    // Only segments that name directories: a file's own name never counts.
    let dir_count = if is_directory {
        segments.len()
    } else {
        segments.len() - 1
    };
    if dir_count == 0 {
        return false;
    }

    if !has_separator {
        if anchored {
            return stem_matches(stem, glob, segments[0]);
        }
        return segments[..dir_count]
            .iter()
            .any(|segment| stem_matches(stem, glob, segment));
    }

    (1..=dir_count).any(|end| {
        if anchored {
            return stem_matches(stem, glob, &segments[..end].join("/"));
        }
        (0..end).any(|start| stem_matches(stem, glob, &segments[start..end].join("/")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str) -> ExclusionRule {
        ExclusionRule::new(pattern, RuleSource::Cli)
    }

    #[test]
    fn exact_name_matches_at_any_depth() {
        let r = rule("README.md");
        assert!(r.matches("README.md", false));
        assert!(r.matches("docs/nested/README.md", false));
        assert!(!r.matches("docs/README.markdown", false));
    }

    #[test]
    fn exact_full_path_match() {
        let r = rule("src/generated.rs");
        assert!(r.matches("src/generated.rs", false));
        assert!(!r.matches("lib/src/generated.rs", false));
    }

    #[test]
    fn directory_marker_only_matches_directories() {
        let r = rule("node_modules/");
        assert_eq!(r.target(), RuleTarget::DirectoryOnly);
        assert!(r.matches("node_modules", true));
        assert!(r.matches("web/node_modules", true));
        assert!(!r.matches("node_modules", false));
        assert!(r.matches("node_modules/x.js", false));
    }

    #[test]
    fn directory_marker_accepts_globs() {
        let r = rule("*.egg-info/");
        assert!(r.matches("pkg.egg-info", true));
        assert!(!r.matches("pkg.egg-info", false));
    }

    #[test]
    fn single_star_stays_within_segment() {
        let r = rule("src/*.rs");
        assert!(r.matches("src/main.rs", false));
        assert!(!r.matches("src/bin/main.rs", false));
    }

    #[test]
    fn extension_glob_matches_basename_anywhere() {
        let r = rule("*.log");
        assert!(r.matches("b.log", false));
        assert!(r.matches("logs/deep/b.log", false));
        assert!(!r.matches("b.log.txt", false));
    }

    #[test]
    fn question_mark_matches_one_character() {
        let r = rule("file?.txt");
        assert!(r.matches("file1.txt", false));
        assert!(!r.matches("file10.txt", false));
    }

    #[test]
    fn recursive_wildcard_matches_at_any_depth() {
        let r = rule("**/__pycache__/**");
        assert!(r.matches("__pycache__", true));
        assert!(r.matches("pkg/sub/__pycache__", true));
        assert!(r.matches("pkg/__pycache__/mod.pyc", false));
        assert!(!r.matches("pkg/pycache", true));
    }

    #[test]
    fn anchored_pattern_only_matches_at_root() {
        let r = rule("/build/");
        assert!(r.matches("build", true));
        assert!(!r.matches("web/build", true));
    }

    #[test]
    fn hidden_rule_matches_dot_segments() {
        let r = ExclusionRule::hidden();
        assert!(r.matches(".env", false));
        assert!(r.matches(".github/workflows/ci.yml", false));
        assert!(!r.matches("src/main.rs", false));
    }

    #[test]
    fn invalid_glob_falls_back_to_exact_match() {
        let r = rule("weird[name");
        assert!(r.glob_error().is_some());
        assert!(r.matches("weird[name", false));
        assert!(!r.matches("weirdname", false));
    }

    #[test]
    fn empty_relative_path_never_matches() {
        assert!(!rule("*").matches("", true));
    }
}
