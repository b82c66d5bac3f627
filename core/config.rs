use crate::content::{self, ContentOptions};
use crate::error::{AppError, Result};
use crate::render::{OutputKind, RenderOptions};
use crate::rules::DEFAULT_RULE_FILE;
use byte_unit::Byte;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_CONFIG_FILENAME: &str = "codetext.toml";
pub const DEFAULT_MAX_FILE_SIZE: &str = "4 MiB";

/// Settings read from `codetext.toml`. Every section and key is optional.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub exclude: ExcludeConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExcludeConfig {
    /// Extra patterns, treated like command-line patterns.
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub exclude_hidden: bool,
    #[serde(default = "default_true")]
    pub use_defaults: bool,
    /// Rule file name, relative to the scan root.
    #[serde(default = "default_rule_file")]
    pub rule_file: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ContentConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: String,
    /// Reader threads; unset means one per core, at most twelve.
    #[serde(default)]
    pub jobs: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default)]
    pub kind: OutputKind,
    #[serde(default)]
    pub json_pretty: bool,
}

fn default_true() -> bool {
    true
}
fn default_rule_file() -> String {
    DEFAULT_RULE_FILE.to_string()
}
fn default_max_file_size() -> String {
    DEFAULT_MAX_FILE_SIZE.to_string()
}

impl Default for ExcludeConfig {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            exclude_hidden: false,
            use_defaults: default_true(),
            rule_file: default_rule_file(),
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            jobs: None,
        }
    }
}

/// Parses sizes such as `512KB`, `4 MiB` or a bare byte count.
pub fn parse_byte_size(value: &str) -> Result<u64> {
    let byte_value = Byte::from_str(value.trim()).map_err(|e| {
        AppError::InvalidArgument(format!(
            "Invalid file size '{}': {}. Use B, KB, MiB, etc.",
            value, e
        ))
    })?;
    let bytes: u128 = byte_value.into();
    u64::try_from(bytes)
        .map_err(|_| AppError::InvalidArgument(format!("File size '{}' is too large", value)))
}

impl Config {
    /// Resolves the directory to scan: the given path with `~` expanded,
    /// or the current directory, canonicalized.
    pub fn determine_project_root(cli_project_root: Option<&Path>) -> Result<PathBuf> {
        let path_to_resolve = match cli_project_root {
            Some(p) => PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).as_ref()),
            None => env::current_dir().map_err(AppError::Io)?,
        };

        path_to_resolve
            .canonicalize()
            .map_err(|e| AppError::Traversal {
                path: path_to_resolve.clone(),
                reason: e.to_string(),
            })
    }

    pub fn resolve_config_path(
        project_root: &Path,
        cli_config_file: Option<&Path>,
        cli_disable_config: bool,
    ) -> Result<Option<PathBuf>> {
        if cli_disable_config {
            log::debug!("Config file loading disabled via CLI flag.");
            return Ok(None);
        }

        match cli_config_file {
            Some(p) => {
                let path = PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).as_ref());
                if !path.is_file() {
                    return Err(AppError::Config(format!(
                        "Specified config file not found at path: {}",
                        path.display()
                    )));
                }
                log::debug!("Using specified config file path: {}", path.display());
                Ok(Some(path))
            }
            None => {
                let default_path = project_root.join(DEFAULT_CONFIG_FILENAME);
                if default_path.is_file() {
                    log::debug!("Using default config file path: {}", default_path.display());
                    Ok(Some(default_path))
                } else {
                    log::debug!("No config file found at: {}", default_path.display());
                    Ok(None)
                }
            }
        }
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        log::info!("Loading configuration from: {}", config_path.display());
        let toml_content = fs::read_to_string(config_path).map_err(|e| AppError::FileRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        toml::from_str::<Config>(&toml_content).map_err(|e| {
            AppError::TomlParse(format!(
                "Error parsing config file '{}': {}. Check TOML syntax and structure.",
                config_path.display(),
                e
            ))
        })
    }

    /// Loads the config for `project_root`, falling back to defaults when
    /// there is no file to read.
    pub fn load(
        project_root: &Path,
        cli_config_file: Option<&Path>,
        cli_disable_config: bool,
    ) -> Result<Self> {
        match Self::resolve_config_path(project_root, cli_config_file, cli_disable_config)? {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn rule_file_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.exclude.rule_file)
    }

    pub fn max_file_bytes(&self) -> Result<u64> {
        parse_byte_size(&self.content.max_file_size)
    }

    pub fn content_options(&self) -> Result<ContentOptions> {
        let jobs = match self.content.jobs {
            Some(0) => {
                return Err(AppError::Config(
                    "content.jobs must be at least 1".to_string(),
                ));
            }
            Some(n) => n,
            None => content::default_jobs(),
        };
        Ok(ContentOptions {
            max_file_bytes: self.max_file_bytes()?,
            jobs,
        })
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            json_pretty: self.output.json_pretty,
        }
    }
}
