use anyhow::{Context, Result, bail};
use codetext_core::Config;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// The directory to scan. A cloned repository keeps its checkout alive for
/// as long as this value exists.
pub struct ResolvedInput {
    root: PathBuf,
    _checkout: Option<TempDir>,
}

impl ResolvedInput {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Turns `--input` into a local directory, cloning GitHub URLs first.
pub fn resolve_input(input: Option<&str>, quiet: bool) -> Result<ResolvedInput> {
    match input {
        Some(url) if is_github_url(url) => {
            let checkout = clone_repository(url, quiet)?;
            let root = Config::determine_project_root(Some(checkout.path()))?;
            Ok(ResolvedInput {
                root,
                _checkout: Some(checkout),
            })
        }
        other => {
            let root = Config::determine_project_root(other.map(Path::new))?;
            Ok(ResolvedInput {
                root,
                _checkout: None,
            })
        }
    }
}

pub fn is_github_url(input: &str) -> bool {
    input.starts_with("https://github.com/") || input.starts_with("git@github.com:")
}

/// Shallow-clones `repo_url` into a fresh temporary directory. The directory
/// is removed when the returned handle is dropped.
pub fn clone_repository(repo_url: &str, quiet: bool) -> Result<TempDir> {
    let checkout = tempfile::Builder::new()
        .prefix("codetext_repo_")
        .tempdir()
        .context("Failed to create a temporary directory for the clone")?;
    log::info!("Cloning {} into {}", repo_url, checkout.path().display());

    let mut command = Command::new("git");
    command
        .arg("clone")
        .arg("--depth")
        .arg("1")
        .arg(repo_url)
        .arg(checkout.path());
    if quiet {
        command.arg("--quiet");
    }

    let status = command
        .status()
        .context("Failed to launch git; is it installed and on PATH?")?;
    if !status.success() {
        bail!("git clone of {} exited with {}", repo_url, status);
    }
    log::debug!("Clone of {} finished", repo_url);
    Ok(checkout)
}
