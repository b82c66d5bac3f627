use crate::cancel::CancellationToken;
use crate::error::{AppError, Diagnostic, Result};
use crate::rules::RuleSet;
use crate::tree::{DirectoryNode, FileNode, LoadedContent, TreeNode};
use std::cell::Cell;
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// The pruned tree plus everything noticed on the way.
#[derive(Debug)]
pub struct WalkOutcome {
    pub root: DirectoryNode,
    pub diagnostics: Vec<Diagnostic>,
    /// Entries pruned by a rule (an excluded directory counts once).
    pub excluded: usize,
}

struct OpenDir {
    path: PathBuf,
    node: DirectoryNode,
}

/// Converts `path` to a `/`-separated path relative to `root`.
pub fn relative_posix(path: &Path, root: &Path) -> String {
    let relative = match path.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf()),
    };
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn traversal_error(path: &Path, reason: impl Into<String>) -> AppError {
    AppError::Traversal {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

pub fn build_tree(root_path: &Path, rules: &RuleSet) -> Result<WalkOutcome> {
    build_tree_with_cancel(root_path, rules, &CancellationToken::new())
}

/// Depth-first walk of `root_path` that prunes every entry matched by `rules`
/// and drops directories left without children.
///
/// A symlinked directory is walked only when its target lies outside the
/// root and has not been walked already; every other one becomes
/// [`Diagnostic::CycleSkipped`].
///
/// `cancel` is checked between entries; a cancelled walk returns
/// [`AppError::Cancelled`] and no partial tree.
pub fn build_tree_with_cancel(
    root_path: &Path,
    rules: &RuleSet,
    cancel: &CancellationToken,
) -> Result<WalkOutcome> {
    let metadata = fs::metadata(root_path).map_err(|e| traversal_error(root_path, e.to_string()))?;
    if !metadata.is_dir() {
        return Err(traversal_error(root_path, "not a directory"));
    }
    fs::read_dir(root_path).map_err(|e| traversal_error(root_path, e.to_string()))?;
    let canonical_root =
        fs::canonicalize(root_path).map_err(|e| traversal_error(root_path, e.to_string()))?;
    let root_name = canonical_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| canonical_root.display().to_string());

    if cancel.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    log::info!("Walking project directory: {}", root_path.display());

    let mut visited: HashSet<PathBuf> = HashSet::new();
    visited.insert(canonical_root.clone());
    let mut diagnostics = Vec::new();
    let excluded = Cell::new(0usize);
    let mut stack = vec![OpenDir {
        path: root_path.to_path_buf(),
        node: DirectoryNode::new(root_name, ""),
    }];

    let mut walker = WalkDir::new(root_path)
        .follow_links(true)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let relative_path = relative_posix(entry.path(), root_path);
            match rules.first_match(&relative_path, entry.file_type().is_dir()) {
                Some(rule) => {
                    log::trace!(
                        "Excluding {} (rule \"{}\" from {})",
                        relative_path,
                        rule.pattern(),
                        rule.source()
                    );
                    excluded.set(excluded.get() + 1);
                    false
                }
                None => true,
            }
        });

    while let Some(result) = walker.next() {
        if cancel.is_cancelled() {
            log::info!("Walk cancelled at {}", root_path.display());
            return Err(AppError::Cancelled);
        }
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                record_walk_error(err, &mut stack, rules, root_path, &mut diagnostics, &excluded);
                continue;
            }
        };

        close_directories(&mut stack, entry.depth());
        let relative_path = relative_posix(entry.path(), root_path);
        let name = entry.file_name().to_string_lossy().into_owned();

        if entry.file_type().is_dir() {
            match fs::canonicalize(entry.path()) {
                Ok(real) => {
                    // A linked directory inside the root is walked under its real
                    // path, so the link is skipped whichever name sorts first.
                    let inside_root = real.starts_with(&canonical_root);
                    let first_visit = visited.insert(real.clone());
                    if entry.path_is_symlink() && (inside_root || !first_visit) {
                        log::warn!(
                            "Skipping symlink {} to {} (already part of the walk)",
                            relative_path,
                            real.display()
                        );
                        diagnostics.push(Diagnostic::CycleSkipped {
                            link: relative_path,
                            target: real,
                        });
                        walker.skip_current_dir();
                        continue;
                    }
                }
                Err(e) => log::debug!("Could not canonicalize {}: {}", relative_path, e),
            }
            log::trace!("Entering directory: {}", relative_path);
            stack.push(OpenDir {
                path: entry.path().to_path_buf(),
                node: DirectoryNode::new(name, relative_path),
            });
        } else {
            let (size_bytes, content) = match entry.metadata() {
                Ok(meta) => (meta.len(), None),
                Err(e) => (0, Some(LoadedContent::Unreadable {
                    reason: e.to_string(),
                })),
            };
            log::trace!("Including file: {}", relative_path);
            push_child(
                &mut stack,
                TreeNode::File(FileNode {
                    is_hidden: name.starts_with('.'),
                    name,
                    relative_path,
                    size_bytes,
                    content,
                    absolute_path: entry.path().to_path_buf(),
                }),
            );
        }
    }

    close_directories(&mut stack, 1);
    let root = match stack.pop() {
        Some(open) => open.node,
        None => return Err(traversal_error(root_path, "walk lost its root directory")),
    };
    let stats = root.stats();
    log::info!(
        "Directory walk complete: {} files in {} directories, {} entries excluded.",
        stats.files,
        stats.directories,
        excluded.get()
    );
    Ok(WalkOutcome {
        root,
        diagnostics,
        excluded: excluded.get(),
    })
}

fn push_child(stack: &mut [OpenDir], node: TreeNode) {
    if let Some(parent) = stack.last_mut() {
        parent.node.children.push(node);
    }
}

/// Finishes every open directory deeper than `depth`, dropping the empty ones.
fn close_directories(stack: &mut Vec<OpenDir>, depth: usize) {
    let keep = depth.max(1);
    while stack.len() > keep {
        let Some(open) = stack.pop() else { break };
        if open.node.children.is_empty() && open.node.unreadable.is_none() {
            log::trace!("Pruning empty directory: {}", open.node.relative_path);
            continue;
        }
        push_child(stack, TreeNode::Directory(open.node));
    }
}

fn record_walk_error(
    err: walkdir::Error,
    stack: &mut Vec<OpenDir>,
    rules: &RuleSet,
    root_path: &Path,
    diagnostics: &mut Vec<Diagnostic>,
    excluded: &Cell<usize>,
) {
    if let Some(ancestor) = err.loop_ancestor() {
        let link = err
            .path()
            .map(|p| relative_posix(p, root_path))
            .unwrap_or_default();
        log::warn!("Skipping symlink cycle at {} -> {}", link, ancestor.display());
        diagnostics.push(Diagnostic::CycleSkipped {
            link,
            target: ancestor.to_path_buf(),
        });
        return;
    }

    let reason = match err.io_error() {
        Some(io_err) => io_err.to_string(),
        None => err.to_string(),
    };
    let Some(path) = err.path().map(Path::to_path_buf) else {
        log::warn!("Error walking directory: {}", reason);
        return;
    };

    // A failed listing is reported against the directory that was just opened.
    if let Some(open) = stack.iter_mut().rev().find(|open| open.path == path) {
        log::warn!("Could not list directory {}: {}", path.display(), reason);
        diagnostics.push(Diagnostic::UnreadableDirectory {
            path: open.node.relative_path.clone(),
            reason: reason.clone(),
        });
        open.node.unreadable = Some(reason);
        return;
    }

    let relative_path = relative_posix(&path, root_path);
    if rules.is_excluded(&relative_path, false) {
        excluded.set(excluded.get() + 1);
        return;
    }
    log::warn!("Could not read entry {}: {}", relative_path, reason);
    close_directories(stack, err.depth());
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| relative_path.clone());
    push_child(
        stack,
        TreeNode::File(FileNode {
            is_hidden: name.starts_with('.'),
            name,
            relative_path,
            size_bytes: 0,
            content: Some(LoadedContent::Unreadable { reason }),
            absolute_path: path,
        }),
    );
}
