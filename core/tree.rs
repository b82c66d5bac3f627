use serde::Serialize;
use std::path::PathBuf;

/// Result of loading one file's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadedContent {
    Text { value: String },
    Binary { reason: String },
    Unreadable { reason: String },
}

impl LoadedContent {
    pub fn kind(&self) -> ContentKind {
        match self {
            LoadedContent::Text { .. } => ContentKind::Text,
            LoadedContent::Binary { .. } => ContentKind::Binary,
            LoadedContent::Unreadable { .. } => ContentKind::Unreadable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Text,
    Binary,
    Unreadable,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Binary => "binary",
            ContentKind::Unreadable => "unreadable",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    Directory(DirectoryNode),
    File(FileNode),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryNode {
    pub name: String,
    /// Empty for the scan root.
    pub relative_path: String,
    pub children: Vec<TreeNode>,
    /// Set when the directory's entries could not be listed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unreadable: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub name: String,
    pub relative_path: String,
    pub size_bytes: u64,
    pub is_hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<LoadedContent>,
    #[serde(skip)]
    pub absolute_path: PathBuf,
}

impl FileNode {
    pub fn extension_label(&self) -> String {
        match self.name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => format!(".{}", ext),
            _ => "no extension".to_string(),
        }
    }
}

impl DirectoryNode {
    pub fn new(name: impl Into<String>, relative_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            relative_path: relative_path.into(),
            children: Vec::new(),
            unreadable: None,
        }
    }

    /// All files in pre-order, directory-first traversal order.
    pub fn files(&self) -> Vec<&FileNode> {
        let mut out = Vec::new();
        collect_files(self, &mut out);
        out
    }

    pub fn files_mut(&mut self) -> Vec<&mut FileNode> {
        let mut out = Vec::new();
        collect_files_mut(self, &mut out);
        out
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        accumulate_stats(self, &mut stats);
        stats
    }
}

fn collect_files<'a>(dir: &'a DirectoryNode, out: &mut Vec<&'a FileNode>) {
    for child in &dir.children {
        match child {
            TreeNode::Directory(sub) => collect_files(sub, out),
            TreeNode::File(file) => out.push(file),
        }
    }
}

fn collect_files_mut<'a>(dir: &'a mut DirectoryNode, out: &mut Vec<&'a mut FileNode>) {
    for child in dir.children.iter_mut() {
        match child {
            TreeNode::Directory(sub) => collect_files_mut(sub, out),
            TreeNode::File(file) => out.push(file),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeStats {
    pub directories: usize,
    pub files: usize,
    pub text: usize,
    pub binary: usize,
    pub unreadable: usize,
    pub total_bytes: u64,
}

fn accumulate_stats(dir: &DirectoryNode, stats: &mut TreeStats) {
    for child in &dir.children {
        match child {
            TreeNode::Directory(sub) => {
                stats.directories += 1;
                accumulate_stats(sub, stats);
            }
            TreeNode::File(file) => {
                stats.files += 1;
                stats.total_bytes += file.size_bytes;
                match file.content.as_ref().map(LoadedContent::kind) {
                    Some(ContentKind::Text) => stats.text += 1,
                    Some(ContentKind::Binary) => stats.binary += 1,
                    Some(ContentKind::Unreadable) => stats.unreadable += 1,
                    None => {}
                }
            }
        }
    }
}
