pub mod cancel;
pub mod config;
pub mod content;
pub mod error;
pub mod pattern;
pub mod pipeline;
pub mod render;
pub mod rules;
pub mod tree;
pub mod walker;

pub use cancel::CancellationToken;
pub use config::Config;
pub use content::{ContentOptions, load_content, load_contents};
pub use error::{AppError, Diagnostic, Result};
pub use pattern::{ExclusionRule, RuleSource, RuleTarget};
pub use pipeline::{PipelineOptions, Report};
pub use render::{OutputKind, RenderOptions, serialize};
pub use rules::{RuleSet, load_rules};
pub use tree::{ContentKind, DirectoryNode, FileNode, LoadedContent, TreeNode, TreeStats};
pub use walker::{WalkOutcome, build_tree};
