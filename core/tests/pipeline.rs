use codetext_core::cancel::CancellationToken;
use codetext_core::error::{AppError, Diagnostic};
use codetext_core::pipeline::{self, PipelineOptions};
use codetext_core::render::{self, OutputKind, ParagraphStyle};
use codetext_core::tree::{ContentKind, DirectoryNode, FileNode, LoadedContent, TreeNode};
use codetext_core::walker;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::{TempDir, tempdir};

fn write(root: &Path, relative: &str, contents: &[u8]) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn options_with(patterns: &[&str]) -> PipelineOptions {
    PipelineOptions {
        cli_patterns: patterns.iter().map(|p| p.to_string()).collect(),
        use_defaults: false,
        ..PipelineOptions::default()
    }
}

fn run_text(root: &Path, options: &PipelineOptions) -> String {
    let report = pipeline::run(root, options, &CancellationToken::new()).unwrap();
    String::from_utf8(report.output).unwrap()
}

fn collect_tree(root: &Path, options: &PipelineOptions) -> DirectoryNode {
    pipeline::collect(root, options, &CancellationToken::new())
        .unwrap()
        .0
}

/// (path, content kind) pairs read back from a text rendering.
fn text_entries(output: &str) -> Vec<(String, String)> {
    let lines: Vec<&str> = output.lines().collect();
    let mut entries = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if line.starts_with(render::FILE_TYPE_PREFIX) && i > 0 && i + 1 < lines.len() {
            let label = lines[i + 1].trim_start_matches(render::CONTENT_PREFIX);
            let kind = label.split(' ').next().unwrap_or_default();
            entries.push((lines[i - 1].to_string(), kind.to_string()));
        }
    }
    entries
}

/// The same pairs read back from a document rendering.
fn document_entries(xml: &str) -> Vec<(String, String)> {
    let document = render::parse_document(xml).unwrap();
    let mut entries = Vec::new();
    let mut current: Option<String> = None;
    for paragraph in document.paragraphs {
        match paragraph.style {
            ParagraphStyle::Heading => current = Some(paragraph.text),
            ParagraphStyle::Label if paragraph.text.starts_with(render::CONTENT_PREFIX) => {
                let label = paragraph.text.trim_start_matches(render::CONTENT_PREFIX);
                let kind = label.split(' ').next().unwrap_or_default().to_string();
                if let Some(path) = current.take() {
                    entries.push((path, kind));
                }
            }
            _ => {}
        }
    }
    entries
}

fn sample_project() -> TempDir {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "README.md", b"# demo\n");
    write(root, "src/main.rs", b"fn main() {}\n");
    write(root, "src/util/mod.rs", b"pub mod x;\n");
    write(root, "assets/logo.png", &[0x89, b'P', b'N', b'G', 0x00, 0x01]);
    write(root, "node_modules/pkg/index.js", b"module.exports = 1;\n");
    write(root, "build/out.txt", b"artifact\n");
    write(root, "notes.log", b"log line\n");
    fs::create_dir_all(root.join("empty/nested")).unwrap();
    dir
}

#[test]
fn excluded_extension_is_absent_and_text_is_literal() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.txt", b"hello");
    write(dir.path(), "b.log", b"should not appear");

    let output = run_text(dir.path(), &options_with(&["*.log"]));
    assert_eq!(
        text_entries(&output),
        vec![("a.txt".to_string(), "text".to_string())]
    );
    assert!(output.contains("Content: text\nhello\n"));
    assert!(!output.contains("b.log"));
    assert!(!output.contains("should not appear"));
}

#[test]
fn excluded_directory_is_never_visited() {
    let dir = tempdir().unwrap();
    write(dir.path(), "node_modules/x.js", b"x");
    write(dir.path(), "index.js", b"y");

    let report = pipeline::run(
        dir.path(),
        &options_with(&["node_modules/"]),
        &CancellationToken::new(),
    )
    .unwrap();
    let output = String::from_utf8(report.output).unwrap();
    assert!(!output.contains("node_modules"));
    assert!(!output.contains("x.js"));
    assert!(report.diagnostics.is_empty());
    assert_eq!(report.excluded, 1);
}

#[test]
fn rule_file_and_caller_patterns_combine() {
    let dir = tempdir().unwrap();
    write(dir.path(), ".exclude", b"*.pyc\n");
    write(dir.path(), "keep.py", b"print(1)\n");
    write(dir.path(), "keep.pyc", b"\x00\x01");
    write(dir.path(), "build/out.txt", b"artifact");

    let mut options = options_with(&["build/", ".exclude"]);
    options.rule_file = Some(dir.path().join(".exclude"));
    let output = run_text(dir.path(), &options);
    assert_eq!(
        text_entries(&output),
        vec![("keep.py".to_string(), "text".to_string())]
    );
}

#[test]
fn binary_file_shows_reason_without_bytes() {
    let dir = tempdir().unwrap();
    write(dir.path(), "image.png", &[0x89, b'P', b'N', b'G', 0xFF, 0xFE, 0x00]);

    let output = run_text(dir.path(), &options_with(&[]));
    assert_eq!(
        text_entries(&output),
        vec![("image.png".to_string(), "binary".to_string())]
    );
    assert!(output.contains("Content: binary (not decodable as text"));
    assert!(!output.contains("PNG"));
}

#[test]
fn hidden_files_excluded_on_request() {
    let dir = tempdir().unwrap();
    write(dir.path(), ".env", b"SECRET=1");
    write(dir.path(), "app.py", b"pass");

    let mut options = options_with(&[]);
    options.exclude_hidden = true;
    let output = run_text(dir.path(), &options);
    assert!(!output.contains(".env"));
    assert!(!output.contains("SECRET"));

    options.exclude_hidden = false;
    assert!(run_text(dir.path(), &options).contains("\n.env\n"));
}

#[test]
fn pruned_tree_is_complete_and_sound() {
    let dir = sample_project();
    let options = PipelineOptions::default();
    let tree = collect_tree(dir.path(), &options);
    let rule_set = pipeline::rules_for(&options);

    fn check(dir: &DirectoryNode, rule_set: &codetext_core::rules::RuleSet) {
        for child in &dir.children {
            match child {
                TreeNode::Directory(sub) => {
                    assert!(!sub.children.is_empty(), "empty dir {}", sub.relative_path);
                    assert!(!rule_set.is_excluded(&sub.relative_path, true));
                    check(sub, rule_set);
                }
                TreeNode::File(file) => {
                    assert!(!rule_set.is_excluded(&file.relative_path, false));
                }
            }
        }
    }
    check(&tree, &rule_set);

    let paths: Vec<&str> = tree.files().iter().map(|f| f.relative_path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["README.md", "assets/logo.png", "src/main.rs", "src/util/mod.rs"]
    );
}

#[test]
fn repeated_runs_are_identical() {
    let dir = sample_project();
    let options = PipelineOptions::default();
    assert_eq!(run_text(dir.path(), &options), run_text(dir.path(), &options));
}

#[test]
fn text_and_document_describe_the_same_files() {
    let dir = sample_project();
    let mut options = PipelineOptions::default();
    let text = run_text(dir.path(), &options);

    options.output_kind = OutputKind::Document;
    let xml = run_text(dir.path(), &options);

    let from_text = text_entries(&text);
    assert_eq!(from_text, document_entries(&xml));
    assert_eq!(
        from_text,
        vec![
            ("README.md".to_string(), "text".to_string()),
            ("assets/logo.png".to_string(), "binary".to_string()),
            ("src/main.rs".to_string(), "text".to_string()),
            ("src/util/mod.rs".to_string(), "text".to_string()),
        ]
    );
}

#[test]
fn json_output_lists_files() {
    let dir = sample_project();
    let mut options = PipelineOptions::default();
    options.output_kind = OutputKind::Json;
    let value: serde_json::Value = serde_json::from_str(&run_text(dir.path(), &options)).unwrap();
    assert_eq!(value["stats"]["files"], 4);
    assert_eq!(value["stats"]["binary"], 1);
}

#[test]
fn oversized_files_are_binary() {
    let dir = tempdir().unwrap();
    write(dir.path(), "big.txt", "x".repeat(2048).as_bytes());
    let mut options = options_with(&[]);
    options.content.max_file_bytes = 1024;
    let tree = collect_tree(dir.path(), &options);
    let file = tree.files()[0];
    assert_eq!(
        file.content.as_ref().map(|c| c.kind()),
        Some(ContentKind::Binary)
    );
}

#[test]
fn root_must_be_a_directory() {
    let dir = tempdir().unwrap();
    write(dir.path(), "plain.txt", b"x");
    let result = pipeline::run(
        &dir.path().join("plain.txt"),
        &options_with(&[]),
        &CancellationToken::new(),
    );
    assert!(matches!(result, Err(AppError::Traversal { .. })));

    let missing = pipeline::run(
        &dir.path().join("missing"),
        &options_with(&[]),
        &CancellationToken::new(),
    );
    assert!(matches!(missing, Err(AppError::Traversal { .. })));
}

#[test]
fn cancelled_run_produces_no_output() {
    let dir = sample_project();
    let token = CancellationToken::new();
    token.cancel();
    let result = pipeline::run(dir.path(), &PipelineOptions::default(), &token);
    assert!(matches!(result, Err(AppError::Cancelled)));
}

#[test]
fn empty_root_renders_headers_only() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("only/empty")).unwrap();
    let output = run_text(dir.path(), &options_with(&[]));
    assert!(output.contains(render::STRUCTURE_HEADER));
    assert!(output.contains(render::CONTENTS_HEADER));
    assert!(text_entries(&output).is_empty());
    assert!(!output.contains("only/"));
}

#[cfg(unix)]
#[test]
fn symlink_loops_are_skipped() {
    use std::os::unix::fs::symlink;

    let dir = tempdir().unwrap();
    write(dir.path(), "a/file.txt", b"inside");
    symlink(dir.path(), dir.path().join("a/loop")).unwrap();

    let rule_set = pipeline::rules_for(&options_with(&[]));
    let outcome = walker::build_tree(dir.path(), &rule_set).unwrap();
    assert!(
        outcome
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::CycleSkipped { link, .. } if link == "a/loop"))
    );
    let paths: Vec<&str> = outcome
        .root
        .files()
        .iter()
        .map(|f| f.relative_path.as_str())
        .collect();
    assert_eq!(paths, vec!["a/file.txt"]);
}

fn file_named<'a>(root: &'a DirectoryNode, relative_path: &str) -> &'a FileNode {
    root.files()
        .into_iter()
        .find(|f| f.relative_path == relative_path)
        .unwrap_or_else(|| panic!("{} missing from tree", relative_path))
}

fn kind_of(root: &DirectoryNode, relative_path: &str) -> Option<ContentKind> {
    file_named(root, relative_path).content.as_ref().map(|c| c.kind())
}

#[test]
fn document_output_keeps_file_text_exactly() {
    let dir = tempdir().unwrap();
    let body = "  leading\r\n\tcol\x1b[0m\x0c\n\n";
    write(dir.path(), "win.txt", body.as_bytes());

    let report = pipeline::run(
        dir.path(),
        &PipelineOptions {
            output_kind: OutputKind::Document,
            ..options_with(&[])
        },
        &CancellationToken::new(),
    )
    .unwrap();
    let xml = String::from_utf8(report.output).unwrap();
    let document = render::parse_document(&xml).unwrap();
    let last = document.paragraphs.last().unwrap();
    assert_eq!(last.style, ParagraphStyle::Preformatted);
    assert_eq!(last.text, body);
}

#[cfg(unix)]
#[test]
fn fifo_is_reported_without_blocking() {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    let dir = tempdir().unwrap();
    write(dir.path(), "a.txt", b"plain");
    let fifo = dir.path().join("pipe");
    let status = std::process::Command::new("mkfifo").arg(&fifo).status().unwrap();
    assert!(status.success());

    let root = dir.path().to_path_buf();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let tree = collect_tree(&root, &options_with(&[]));
        let _ = tx.send(tree);
    });
    let tree = rx
        .recv_timeout(Duration::from_secs(10))
        .expect("walk blocked on the FIFO");

    assert_eq!(
        file_named(&tree, "pipe").content,
        Some(LoadedContent::Unreadable {
            reason: "not a regular file".to_string()
        })
    );
    assert_eq!(kind_of(&tree, "a.txt"), Some(ContentKind::Text));
}

#[cfg(unix)]
#[test]
fn dangling_symlink_becomes_unreadable_entry() {
    use std::os::unix::fs::symlink;

    let dir = tempdir().unwrap();
    write(dir.path(), "ok.txt", b"fine");
    symlink("missing", dir.path().join("dangling")).unwrap();

    let tree = collect_tree(dir.path(), &options_with(&[]));
    let paths: Vec<&str> = tree.files().iter().map(|f| f.relative_path.as_str()).collect();
    assert_eq!(paths, vec!["dangling", "ok.txt"]);
    assert_eq!(
        kind_of(&tree, "dangling"),
        Some(ContentKind::Unreadable)
    );
    assert_eq!(kind_of(&tree, "ok.txt"), Some(ContentKind::Text));
}

#[cfg(unix)]
#[test]
fn locked_directory_is_kept_and_reported() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    write(dir.path(), "locked/secret.txt", b"hidden");
    write(dir.path(), "open.txt", b"visible");
    let locked = dir.path().join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read_dir(&locked).is_ok() {
        // Permission bits do not apply to root.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let rule_set = pipeline::rules_for(&options_with(&[]));
    let outcome = walker::build_tree(dir.path(), &rule_set);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    let outcome = outcome.unwrap();

    let marked = outcome.root.children.iter().any(|child| {
        matches!(child, TreeNode::Directory(d) if d.name == "locked" && d.unreadable.is_some())
    });
    assert!(marked);
    assert!(
        outcome
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::UnreadableDirectory { path, .. } if path == "locked"))
    );
    let paths: Vec<&str> = outcome
        .root
        .files()
        .iter()
        .map(|f| f.relative_path.as_str())
        .collect();
    assert_eq!(paths, vec!["open.txt"]);
}

#[cfg(unix)]
#[test]
fn link_inside_root_is_skipped_whichever_sorts_first() {
    use std::os::unix::fs::symlink;

    for link_name in ["alink", "zlink"] {
        let dir = tempdir().unwrap();
        write(dir.path(), "real/f.txt", b"once");
        symlink(dir.path().join("real"), dir.path().join(link_name)).unwrap();

        let rule_set = pipeline::rules_for(&options_with(&[]));
        let outcome = walker::build_tree(dir.path(), &rule_set).unwrap();
        let paths: Vec<&str> = outcome
            .root
            .files()
            .iter()
            .map(|f| f.relative_path.as_str())
            .collect();
        assert_eq!(paths, vec!["real/f.txt"], "link named {}", link_name);
        assert!(matches!(
            outcome.diagnostics.as_slice(),
            [Diagnostic::CycleSkipped { link, .. }] if link == link_name
        ));
    }
}

#[cfg(unix)]
#[test]
fn outside_directory_is_walked_once_through_links() {
    use std::os::unix::fs::symlink;

    let outside = tempdir().unwrap();
    write(outside.path(), "shared.txt", b"shared");
    let dir = tempdir().unwrap();
    write(dir.path(), "keep.txt", b"keep");
    symlink(outside.path(), dir.path().join("first")).unwrap();
    symlink(outside.path(), dir.path().join("second")).unwrap();

    let rule_set = pipeline::rules_for(&options_with(&[]));
    let outcome = walker::build_tree(dir.path(), &rule_set).unwrap();
    let paths: Vec<&str> = outcome
        .root
        .files()
        .iter()
        .map(|f| f.relative_path.as_str())
        .collect();
    assert_eq!(paths, vec!["first/shared.txt", "keep.txt"]);
    assert!(matches!(
        outcome.diagnostics.as_slice(),
        [Diagnostic::CycleSkipped { link, .. }] if link == "second"
    ));
}
