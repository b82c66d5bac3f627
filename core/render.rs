use crate::error::{AppError, Result};
use crate::tree::{DirectoryNode, FileNode, LoadedContent, TreeNode, TreeStats};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};

pub const STRUCTURE_HEADER: &str = "Folder Structure";
pub const CONTENTS_HEADER: &str = "File Contents";
pub const FILE_END: &str = "File End";
pub const CONTENT_PREFIX: &str = "Content: ";
pub const FILE_TYPE_PREFIX: &str = "File type: ";
const DELIMITER_WIDTH: usize = 50;
const DOCUMENT_TAG: &str = "document";
const PARAGRAPH_TAG: &str = "paragraph";
const STYLE_ATTR: &str = "style";

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const PIPE: &str = "│   ";
const GAP: &str = "    ";

pub fn delimiter() -> String {
    "-".repeat(DELIMITER_WIDTH)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    #[default]
    Text,
    Document,
    Json,
}

impl OutputKind {
    pub fn extension(self) -> &'static str {
        match self {
            OutputKind::Text => "txt",
            OutputKind::Document => "xml",
            OutputKind::Json => "json",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputKind::Text => "text",
            OutputKind::Document => "document",
            OutputKind::Json => "json",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub json_pretty: bool,
}

/// Ordered paragraphs making up a document-kind output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub style: ParagraphStyle,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParagraphStyle {
    Title,
    Heading,
    Label,
    Preformatted,
}

impl ParagraphStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            ParagraphStyle::Title => "title",
            ParagraphStyle::Heading => "heading",
            ParagraphStyle::Label => "label",
            ParagraphStyle::Preformatted => "preformatted",
        }
    }

    fn from_attr(value: &str) -> Result<Self> {
        match value {
            "title" => Ok(ParagraphStyle::Title),
            "heading" => Ok(ParagraphStyle::Heading),
            "label" => Ok(ParagraphStyle::Label),
            "preformatted" => Ok(ParagraphStyle::Preformatted),
            other => Err(AppError::XmlSerialize(format!(
                "unknown paragraph style '{}'",
                other
            ))),
        }
    }
}

impl Paragraph {
    fn new(style: ParagraphStyle, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonSnapshot<'a> {
    stats: TreeStats,
    root: &'a DirectoryNode,
}

/// One line per node: the root as `name/`, then box-drawing branches.
pub fn structure_lines(root: &DirectoryNode) -> Vec<String> {
    let mut lines = vec![directory_label(root)];
    draw_children(&root.children, "", &mut lines);
    lines
}

fn directory_label(dir: &DirectoryNode) -> String {
    match &dir.unreadable {
        Some(reason) => format!("{}/ [unreadable: {}]", dir.name, reason),
        None => format!("{}/", dir.name),
    }
}

fn draw_children(children: &[TreeNode], prefix: &str, lines: &mut Vec<String>) {
    for (index, child) in children.iter().enumerate() {
        let last = index + 1 == children.len();
        let branch = if last { LAST_BRANCH } else { BRANCH };
        match child {
            TreeNode::Directory(dir) => {
                lines.push(format!("{}{}{}", prefix, branch, directory_label(dir)));
                let nested = format!("{}{}", prefix, if last { GAP } else { PIPE });
                draw_children(&dir.children, &nested, lines);
            }
            TreeNode::File(file) => lines.push(format!("{}{}{}", prefix, branch, file.name)),
        }
    }
}

/// `text`, or the kind followed by the reason the content is absent.
pub fn content_label(file: &FileNode) -> String {
    match &file.content {
        Some(LoadedContent::Text { .. }) => "text".to_string(),
        Some(LoadedContent::Binary { reason }) => format!("binary ({})", reason),
        Some(LoadedContent::Unreadable { reason }) => format!("unreadable ({})", reason),
        None => "unreadable (content not loaded)".to_string(),
    }
}

fn text_value(file: &FileNode) -> Option<&str> {
    match &file.content {
        Some(LoadedContent::Text { value }) => Some(value),
        _ => None,
    }
}

pub fn render_text(root: &DirectoryNode) -> String {
    let delimiter = delimiter();
    let mut out = String::new();
    out.push_str(STRUCTURE_HEADER);
    out.push('\n');
    out.push_str(&delimiter);
    out.push('\n');
    for line in structure_lines(root) {
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str("\n\n");
    out.push_str(CONTENTS_HEADER);
    out.push('\n');
    out.push_str(&delimiter);
    out.push('\n');

    for file in root.files() {
        out.push_str("\n\n");
        out.push_str(&file.relative_path);
        out.push('\n');
        out.push_str(FILE_TYPE_PREFIX);
        out.push_str(&file.extension_label());
        out.push('\n');
        out.push_str(CONTENT_PREFIX);
        out.push_str(&content_label(file));
        out.push('\n');
        if let Some(value) = text_value(file) {
            out.push_str(value);
        }
        out.push_str("\n\n");
        out.push_str(&delimiter);
        out.push('\n');
        out.push_str(FILE_END);
        out.push('\n');
        out.push_str(&delimiter);
        out.push('\n');
    }
    out
}

pub fn build_document(root: &DirectoryNode) -> Document {
    let mut paragraphs = vec![
        Paragraph::new(ParagraphStyle::Title, STRUCTURE_HEADER),
        Paragraph::new(ParagraphStyle::Preformatted, structure_lines(root).join("\n")),
        Paragraph::new(ParagraphStyle::Title, CONTENTS_HEADER),
    ];
    for file in root.files() {
        paragraphs.push(Paragraph::new(ParagraphStyle::Heading, &file.relative_path));
        paragraphs.push(Paragraph::new(
            ParagraphStyle::Label,
            format!("{}{}", FILE_TYPE_PREFIX, file.extension_label()),
        ));
        paragraphs.push(Paragraph::new(
            ParagraphStyle::Label,
            format!("{}{}", CONTENT_PREFIX, content_label(file)),
        ));
        if let Some(value) = text_value(file) {
            paragraphs.push(Paragraph::new(ParagraphStyle::Preformatted, value));
        }
    }
    Document { paragraphs }
}

/// Escapes paragraph text so every character reads back unchanged.
///
/// Control characters, including `\r`, become character references; the
/// document is declared XML 1.1 so C0 references are well-formed. NUL,
/// U+FFFE and U+FFFF never reach here: the content loader classifies them
/// binary.
fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\t' | '\n' => out.push(c),
            // U+0085 and U+2028 are line ends that XML 1.1 readers normalize.
            c if c.is_control() || c == '\u{2028}' => {
                let _ = write!(out, "&#x{:X};", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out
}

pub fn render_document(root: &DirectoryNode) -> Result<String> {
    let document = build_document(root);
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.1", Some("UTF-8"), None)))?;
    writer.write_event(Event::Text(BytesText::from_escaped("\n")))?;
    writer.write_event(Event::Start(BytesStart::new(DOCUMENT_TAG)))?;
    for paragraph in &document.paragraphs {
        let mut start = BytesStart::new(PARAGRAPH_TAG);
        start.push_attribute((STYLE_ATTR, paragraph.style.as_str()));
        writer.write_event(Event::Start(start))?;
        writer.write_event(Event::Text(BytesText::from_escaped(escape_text(
            &paragraph.text,
        ))))?;
        writer.write_event(Event::End(BytesEnd::new(PARAGRAPH_TAG)))?;
    }
    writer.write_event(Event::End(BytesEnd::new(DOCUMENT_TAG)))?;

    String::from_utf8(writer.into_inner())
        .map_err(|e| AppError::XmlSerialize(e.to_string()))
}

/// Reads a document-kind output back into its paragraphs. Paragraph text is
/// kept exactly as written, surrounding whitespace included.
pub fn parse_document(xml: &str) -> Result<Document> {
    let mut reader = Reader::from_str(xml);
    let mut document = Document::default();
    let mut current: Option<Paragraph> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) if start.name().as_ref() == PARAGRAPH_TAG.as_bytes() => {
                current = Some(Paragraph::new(paragraph_style(&start)?, String::new()));
            }
            Event::Empty(start) if start.name().as_ref() == PARAGRAPH_TAG.as_bytes() => {
                document
                    .paragraphs
                    .push(Paragraph::new(paragraph_style(&start)?, String::new()));
            }
            Event::Text(text) => {
                if let Some(paragraph) = current.as_mut() {
                    paragraph.text.push_str(&text.unescape()?);
                }
            }
            Event::End(end) if end.name().as_ref() == PARAGRAPH_TAG.as_bytes() => {
                if let Some(paragraph) = current.take() {
                    document.paragraphs.push(paragraph);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(document)
}

fn paragraph_style(start: &BytesStart<'_>) -> Result<ParagraphStyle> {
    match start
        .try_get_attribute(STYLE_ATTR)
        .map_err(quick_xml::Error::from)?
    {
        Some(attr) => ParagraphStyle::from_attr(&attr.unescape_value()?),
        None => Err(AppError::XmlSerialize(
            "paragraph without a style attribute".to_string(),
        )),
    }
}

pub fn render_json(root: &DirectoryNode, pretty: bool) -> Result<String> {
    let snapshot = JsonSnapshot {
        stats: root.stats(),
        root,
    };
    let json = if pretty {
        serde_json::to_string_pretty(&snapshot)?
    } else {
        serde_json::to_string(&snapshot)?
    };
    Ok(json)
}

pub fn serialize(root: &DirectoryNode, kind: OutputKind) -> Result<Vec<u8>> {
    serialize_with_options(root, kind, &RenderOptions::default())
}

/// Renders the whole tree into one in-memory buffer.
pub fn serialize_with_options(
    root: &DirectoryNode,
    kind: OutputKind,
    options: &RenderOptions,
) -> Result<Vec<u8>> {
    log::debug!("Serializing tree as {}", kind);
    let rendered = match kind {
        OutputKind::Text => render_text(root),
        OutputKind::Document => render_document(root)?,
        OutputKind::Json => render_json(root, options.json_pretty)?,
    };
    log::debug!("Serialized {} bytes", rendered.len());
    Ok(rendered.into_bytes())
}
