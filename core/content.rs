use crate::cancel::CancellationToken;
use crate::error::{AppError, Result};
use crate::tree::{DirectoryNode, FileNode, LoadedContent};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::Read;

pub const DEFAULT_MAX_FILE_BYTES: u64 = 4 * 1024 * 1024;
pub const MAX_WORKERS: usize = 12;
/// How much of a file is scanned for NUL bytes before trying UTF-8.
const SNIFF_LEN: usize = 8000;
const ATTEMPTED_ENCODINGS: &str = "utf-8, utf-16le, utf-16be";
const NOT_REGULAR: &str = "not a regular file";

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentOptions {
    /// Files larger than this are classified binary without being read.
    pub max_file_bytes: u64,
    /// Size of the reader pool.
    pub jobs: usize,
}

impl Default for ContentOptions {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            jobs: default_jobs(),
        }
    }
}

pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_WORKERS)
}

fn too_large(len: u64, limit: u64) -> LoadedContent {
    LoadedContent::Binary {
        reason: format!("too large ({} bytes, limit {} bytes)", len, limit),
    }
}

/// Loads and classifies one file. Never fails: I/O problems become
/// [`LoadedContent::Unreadable`].
pub fn load_content(file: &FileNode, options: &ContentOptions) -> LoadedContent {
    if let Some(existing) = &file.content {
        return existing.clone();
    }

    // FIFOs, sockets and devices can block on open or never reach EOF.
    match fs::metadata(&file.absolute_path) {
        Ok(meta) if !meta.is_file() => {
            log::debug!("Skipping non-regular file: {}", file.relative_path);
            return LoadedContent::Unreadable {
                reason: NOT_REGULAR.to_string(),
            };
        }
        Ok(_) => {}
        Err(e) => {
            log::warn!("Could not stat {}: {}", file.relative_path, e);
            return LoadedContent::Unreadable {
                reason: e.to_string(),
            };
        }
    }

    let handle = match File::open(&file.absolute_path) {
        Ok(handle) => handle,
        Err(e) => {
            log::warn!("Could not open {}: {}", file.relative_path, e);
            return LoadedContent::Unreadable {
                reason: e.to_string(),
            };
        }
    };
    let len = handle
        .metadata()
        .map(|m| m.len())
        .unwrap_or(file.size_bytes);
    if len > options.max_file_bytes {
        log::debug!("Skipping oversized file: {} ({} bytes)", file.relative_path, len);
        return too_large(len, options.max_file_bytes);
    }

    let mut bytes = Vec::with_capacity(len as usize);
    if let Err(e) = handle
        .take(options.max_file_bytes.saturating_add(1))
        .read_to_end(&mut bytes)
    {
        log::warn!("Could not read {}: {}", file.relative_path, e);
        return LoadedContent::Unreadable {
            reason: e.to_string(),
        };
    }
    // The file may have grown since it was stat'ed.
    if bytes.len() as u64 > options.max_file_bytes {
        return too_large(bytes.len() as u64, options.max_file_bytes);
    }

    let content = decode_bytes(bytes);
    if let LoadedContent::Binary { reason } = &content {
        log::debug!("Binary file: {} ({})", file.relative_path, reason);
    }
    content
}

/// UTF-8 first, then UTF-16 when a byte-order mark says so; anything else is binary.
pub fn decode_bytes(bytes: Vec<u8>) -> LoadedContent {
    let decoded = if let Some(body) = bytes.strip_prefix(UTF8_BOM) {
        std::str::from_utf8(body).ok().map(str::to_string)
    } else if let Some(body) = bytes.strip_prefix(UTF16LE_BOM) {
        decode_utf16(body, u16::from_le_bytes)
    } else if let Some(body) = bytes.strip_prefix(UTF16BE_BOM) {
        decode_utf16(body, u16::from_be_bytes)
    } else if bytes[..bytes.len().min(SNIFF_LEN)].contains(&0) {
        return LoadedContent::Binary {
            reason: format!("NUL byte in first {} bytes", SNIFF_LEN),
        };
    } else {
        String::from_utf8(bytes).ok()
    };

    let Some(value) = decoded else {
        return LoadedContent::Binary {
            reason: format!("not decodable as text (tried {})", ATTEMPTED_ENCODINGS),
        };
    };
    // Characters no text output can carry verbatim.
    if let Some(offset) = value.find(['\0', '\u{FFFE}', '\u{FFFF}']) {
        let code = value[offset..].chars().next().map_or(0, u32::from);
        return LoadedContent::Binary {
            reason: format!("contains U+{:04X} at byte {}", code, offset),
        };
    }
    LoadedContent::Text { value }
}

fn decode_utf16(body: &[u8], unit: fn([u8; 2]) -> u16) -> Option<String> {
    if body.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).ok()
}

/// Attaches content to every file in `tree` using a pool of `options.jobs`
/// readers. Files keep their traversal order since each result is written
/// back into its own node.
pub fn load_contents(
    mut tree: DirectoryNode,
    options: &ContentOptions,
    cancel: &CancellationToken,
) -> Result<DirectoryNode> {
    let jobs = options.jobs.max(1);
    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;

    let files = tree.files_mut();
    log::info!("Reading content for {} files with {} workers...", files.len(), jobs);
    pool.install(|| {
        files.into_par_iter().for_each(|file| {
            if cancel.is_cancelled() {
                return;
            }
            file.content = Some(load_content(file, options));
        })
    });

    if cancel.is_cancelled() {
        log::info!("Content loading cancelled");
        return Err(AppError::Cancelled);
    }

    let stats = tree.stats();
    log::info!(
        "File reading complete: {} text, {} binary, {} unreadable.",
        stats.text,
        stats.binary,
        stats.unreadable
    );
    Ok(tree)
}
