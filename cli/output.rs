use anyhow::{Context, Result};
use byte_unit::{Byte, UnitType};
use codetext_core::{Diagnostic, Report, RuleSet};
use colored::*;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

pub fn write_to_file(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let mut file =
        File::create(path).with_context(|| format!("Failed to create file {}", path.display()))?;
    file.write_all(content)
        .with_context(|| format!("Failed to write to file {}", path.display()))?;
    Ok(())
}

pub fn write_to_stdout(content: &[u8]) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(content)
        .context("Failed to write to stdout")?;
    if !content.ends_with(b"\n") {
        handle
            .write_all(b"\n")
            .context("Failed to write newline to stdout")?;
    }
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}

fn readable_size(bytes: u64) -> String {
    Byte::from_u64(bytes)
        .get_appropriate_unit(UnitType::Binary)
        .to_string()
}

/// Run summary on stderr, so it never mixes with an artifact on stdout.
pub fn print_summary(report: &Report, destination: Option<&Path>) {
    let stats = &report.stats;
    eprintln!();
    eprintln!("{}", " Conversion Summary ".green().bold().underline());
    eprintln!(
        "{:<20} {}",
        "Files:".green(),
        stats.files.to_string().cyan()
    );
    eprintln!(
        "{:<20} {} text, {} binary, {} unreadable",
        "Content:".green(),
        stats.text.to_string().cyan(),
        stats.binary.to_string().yellow(),
        stats.unreadable.to_string().red()
    );
    eprintln!(
        "{:<20} {}",
        "Directories:".green(),
        stats.directories.to_string().cyan()
    );
    eprintln!(
        "{:<20} {}",
        "Input size:".green(),
        readable_size(stats.total_bytes).cyan()
    );
    eprintln!(
        "{:<20} {} (via {} rules)",
        "Excluded:".green(),
        report.excluded.to_string().cyan(),
        report.rule_count
    );
    if let Some(path) = destination {
        eprintln!(
            "{:<20} {} ({})",
            "Saved to:".green(),
            path.display().to_string().blue(),
            readable_size(report.output.len() as u64)
        );
    }
    eprintln!();
}

pub fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{} {}", "Warning:".yellow().bold(), diagnostic);
    }
}

pub fn print_rules_table(rule_set: &RuleSet) {
    if rule_set.is_empty() {
        println!("{}", "(No exclusion rules active)".yellow());
        return;
    }
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::Green),
        Cell::new("Pattern").fg(Color::Green),
        Cell::new("Source").fg(Color::Green),
        Cell::new("Applies to").fg(Color::Green),
    ]);
    for (index, rule) in rule_set.rules().iter().enumerate() {
        let target = match rule.target() {
            codetext_core::RuleTarget::DirectoryOnly => "directories",
            codetext_core::RuleTarget::Any => "any",
        };
        let mut pattern_cell = Cell::new(rule.pattern()).fg(Color::Cyan);
        if rule.glob_error().is_some() {
            pattern_cell = pattern_cell.fg(Color::Red);
        }
        table.add_row(vec![
            Cell::new(index + 1).set_alignment(comfy_table::CellAlignment::Right),
            pattern_cell,
            Cell::new(rule.source().as_str()).fg(Color::DarkGrey),
            Cell::new(target),
        ]);
    }
    println!("{table}");
}
