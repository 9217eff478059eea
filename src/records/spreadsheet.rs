//! Flat spreadsheet of catalogued cards.
//!
//! Append-only, one row per card. Opened per write so rows written before a
//! crash are kept.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use super::ResolvedRecord;

pub const SHEET_HEADER: [&str; 5] = ["Category", "Types or Trainer Type", "Name", "Set Code", "Card Number"];

/// Writes the header if the file is missing or empty; existing rows are kept.
pub fn init_sheet(path: &Path) -> Result<()> {
    if path.exists() {
        let file = File::open(path).context("Failed to open existing spreadsheet")?;
        if BufReader::new(file).lines().next().is_some() {
            return Ok(());
        }
    }

    let mut file = File::create(path).context("Failed to create spreadsheet")?;
    writeln!(file, "{}", csv_row(&SHEET_HEADER)).context("Failed to write spreadsheet header")?;
    Ok(())
}

pub fn append_row(path: &Path, record: &ResolvedRecord) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context("Failed to open spreadsheet for append")?;

    let line = csv_row(&[
        record.category.as_str(),
        record.types_or_trainer_type.as_deref().unwrap_or(""),
        record.name.as_str(),
        record.set_code.as_str(),
        record.card_number.as_str(),
    ]);
    writeln!(file, "{}", line).context("Failed to write spreadsheet row")?;
    Ok(())
}

/// Joins fields with commas, quoting any that need it.
pub fn csv_row(fields: &[&str]) -> String {
    fields.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(",")
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
