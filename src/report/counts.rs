//! Aggregate counts of identical cards.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::records::spreadsheet::csv_row;
use crate::records::ResolvedRecord;

pub const REPORT_HEADER: [&str; 5] = ["count", "name", "set_code", "card_number", "type"];

/// How many copies of one card the collection holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardCount {
    pub count: u32,
    pub name: String,
    pub set_code: String,
    pub card_number: String,
    pub card_type: Option<String>,
}

/// Groups records by (name, set_code, card_number, type).
///
/// Rows are ordered by type (untyped cards last), then name, set code and
/// card number, so the same records always give the same report.
pub fn count_cards(records: &[ResolvedRecord]) -> Vec<CardCount> {
    let mut groups: HashMap<(&str, &str, &str, Option<&str>), u32> = HashMap::new();
    for record in records {
        let key = (
            record.name.as_str(),
            record.set_code.as_str(),
            record.card_number.as_str(),
            record.types_or_trainer_type.as_deref(),
        );
        *groups.entry(key).or_insert(0) += 1;
    }

    let mut counts: Vec<CardCount> = groups
        .into_iter()
        .map(|((name, set_code, card_number, card_type), count)| CardCount {
            count,
            name: name.to_string(),
            set_code: set_code.to_string(),
            card_number: card_number.to_string(),
            card_type: card_type.map(str::to_string),
        })
        .collect();

    counts.sort_by(|a, b| {
        (a.card_type.is_none(), &a.card_type, &a.name, &a.set_code, &a.card_number).cmp(&(
            b.card_type.is_none(),
            &b.card_type,
            &b.name,
            &b.set_code,
            &b.card_number,
        ))
    });
    counts
}

pub fn write_counts_csv(counts: &[CardCount], path: &Path) -> Result<()> {
    let mut file = File::create(path).context(format!("Failed to create {}", path.display()))?;
    writeln!(file, "{}", csv_row(&REPORT_HEADER))?;
    for row in counts {
        let count = row.count.to_string();
        writeln!(
            file,
            "{}",
            csv_row(&[
                count.as_str(),
                row.name.as_str(),
                row.set_code.as_str(),
                row.card_number.as_str(),
                row.card_type.as_deref().unwrap_or(""),
            ])
        )?;
    }
    Ok(())
}
