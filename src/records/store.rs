//! JSON-lines record store.
//!
//! One record per line, appended and flushed per card so a crash loses at
//! most the card in flight. Files holding a single JSON array of records
//! are still readable.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::ResolvedRecord;

pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &ResolvedRecord) -> Result<()> {
        let line = serde_json::to_string(record).context("Failed to serialize record")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open record store {}", self.path.display()))?;
        writeln!(file, "{}", line).context("Failed to write record")?;
        file.flush()?;
        Ok(())
    }

    /// All records in insertion order. A missing store is an empty collection.
    pub fn read_all(&self) -> Result<Vec<ResolvedRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read record store {}", self.path.display()))?;
        if content.trim_start().starts_with('[') {
            return Ok(parse_array(&content));
        }

        let file = File::open(&self.path)?;
        let mut records = Vec::new();
        for (line_num, line_result) in BufReader::new(file).lines().enumerate() {
            let line = line_result.context("Failed to read line from record store")?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ResolvedRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = line_num + 1, error = %e, "Skipping malformed record"),
            }
        }
        Ok(records)
    }
}

fn parse_array(content: &str) -> Vec<ResolvedRecord> {
    let values: Vec<serde_json::Value> = match serde_json::from_str(content) {
        Ok(values) => values,
        Err(e) => {
            warn!(error = %e, "Record store is not a valid JSON array");
            return Vec::new();
        }
    };

    values
        .into_iter()
        .enumerate()
        .filter_map(|(i, value)| match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(index = i, error = %e, "Skipping malformed record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::sample_record;
    use tempfile::tempdir;

    #[test]
    fn test_missing_store_is_empty() {
        let dir = tempdir().unwrap();
        let store = RecordStore::new(&dir.path().join("none.jsonl"));
        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_reads_back_in_insertion_order() {
        let dir = tempdir().unwrap();
        let store = RecordStore::new(&dir.path().join("cards.jsonl"));
        let records = vec![
            sample_record("Bulbasaur", "SVI", "001/198", Some("Grass")),
            sample_record("Pikachu", "PAL", "063/193", Some("Lightning")),
            sample_record("Bulbasaur", "SVI", "001/198", Some("Grass")),
        ];
        for record in &records {
            store.append(record).unwrap();
        }

        assert_eq!(store.read_all().unwrap(), records);
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cards.jsonl");
        let store = RecordStore::new(&path);
        store.append(&sample_record("Pikachu", "PAL", "063/193", None)).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{\"name\": null}}").unwrap();

        assert_eq!(store.read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_reads_legacy_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("my_cards.json");
        std::fs::write(
            &path,
            r#"[
                {"category": "Pokemon", "name": "Charmander", "card_id": "004", "set_code": "SVI",
                 "card_number": "004/198", "types_or_trainer_type": "Fire", "image_url": null,
                 "tcgDexSet": "sv01"},
                {"category": "Trainer", "name": null}
            ]"#,
        )
        .unwrap();

        let records = RecordStore::new(&path).read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].resolved_set_id, "sv01");
    }
}
