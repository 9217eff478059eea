//! Collection report.
//!
//! This module provides:
//! - Counting identical cards in the record store
//! - CSV and xlsx exports of the counts
//! - A per-type bar chart

pub mod chart;
pub mod counts;
pub mod xlsx;

pub use counts::{count_cards, CardCount};

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::records::RecordStore;
use xlsx::Cell;

#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub csv: PathBuf,
    pub xlsx: PathBuf,
    /// Absent when the collection is empty or the chart failed to render
    pub chart: Option<PathBuf>,
}

/// Reads the record store and writes every report output into `output_dir`.
///
/// Returns the output paths and the number of records read.
pub fn generate_report(store: &RecordStore, output_dir: &Path) -> Result<(ReportPaths, usize)> {
    let records = store.read_all()?;
    info!("Loaded {} records from {}", records.len(), store.path().display());

    let counts = count_cards(&records);

    let csv_path = output_dir.join("card_counts.csv");
    counts::write_counts_csv(&counts, &csv_path)?;
    info!("Counts CSV saved: {}", csv_path.display());

    let xlsx_path = output_dir.join("card_counts.xlsx");
    let rows: Vec<Vec<Cell>> = counts
        .iter()
        .map(|row| {
            vec![
                Cell::Number(row.count as f64),
                Cell::Text(row.name.clone()),
                Cell::Text(row.set_code.clone()),
                Cell::Text(row.card_number.clone()),
                row.card_type.clone().map(Cell::Text).unwrap_or(Cell::Empty),
            ]
        })
        .collect();
    xlsx::write_xlsx(&xlsx_path, "Card Counts", &counts::REPORT_HEADER, &rows)?;
    info!("Counts workbook saved: {}", xlsx_path.display());

    let totals = chart::type_totals(&counts);
    let chart_path = output_dir.join("card_counts.png");
    let chart = if totals.is_empty() {
        None
    } else {
        match chart::draw_type_chart(&totals, &chart_path) {
            Ok(()) => {
                info!("Chart saved: {}", chart_path.display());
                Some(chart_path)
            }
            Err(e) => {
                warn!("Failed to draw chart: {:#}", e);
                None
            }
        }
    };

    Ok((
        ReportPaths {
            csv: csv_path,
            xlsx: xlsx_path,
            chart,
        },
        records.len(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::sample_record;
    use tempfile::tempdir;

    #[test]
    fn test_empty_store_gives_header_only() {
        let dir = tempdir().unwrap();
        let store = RecordStore::new(&dir.path().join("my_cards.jsonl"));

        let (paths, total) = generate_report(&store, dir.path()).unwrap();

        assert_eq!(total, 0);
        assert!(paths.chart.is_none());
        assert_eq!(
            std::fs::read_to_string(&paths.csv).unwrap(),
            "count,name,set_code,card_number,type\n"
        );
        assert!(paths.xlsx.exists());
    }

    #[test]
    fn test_rerun_is_identical() {
        let dir = tempdir().unwrap();
        let store = RecordStore::new(&dir.path().join("my_cards.jsonl"));
        for record in [
            sample_record("Pikachu", "PAL", "063/193", Some("Lightning")),
            sample_record("Bulbasaur", "SVI", "001/198", Some("Grass")),
            sample_record("Pikachu", "PAL", "063/193", Some("Lightning")),
        ] {
            store.append(&record).unwrap();
        }

        let (paths, total) = generate_report(&store, dir.path()).unwrap();
        let first = std::fs::read_to_string(&paths.csv).unwrap();
        generate_report(&store, dir.path()).unwrap();
        let second = std::fs::read_to_string(&paths.csv).unwrap();

        assert_eq!(total, 3);
        assert_eq!(first, second);
        assert_eq!(first.lines().nth(2), Some("2,Pikachu,PAL,063/193,Lightning"));
    }
}
