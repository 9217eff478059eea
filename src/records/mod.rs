//! Persistence of resolved cards.
//!
//! Every recognised card is appended to two places:
//! - a structured JSON-lines store, the source of truth for reports
//! - a flat spreadsheet for people to open directly

pub mod spreadsheet;
pub mod store;

pub use store::RecordStore;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::catalog::CatalogCard;
use crate::ocr::ResolvedIdentifier;

/// One catalogued card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRecord {
    pub category: String,
    pub name: String,
    pub card_id: String,
    pub set_code: String,
    pub card_number: String,
    #[serde(default)]
    pub types_or_trainer_type: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(rename = "tcgDexSet", alias = "resolved_set_id")]
    pub resolved_set_id: String,
}

impl ResolvedRecord {
    pub fn new(identifier: &ResolvedIdentifier, card: CatalogCard) -> Self {
        Self {
            category: card.category,
            name: card.name,
            card_id: identifier.card_id.clone(),
            set_code: identifier.set_code.clone(),
            card_number: identifier.card_number.clone(),
            types_or_trainer_type: card.types_or_trainer_type,
            image_url: card.image_url,
            resolved_set_id: identifier.resolved_set_id.clone(),
        }
    }
}

/// Record Sink: the store plus the spreadsheet, written together.
pub struct RecordSink {
    store: RecordStore,
    sheet_path: PathBuf,
}

impl RecordSink {
    pub fn open(store_path: &Path, sheet_path: &Path) -> Result<Self> {
        spreadsheet::init_sheet(sheet_path)?;
        Ok(Self {
            store: RecordStore::new(store_path),
            sheet_path: sheet_path.to_path_buf(),
        })
    }

    /// Appends to the store, then the spreadsheet.
    ///
    /// Only a store failure is an error: once the store holds the record the
    /// card is recorded, and a spreadsheet failure is logged.
    pub fn append(&self, record: &ResolvedRecord) -> Result<()> {
        self.store.append(record)?;
        if let Err(e) = spreadsheet::append_row(&self.sheet_path, record) {
            warn!(
                path = %self.sheet_path.display(),
                "Spreadsheet row not written for {} {}: {:#}",
                record.name,
                record.card_number,
                e
            );
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample_record(name: &str, set_code: &str, card_number: &str, kind: Option<&str>) -> ResolvedRecord {
    ResolvedRecord {
        category: "Pokemon".to_string(),
        name: name.to_string(),
        card_id: card_number.split('/').next().unwrap_or_default().to_string(),
        set_code: set_code.to_string(),
        card_number: card_number.to_string(),
        types_or_trainer_type: kind.map(str::to_string),
        image_url: None,
        resolved_set_id: "sv01".to_string(),
    }
}
