use std::path::{Path, PathBuf};

/// Returns the logs directory: `<cwd>/logs/`
pub fn get_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

/// Candidate config files, in lookup order.
pub fn config_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from("config.json")];
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("cardscan").join("config.json"));
    }
    candidates
}

/// Returns the captures directory: `<output>/captures/`
pub fn get_captures_dir(output_dir: &Path) -> PathBuf {
    output_dir.join("captures")
}

/// Structured record store: `<output>/my_cards.jsonl`
pub fn get_record_store_path(output_dir: &Path) -> PathBuf {
    output_dir.join("my_cards.jsonl")
}

/// Spreadsheet mirror of the record store: `<output>/my_cards.csv`
pub fn get_spreadsheet_path(output_dir: &Path) -> PathBuf {
    output_dir.join("my_cards.csv")
}

/// Preview image written during motion detection: `<output>/preview.jpg`
pub fn get_preview_path(output_dir: &Path) -> PathBuf {
    output_dir.join("preview.jpg")
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories(output_dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    std::fs::create_dir_all(output_dir)?;
    std::fs::create_dir_all(get_captures_dir(output_dir))?;
    Ok(())
}
