use image::RgbImage;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use super::{OcrError, ReadResult, TextBlock, TextLine, TextRecognizer};

/// Offline recogniser backed by a local Tesseract install.
pub struct TesseractReader {
    executable: PathBuf,
}

impl TesseractReader {
    pub fn new(executable: PathBuf) -> Self {
        Self { executable }
    }
}

impl TextRecognizer for TesseractReader {
    fn read(&self, image: &RgbImage) -> Result<ReadResult, OcrError> {
        let temp_input = NamedTempFile::with_suffix(".png").map_err(|e| OcrError::Engine(e.to_string()))?;
        image.save(temp_input.path())?;

        // Automatic page segmentation so blocks are reported separately
        let output = Command::new(&self.executable)
            .arg(temp_input.path())
            .arg("stdout")
            .arg("-l")
            .arg("eng")
            .arg("--psm")
            .arg("3")
            .arg("tsv")
            .output()
            .map_err(|e| OcrError::Engine(format!("cannot run {}: {}", self.executable.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(stderr.trim().to_string()));
        }

        Ok(parse_tsv_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Accumulates the words of one line.
struct LineBuilder {
    key: (u32, u32, u32),
    words: Vec<String>,
    conf_sum: f32,
}

impl LineBuilder {
    fn finish(self) -> TextLine {
        let count = self.words.len();
        TextLine {
            text: self.words.join(" "),
            // Tesseract reports 0-100, normalised to 0-1
            confidence: Some(self.conf_sum / count as f32 / 100.0),
        }
    }
}

/// Groups TSV word rows into blocks of lines.
fn parse_tsv_output(tsv: &str) -> ReadResult {
    let mut blocks: Vec<TextBlock> = Vec::new();
    let mut last_block: Option<u32> = None;
    let mut current: Option<LineBuilder> = None;

    for row in tsv.lines().skip(1) {
        // TSV fields: level, page_num, block_num, par_num, line_num, word_num,
        //             left, top, width, height, conf, text
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        let level: i32 = fields[0].parse().unwrap_or(-1);
        let conf: f32 = fields[10].parse().unwrap_or(-1.0);
        let text = fields[11].trim();
        if level != 5 || text.is_empty() || conf < 0.0 {
            continue;
        }

        let parse = |s: &str| s.parse::<u32>().unwrap_or(0);
        let key = (parse(fields[2]), parse(fields[3]), parse(fields[4]));

        match current.as_mut() {
            Some(line) if line.key == key => {
                line.words.push(text.to_string());
                line.conf_sum += conf;
            }
            _ => {
                if let Some(done) = current.take() {
                    push_line(&mut blocks, &mut last_block, done);
                }
                current = Some(LineBuilder {
                    key,
                    words: vec![text.to_string()],
                    conf_sum: conf,
                });
            }
        }
    }

    if let Some(done) = current {
        push_line(&mut blocks, &mut last_block, done);
    }

    ReadResult { blocks }
}

fn push_line(blocks: &mut Vec<TextBlock>, last_block: &mut Option<u32>, line: LineBuilder) {
    let block_num = line.key.0;
    if *last_block != Some(block_num) {
        blocks.push(TextBlock::default());
        *last_block = Some(block_num);
    }
    if let Some(block) = blocks.last_mut() {
        block.lines.push(line.finish());
    }
}
