pub mod azure;
pub mod resolve;
pub mod tesseract;

pub use azure::AzureReader;
pub use resolve::{IdentifierResolver, Resolution, ResolvedIdentifier, SkipReason};
pub use tesseract::TesseractReader;

use image::RgbImage;
use std::time::Duration;

use crate::config::{OcrBackend, OcrConfig};
use crate::retry::{RetryPolicy, Transient};

/// One recognised line of text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLine {
    pub text: String,
    /// Mean word confidence, when the engine reports one
    pub confidence: Option<f32>,
}

/// A block of lines the engine grouped together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<TextLine>,
}

/// Everything an engine read from one image, in reading order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadResult {
    pub blocks: Vec<TextBlock>,
}

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("OCR authentication failed (HTTP {0})")]
    Authentication(u16),
    #[error("OCR rate limit exceeded")]
    RateLimited,
    #[error("OCR request rejected (HTTP {0}): {1}")]
    Rejected(u16, String),
    #[error("malformed OCR response: {0}")]
    Malformed(String),
    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
    #[error("OCR engine failed: {0}")]
    Engine(String),
    #[error("OCR is not configured: {0}")]
    NotConfigured(String),
}

impl OcrError {
    /// Failures of the remote service itself, as opposed to bad input.
    pub fn is_service_failure(&self) -> bool {
        matches!(
            self,
            OcrError::ServiceUnavailable(_) | OcrError::Authentication(_) | OcrError::RateLimited
        )
    }
}

impl Transient for OcrError {
    fn is_transient(&self) -> bool {
        matches!(self, OcrError::ServiceUnavailable(_) | OcrError::RateLimited)
    }
}

/// An OCR engine that reads line-level text from an image.
pub trait TextRecognizer {
    fn read(&self, image: &RgbImage) -> Result<ReadResult, OcrError>;
}

/// Text Extractor: one recogniser call (with retry) reduced to a single string.
pub struct TextExtractor {
    recognizer: Box<dyn TextRecognizer>,
    retry: RetryPolicy,
}

impl TextExtractor {
    pub fn new(recognizer: Box<dyn TextRecognizer>, retry: RetryPolicy) -> Self {
        Self { recognizer, retry }
    }

    /// Returns the first block's lines joined by spaces; empty when nothing was read.
    pub fn extract(&self, image: &RgbImage) -> Result<String, OcrError> {
        let result = self.retry.run("ocr", || self.recognizer.read(image))?;
        for (b, block) in result.blocks.iter().enumerate() {
            for line in &block.lines {
                tracing::debug!(block = b, confidence = ?line.confidence, "read {:?}", line.text);
            }
        }
        Ok(first_block_text(&result))
    }
}

pub fn first_block_text(result: &ReadResult) -> String {
    let Some(block) = result.blocks.first() else {
        tracing::info!("No text blocks found in the image.");
        return String::new();
    };
    block
        .lines
        .iter()
        .map(|line| line.text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds the recogniser selected in the configuration.
pub fn build_recognizer(config: &OcrConfig, timeout: Duration) -> Result<Box<dyn TextRecognizer>, OcrError> {
    match config.backend {
        OcrBackend::Azure => {
            let endpoint = config.resolved_endpoint().ok_or_else(|| {
                OcrError::NotConfigured("set ocr.endpoint or VISION_ENDPOINT".to_string())
            })?;
            let key = config
                .resolved_key()
                .ok_or_else(|| OcrError::NotConfigured("set ocr.key or VISION_KEY".to_string()))?;
            Ok(Box::new(AzureReader::new(&endpoint, &key, timeout)?))
        }
        OcrBackend::Tesseract => Ok(Box::new(TesseractReader::new(config.tesseract_path.clone()))),
    }
}

/// JPEG bytes for upload.
pub(crate) fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut bytes = Vec::new();
    image.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Jpeg)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn line(text: &str) -> TextLine {
        TextLine {
            text: text.to_string(),
            confidence: None,
        }
    }

    #[test]
    fn test_first_block_only() {
        let result = ReadResult {
            blocks: vec![
                TextBlock {
                    lines: vec![line("Bulbasaur"), line("SVI EN 001/198")],
                },
                TextBlock {
                    lines: vec![line("ignored")],
                },
            ],
        };
        assert_eq!(first_block_text(&result), "Bulbasaur SVI EN 001/198");
    }

    #[test]
    fn test_no_blocks_is_empty_text() {
        assert_eq!(first_block_text(&ReadResult::default()), "");
    }

    struct FlakyReader {
        failures_left: Cell<u32>,
    }

    impl TextRecognizer for FlakyReader {
        fn read(&self, _image: &RgbImage) -> Result<ReadResult, OcrError> {
            if self.failures_left.get() > 0 {
                self.failures_left.set(self.failures_left.get() - 1);
                return Err(OcrError::ServiceUnavailable("503".to_string()));
            }
            Ok(ReadResult {
                blocks: vec![TextBlock {
                    lines: vec![line("PAL 010/193")],
                }],
            })
        }
    }

    #[test]
    fn test_extract_retries_unavailable_service() {
        let extractor = TextExtractor::new(
            Box::new(FlakyReader {
                failures_left: Cell::new(2),
            }),
            RetryPolicy {
                max_retries: 2,
                ..RetryPolicy::no_retry()
            },
        );
        assert_eq!(extractor.extract(&RgbImage::new(4, 4)).unwrap(), "PAL 010/193");
    }

    #[test]
    fn test_authentication_is_not_transient() {
        assert!(!OcrError::Authentication(401).is_transient());
        assert!(OcrError::Authentication(401).is_service_failure());
        assert!(!OcrError::Malformed("x".into()).is_service_failure());
    }

    #[test]
    fn test_encode_jpeg_magic() {
        let bytes = encode_jpeg(&RgbImage::new(8, 8)).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
