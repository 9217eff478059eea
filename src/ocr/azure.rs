//! Azure AI Vision image analysis, "read" feature.

use image::RgbImage;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{encode_jpeg, OcrError, ReadResult, TextBlock, TextLine, TextRecognizer};

const API_VERSION: &str = "2023-10-01";
const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

pub struct AzureReader {
    client: Client,
    url: String,
    key: String,
}

impl AzureReader {
    pub fn new(endpoint: &str, key: &str, timeout: Duration) -> Result<Self, OcrError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OcrError::NotConfigured(e.to_string()))?;
        Ok(Self {
            client,
            url: analyze_url(endpoint),
            key: key.to_string(),
        })
    }
}

fn analyze_url(endpoint: &str) -> String {
    format!(
        "{}/computervision/imageanalysis:analyze?features=read&api-version={}",
        endpoint.trim_end_matches('/'),
        API_VERSION
    )
}

impl TextRecognizer for AzureReader {
    fn read(&self, image: &RgbImage) -> Result<ReadResult, OcrError> {
        let body = encode_jpeg(image)?;
        debug!(bytes = body.len(), "uploading image for text analysis");

        let response = self
            .client
            .post(&self.url)
            .header(KEY_HEADER, &self.key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .map_err(|e| OcrError::ServiceUnavailable(e.to_string()))?;

        let status = response.status();
        match status.as_u16() {
            401 | 403 => return Err(OcrError::Authentication(status.as_u16())),
            429 => return Err(OcrError::RateLimited),
            code if status.is_server_error() => {
                return Err(OcrError::ServiceUnavailable(format!("HTTP {}", code)));
            }
            code if !status.is_success() => {
                let detail = response.text().unwrap_or_default();
                return Err(OcrError::Rejected(code, detail));
            }
            _ => {}
        }

        let text = response
            .text()
            .map_err(|e| OcrError::ServiceUnavailable(e.to_string()))?;
        parse_analyze_response(&text)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    read_result: Option<ApiReadResult>,
}

#[derive(Deserialize)]
struct ApiReadResult {
    #[serde(default)]
    blocks: Vec<ApiBlock>,
}

#[derive(Deserialize)]
struct ApiBlock {
    #[serde(default)]
    lines: Vec<ApiLine>,
}

#[derive(Deserialize)]
struct ApiLine {
    text: String,
    #[serde(default)]
    words: Vec<ApiWord>,
}

#[derive(Deserialize)]
struct ApiWord {
    confidence: Option<f32>,
}

fn parse_analyze_response(body: &str) -> Result<ReadResult, OcrError> {
    let response: AnalyzeResponse =
        serde_json::from_str(body).map_err(|e| OcrError::Malformed(e.to_string()))?;

    let blocks = response
        .read_result
        .map(|r| r.blocks)
        .unwrap_or_default()
        .into_iter()
        .map(|block| TextBlock {
            lines: block
                .lines
                .into_iter()
                .map(|line| {
                    let scores: Vec<f32> = line.words.iter().filter_map(|w| w.confidence).collect();
                    let confidence = if scores.is_empty() {
                        None
                    } else {
                        Some(scores.iter().sum::<f32>() / scores.len() as f32)
                    };
                    TextLine {
                        text: line.text,
                        confidence,
                    }
                })
                .collect(),
        })
        .collect();

    Ok(ReadResult { blocks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::first_block_text;

    const SAMPLE: &str = r#"{
        "modelVersion": "2023-10-01",
        "metadata": {"width": 630, "height": 880},
        "readResult": {
            "blocks": [
                {"lines": [
                    {"text": "Bulbasaur", "words": [{"text": "Bulbasaur", "confidence": 0.99}]},
                    {"text": "SVI EN 001/198", "words": [
                        {"text": "SVI", "confidence": 0.9},
                        {"text": "EN", "confidence": 0.8},
                        {"text": "001/198", "confidence": 0.7}
                    ]}
                ]},
                {"lines": [{"text": "Illus. Someone", "words": []}]}
            ]
        }
    }"#;

    #[test]
    fn test_parse_blocks_and_lines() {
        let result = parse_analyze_response(SAMPLE).unwrap();
        assert_eq!(result.blocks.len(), 2);
        assert_eq!(result.blocks[0].lines.len(), 2);
        let conf = result.blocks[0].lines[1].confidence.unwrap();
        assert!((conf - 0.8).abs() < 1e-5);
        assert_eq!(result.blocks[1].lines[0].confidence, None);
        assert_eq!(first_block_text(&result), "Bulbasaur SVI EN 001/198");
    }

    #[test]
    fn test_missing_read_result_is_empty() {
        let result = parse_analyze_response(r#"{"modelVersion": "2023-10-01"}"#).unwrap();
        assert!(result.blocks.is_empty());
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            parse_analyze_response("<html>oops</html>"),
            Err(OcrError::Malformed(_))
        ));
    }

    #[test]
    fn test_analyze_url_trims_trailing_slash() {
        assert_eq!(
            analyze_url("https://example.cognitiveservices.azure.com/"),
            "https://example.cognitiveservices.azure.com/computervision/imageanalysis:analyze?features=read&api-version=2023-10-01"
        );
    }
}
