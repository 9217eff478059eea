//! Network cameras: still-image polling and multipart MJPEG streams.

use reqwest::blocking::{Client, Response};
use std::io::Read;
use std::time::Duration;
use tracing::{debug, info};

use super::{CaptureError, Frame, FrameSource};
use crate::config::CameraConfig;

const DEFAULT_BOUNDARY: &[u8] = b"--frame";
const HEADER_END: &[u8] = b"\r\n\r\n";
const READ_CHUNK: usize = 16 * 1024;

fn build_client(config: &CameraConfig) -> Result<Client, CaptureError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.read_timeout_secs))
        .build()
        .map_err(|e| CaptureError::Open(config.url.clone(), e.to_string()))
}

/// Polls a still-image URL; every request yields one frame.
pub struct SnapshotCamera {
    client: Client,
    url: String,
    frames: u64,
}

impl SnapshotCamera {
    /// Connects and fetches a first frame so an unreachable camera fails here.
    pub fn open(config: &CameraConfig) -> Result<Self, CaptureError> {
        let mut camera = Self {
            client: build_client(config)?,
            url: config.url.clone(),
            frames: 0,
        };
        camera
            .fetch()
            .map_err(|e| CaptureError::Open(config.url.clone(), e.to_string()))?;
        Ok(camera)
    }

    fn fetch(&mut self) -> Result<Frame, CaptureError> {
        let resp = self.client.get(&self.url).send()?;
        if !resp.status().is_success() {
            return Err(CaptureError::HttpStatus(resp.status().as_u16()));
        }
        let bytes = resp.bytes()?;
        let image = image::load_from_memory(&bytes)?.to_rgb8();
        self.frames += 1;
        Ok(Frame::new(image))
    }
}

impl FrameSource for SnapshotCamera {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        self.fetch().map(Some)
    }

    fn describe(&self) -> String {
        format!("snapshot camera {}", self.url)
    }
}

impl Drop for SnapshotCamera {
    fn drop(&mut self) {
        info!(url = %self.url, frames = self.frames, "snapshot camera released");
    }
}

/// Reads frames from a `multipart/x-mixed-replace` MJPEG stream.
pub struct MjpegCamera {
    url: String,
    parts: MultipartReader<Response>,
    frames: u64,
}

impl MjpegCamera {
    pub fn open(config: &CameraConfig) -> Result<Self, CaptureError> {
        let open_err = |e: &dyn std::fmt::Display| CaptureError::Open(config.url.clone(), e.to_string());

        let client = build_client(config)?;
        let resp = client.get(&config.url).send().map_err(|e| open_err(&e))?;
        if !resp.status().is_success() {
            return Err(open_err(&format!("HTTP status {}", resp.status())));
        }

        let boundary = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(boundary_from_content_type)
            .unwrap_or_else(|| DEFAULT_BOUNDARY.to_vec());

        info!(url = %config.url, boundary = %String::from_utf8_lossy(&boundary), "connected to MJPEG stream");

        Ok(Self {
            url: config.url.clone(),
            parts: MultipartReader::new(resp, boundary),
            frames: 0,
        })
    }
}

impl FrameSource for MjpegCamera {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        loop {
            let Some(jpeg) = self.parts.next_part()? else {
                return Ok(None);
            };
            if jpeg.is_empty() {
                continue;
            }
            debug!(bytes = jpeg.len(), "MJPEG part received");
            let image = image::load_from_memory(&jpeg)?.to_rgb8();
            self.frames += 1;
            return Ok(Some(Frame::new(image)));
        }
    }

    fn describe(&self) -> String {
        format!("MJPEG camera {}", self.url)
    }
}

impl Drop for MjpegCamera {
    fn drop(&mut self) {
        info!(url = %self.url, frames = self.frames, "MJPEG camera released");
    }
}

/// Extracts the body delimiter (`--` + boundary) from a multipart content type.
fn boundary_from_content_type(content_type: &str) -> Option<Vec<u8>> {
    let value = content_type
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("boundary="))?
        .trim_matches('"');
    if value.is_empty() {
        return None;
    }
    let delimiter = if value.starts_with("--") {
        value.to_string()
    } else {
        format!("--{}", value)
    };
    Some(delimiter.into_bytes())
}

/// Splits a blocking byte stream into multipart bodies.
pub(crate) struct MultipartReader<R> {
    reader: R,
    boundary: Vec<u8>,
    buffer: Vec<u8>,
}

impl<R: Read> MultipartReader<R> {
    pub(crate) fn new(reader: R, boundary: Vec<u8>) -> Self {
        Self {
            reader,
            boundary,
            buffer: Vec::with_capacity(256 * 1024),
        }
    }

    /// Returns the next part body, or `None` once the stream ends.
    pub(crate) fn next_part(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        // Boundary
        let Some(pos) = self.find_from(0, &self.boundary.clone())? else {
            return Ok(None);
        };
        self.buffer.drain(..pos + self.boundary.len());

        // Part headers
        let Some(pos) = self.find_from(0, HEADER_END)? else {
            return Ok(None);
        };
        self.buffer.drain(..pos + HEADER_END.len());

        // Body, up to the next boundary or end of stream
        let end = match self.find_from(0, &self.boundary.clone())? {
            Some(pos) => pos,
            None if self.buffer.is_empty() => return Ok(None),
            None => self.buffer.len(),
        };
        let mut body_end = end;
        if body_end >= 2 && &self.buffer[body_end - 2..body_end] == b"\r\n" {
            body_end -= 2;
        }
        let body = self.buffer[..body_end].to_vec();
        self.buffer.drain(..end);
        Ok(Some(body))
    }

    /// Finds `needle` at or after `start`, reading more input as needed.
    fn find_from(&mut self, start: usize, needle: &[u8]) -> std::io::Result<Option<usize>> {
        let mut scan_from = start;
        loop {
            if let Some(pos) = find_subsequence(&self.buffer[scan_from..], needle) {
                return Ok(Some(scan_from + pos));
            }
            scan_from = self.buffer.len().saturating_sub(needle.len()).max(start);
            if !self.fill()? {
                return Ok(None);
            }
        }
    }

    fn fill(&mut self) -> std::io::Result<bool> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.reader.read(&mut chunk)?;
        if n == 0 {
            return Ok(false);
        }
        self.buffer.extend_from_slice(&chunk[..n]);
        Ok(true)
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
