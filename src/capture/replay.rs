//! Replays still images from a directory as if they came from the camera.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{CaptureError, Frame, FrameSource};

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// Yields image files in file-name order, then reports the device closed.
pub struct ReplaySource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
}

impl ReplaySource {
    pub fn open(dir: &Path) -> Result<Self, CaptureError> {
        let open_err = |msg: String| CaptureError::Open(dir.display().to_string(), msg);

        let entries = std::fs::read_dir(dir).map_err(|e| open_err(e.to_string()))?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image_file(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(open_err("no image files to replay".to_string()));
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            next: 0,
        })
    }

    pub fn remaining(&self) -> usize {
        self.files.len() - self.next
    }
}

fn is_image_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

impl FrameSource for ReplaySource {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        debug!(path = %path.display(), "replaying frame");
        let image = image::open(path)?.to_rgb8();
        Ok(Some(Frame::new(image)))
    }

    fn describe(&self) -> String {
        format!(
            "replay of {} ({} of {} frames left)",
            self.dir.display(),
            self.remaining(),
            self.files.len()
        )
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        info!(dir = %self.dir.display(), replayed = self.next, "replay source released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    #[test]
    fn test_replays_in_name_order_then_closes() {
        let dir = tempdir().unwrap();
        RgbImage::from_pixel(4, 4, Rgb([10, 10, 10]))
            .save(dir.path().join("002.png"))
            .unwrap();
        RgbImage::from_pixel(4, 4, Rgb([200, 200, 200]))
            .save(dir.path().join("001.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = ReplaySource::open(dir.path()).unwrap();
        assert_eq!(source.remaining(), 2);

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.image.get_pixel(0, 0)[0], 200);
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.image.get_pixel(0, 0)[0], 10);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_empty_directory_fails_to_open() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            ReplaySource::open(dir.path()),
            Err(CaptureError::Open(_, _))
        ));
    }
}
