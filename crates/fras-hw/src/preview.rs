//! Preview presenter: periodically writes the live frame to a PNG file.

use crate::feed::Presenter;
use crate::frame::Frame;
use image::GrayImage;
use std::path::PathBuf;

/// Writes every `every`-th frame to `path` as PNG.
///
/// The image is written to a sibling temp file and renamed into place, so
/// a viewer polling `path` never sees a half-written file.
pub struct PreviewWriter {
    path: PathBuf,
    tmp_path: PathBuf,
    every: u32,
    counter: u32,
}

impl PreviewWriter {
    pub fn new(path: impl Into<PathBuf>, every: u32) -> Self {
        let path = path.into();
        let tmp_path = path.with_extension("tmp.png");
        Self {
            path,
            tmp_path,
            every: every.max(1),
            counter: 0,
        }
    }

    fn write(&self, frame: &Frame) -> Result<(), image::ImageError> {
        let Some(img) = GrayImage::from_raw(frame.width, frame.height, frame.data.clone()) else {
            tracing::warn!(
                width = frame.width,
                height = frame.height,
                len = frame.data.len(),
                "frame buffer does not match dimensions; preview skipped"
            );
            return Ok(());
        };
        img.save(&self.tmp_path)?;
        std::fs::rename(&self.tmp_path, &self.path)?;
        Ok(())
    }
}

impl Presenter for PreviewWriter {
    fn present(&mut self, frame: &Frame) {
        self.counter += 1;
        if self.counter < self.every {
            return;
        }
        self.counter = 0;
        if let Err(e) = self.write(frame) {
            tracing::warn!(path = %self.path.display(), error = %e, "preview write failed");
        }
    }
}
