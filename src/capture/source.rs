//! Frame sources the capture session can read from

use image::RgbaImage;
use std::path::PathBuf;

use crate::error::FlowError;

/// Something that can produce one still frame on demand
pub trait FrameSource: Send {
    /// Read the most recent frame
    fn grab(&mut self) -> Result<RgbaImage, FlowError>;

    /// Human-readable description for logs and notices
    fn describe(&self) -> String;
}

/// Reads the frame from an image file, for kiosks without a camera
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl FrameSource for FileSource {
    fn grab(&mut self) -> Result<RgbaImage, FlowError> {
        let decoded = image::open(&self.path).map_err(|err| {
            FlowError::Device(format!("cannot read {}: {}", self.path.display(), err))
        })?;
        Ok(decoded.to_rgba8())
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_source_reads_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let mut source = FileSource::new(path);
        let frame = source.grab().unwrap();
        assert_eq!(frame.dimensions(), (3, 2));
        assert_eq!(frame.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_missing_file_is_device_failure() {
        let mut source = FileSource::new(PathBuf::from("/nonexistent/still.png"));
        assert!(matches!(source.grab(), Err(FlowError::Device(_))));
    }
}
