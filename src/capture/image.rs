//! Captured image type held in memory until upload

use image::RgbaImage;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::SaveLocation;

/// Encoding of the captured bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageEncoding {
    #[default]
    Png,
}

impl ImageEncoding {
    pub fn content_type(self) -> &'static str {
        match self {
            ImageEncoding::Png => "image/png",
        }
    }
}

/// An encoded still frame, never persisted unless explicitly saved
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedImage {
    bytes: Vec<u8>,
    encoding: ImageEncoding,
    width: u32,
    height: u32,
}

impl CapturedImage {
    /// Encode a raw RGBA frame as PNG
    pub fn from_rgba(rgba: &RgbaImage) -> anyhow::Result<Self> {
        let mut bytes = Vec::new();
        write_png(&mut bytes, rgba)?;
        log::debug!(
            "CapturedImage encoded: {}x{} pixels, {} bytes",
            rgba.width(),
            rgba.height(),
            bytes.len()
        );
        Ok(Self {
            bytes,
            encoding: ImageEncoding::Png,
            width: rgba.width(),
            height: rgba.height(),
        })
    }

    /// Load any image file the `image` crate understands and re-encode it as PNG
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let decoded = image::open(path)?;
        Self::from_rgba(&decoded.to_rgba8())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_type(&self) -> &'static str {
        self.encoding.content_type()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, &self.bytes)
    }
}

/// Timestamped file path for a local copy, e.g. `Snapbooth_2024-06-15_12-00-00.png`
pub fn timestamped_path(location: SaveLocation, suffix: &str) -> Option<PathBuf> {
    let mut path = location.dir()?;
    let name = chrono::Local::now()
        .format(&format!("Snapbooth_%Y-%m-%d_%H-%M-%S{}.png", suffix))
        .to_string();
    path.push(name);
    Some(path)
}

fn write_png<W: io::Write>(w: W, image: &RgbaImage) -> Result<(), png::EncodingError> {
    let mut encoder = png::Encoder::new(w, image.width(), image.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(image.as_raw())
}
